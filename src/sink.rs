//! Alert and dashboard sink.
//!
//! Durable record of emitted alerts plus rolling per-user and global risk
//! summaries, queried by the external API layer. All state is in-memory with
//! per-key locking; idempotent under at-least-once delivery by deduplicating
//! on `event_id`.

use crate::errors::PipelineError;
use crate::metrics::PipelineMetrics;
use crate::types::{Alert, RiskScore, Severity};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// EWMA factor for the rolling average fused score.
const SUMMARY_DECAY: f64 = 0.1;

/// Rolling risk summary for one scope (a user, or global).
#[derive(Debug, Clone, Default, Serialize)]
pub struct RollingSummary {
    /// Total risk scores folded in
    pub scored_total: u64,
    /// Counts by severity band
    pub severity_counts: HashMap<String, u64>,
    /// Exponentially-weighted moving average of the fused score
    pub moving_avg_score: f64,
    /// When the last score was folded in; idle summaries age out with the
    /// retention window
    #[serde(skip)]
    last_scored_at: Option<DateTime<Utc>>,
}

impl RollingSummary {
    fn fold(&mut self, score: &RiskScore) {
        if self.scored_total == 0 {
            self.moving_avg_score = score.fused_score;
        } else {
            self.moving_avg_score +=
                SUMMARY_DECAY * (score.fused_score - self.moving_avg_score);
        }
        self.scored_total += 1;
        *self
            .severity_counts
            .entry(score.severity.as_str().to_string())
            .or_insert(0) += 1;
        self.last_scored_at = Some(Utc::now());
    }
}

/// Dedup claim for one recorded event_id.
struct RecordedScore {
    at: DateTime<Utc>,
    alert_id: Option<String>,
}

/// Dashboard view returned to the external API layer.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub summary: RollingSummary,
    /// Bounded window of alerts, most recent first
    pub recent_alerts: Vec<Alert>,
    /// FAILED/rejected events for this scope, distinct from the severity
    /// counts
    pub processing_issues: u64,
}

/// In-memory alert store with rolling summaries.
pub struct AlertSink {
    alert_threshold: Severity,
    retention_secs: u64,
    recent_window: usize,
    /// event_id -> claim with first-seen time; the dedup set
    recorded: DashMap<String, RecordedScore>,
    /// alert_id -> user_id, for acknowledgement lookups
    alert_owners: DashMap<String, String>,
    /// Per-user alerts, most recent first
    alerts: DashMap<String, VecDeque<Alert>>,
    summaries: DashMap<String, RollingSummary>,
    global_summary: Mutex<RollingSummary>,
    metrics: Arc<PipelineMetrics>,
}

impl AlertSink {
    pub fn new(
        alert_threshold: Severity,
        retention_secs: u64,
        recent_window: usize,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            alert_threshold,
            retention_secs,
            recent_window,
            recorded: DashMap::new(),
            alert_owners: DashMap::new(),
            alerts: DashMap::new(),
            summaries: DashMap::new(),
            global_summary: Mutex::new(RollingSummary::default()),
            metrics,
        }
    }

    /// Record a risk score: fold it into the rolling summaries and, when
    /// severity meets the threshold, create exactly one alert.
    ///
    /// Re-recording the same `event_id` is rejected as `DuplicateEvent` and
    /// changes nothing, making retries after partial failure safe.
    pub fn record(&self, score: &RiskScore) -> Result<Option<Alert>, PipelineError> {
        // Claim the event_id first so a concurrent retry cannot double-count.
        match self.recorded.entry(score.event_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(PipelineError::DuplicateEvent {
                    event_id: score.event_id.clone(),
                });
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(RecordedScore {
                    at: Utc::now(),
                    alert_id: None,
                });
            }
        }

        self.summaries
            .entry(score.user_id.clone())
            .or_default()
            .fold(score);
        if let Ok(mut global) = self.global_summary.lock() {
            global.fold(score);
        }

        if score.severity < self.alert_threshold {
            return Ok(None);
        }

        let alert = Alert::from_score(score);
        self.alert_owners
            .insert(alert.alert_id.clone(), alert.user_id.clone());
        {
            let mut user_alerts = self.alerts.entry(alert.user_id.clone()).or_default();
            user_alerts.push_front(alert.clone());
        }
        if let Some(mut claim) = self.recorded.get_mut(&score.event_id) {
            claim.alert_id = Some(alert.alert_id.clone());
        }

        self.metrics.record_alert();
        info!(
            alert_id = %alert.alert_id,
            event_id = %alert.event_id,
            user_id = %alert.user_id,
            fused_score = alert.fused_score,
            severity = %alert.severity,
            "Risk alert recorded"
        );
        Ok(Some(alert))
    }

    /// Dashboard summary for one user, or the global view when `None`.
    pub fn dashboard(&self, user_id: Option<&str>) -> DashboardSummary {
        let summary = match user_id {
            Some(user) => self
                .summaries
                .get(user)
                .map(|s| s.clone())
                .unwrap_or_default(),
            None => self
                .global_summary
                .lock()
                .map(|s| s.clone())
                .unwrap_or_default(),
        };

        let recent_alerts = match user_id {
            Some(user) => self.page_user(user, 0, self.recent_window),
            None => self.page_global(0, self.recent_window),
        };

        // Scope the issue counter to the view: a user's dashboard does not
        // surface other users' ingestion problems.
        let processing_issues = match user_id {
            Some(user) => self.metrics.user_issue_total(user),
            None => self.metrics.issue_total(),
        };

        DashboardSummary {
            summary,
            recent_alerts,
            processing_issues,
        }
    }

    /// Paginated alert list for a user, most recent first.
    pub fn alerts(&self, user_id: &str, offset: usize, limit: usize) -> Vec<Alert> {
        self.page_user(user_id, offset, limit)
    }

    /// Mark an alert acknowledged. Returns false for an unknown alert id.
    pub fn acknowledge(&self, alert_id: &str) -> bool {
        let Some(owner) = self.alert_owners.get(alert_id).map(|o| o.clone()) else {
            return false;
        };
        let Some(mut user_alerts) = self.alerts.get_mut(&owner) else {
            return false;
        };
        for alert in user_alerts.iter_mut() {
            if alert.alert_id == alert_id {
                alert.acknowledged = true;
                debug!(alert_id, user_id = %owner, "Alert acknowledged");
                return true;
            }
        }
        false
    }

    /// Drop alerts, dedup claims and idle summaries older than the retention
    /// window. Returns the number of alerts pruned.
    pub fn prune_expired(&self) -> usize {
        let cutoff = Utc::now() - Duration::seconds(self.retention_secs as i64);
        let mut pruned = 0;

        for mut user_alerts in self.alerts.iter_mut() {
            while let Some(oldest) = user_alerts.back() {
                if oldest.created_at < cutoff {
                    let expired = user_alerts.pop_back();
                    if let Some(expired) = expired {
                        self.alert_owners.remove(&expired.alert_id);
                    }
                    pruned += 1;
                } else {
                    break;
                }
            }
        }

        self.recorded.retain(|_, claim| claim.at >= cutoff);
        self.summaries
            .retain(|_, summary| summary.last_scored_at.is_some_and(|at| at >= cutoff));

        if pruned > 0 {
            debug!(pruned, "Pruned expired alerts");
        }
        pruned
    }

    /// Total alerts currently retained.
    pub fn alert_count(&self) -> usize {
        self.alerts.iter().map(|entry| entry.len()).sum()
    }

    fn page_user(&self, user_id: &str, offset: usize, limit: usize) -> Vec<Alert> {
        self.alerts
            .get(user_id)
            .map(|alerts| alerts.iter().skip(offset).take(limit).cloned().collect())
            .unwrap_or_default()
    }

    fn page_global(&self, offset: usize, limit: usize) -> Vec<Alert> {
        let mut all: Vec<Alert> = self
            .alerts
            .iter()
            .flat_map(|entry| entry.iter().cloned().collect::<Vec<_>>())
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.into_iter().skip(offset).take(limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DetectorKind;

    fn sink() -> AlertSink {
        AlertSink::new(
            Severity::Medium,
            90 * 24 * 3600,
            20,
            Arc::new(PipelineMetrics::new()),
        )
    }

    fn score(event_id: &str, user_id: &str, fused: f64, severity: Severity) -> RiskScore {
        RiskScore {
            event_id: event_id.to_string(),
            user_id: user_id.to_string(),
            partial_scores: vec![(DetectorKind::Amount, fused)],
            fused_score: fused,
            severity,
            reasons: vec![DetectorKind::Amount],
        }
    }

    #[test]
    fn test_alert_only_at_threshold() {
        let sink = sink();

        let below = sink
            .record(&score("evt_1", "user_1", 0.3, Severity::Low))
            .unwrap();
        assert!(below.is_none());

        let at = sink
            .record(&score("evt_2", "user_1", 0.5, Severity::Medium))
            .unwrap();
        assert!(at.is_some());

        assert_eq!(sink.alert_count(), 1);
        // Both scores still count toward the summary
        let dash = sink.dashboard(Some("user_1"));
        assert_eq!(dash.summary.scored_total, 2);
    }

    #[test]
    fn test_duplicate_event_id_is_rejected_without_side_effects() {
        let sink = sink();
        let s = score("evt_1", "user_1", 0.9, Severity::Critical);

        assert!(sink.record(&s).unwrap().is_some());
        let avg_before = sink.dashboard(Some("user_1")).summary.moving_avg_score;

        let second = sink.record(&s);
        assert!(matches!(
            second,
            Err(PipelineError::DuplicateEvent { .. })
        ));

        assert_eq!(sink.alert_count(), 1);
        let dash = sink.dashboard(Some("user_1"));
        assert_eq!(dash.summary.scored_total, 1);
        assert_eq!(dash.summary.moving_avg_score, avg_before);
    }

    #[test]
    fn test_alerts_most_recent_first_with_pagination() {
        let sink = sink();
        for i in 1..=5 {
            sink.record(&score(&format!("evt_{i}"), "user_1", 0.9, Severity::Critical))
                .unwrap();
        }

        let page = sink.alerts("user_1", 0, 2);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].event_id, "evt_5");
        assert_eq!(page[1].event_id, "evt_4");

        let next = sink.alerts("user_1", 2, 2);
        assert_eq!(next[0].event_id, "evt_3");

        let tail = sink.alerts("user_1", 4, 10);
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].event_id, "evt_1");
    }

    #[test]
    fn test_acknowledge() {
        let sink = sink();
        let alert = sink
            .record(&score("evt_1", "user_1", 0.9, Severity::Critical))
            .unwrap()
            .unwrap();

        assert!(sink.acknowledge(&alert.alert_id));
        assert!(sink.alerts("user_1", 0, 1)[0].acknowledged);
        assert!(!sink.acknowledge("no_such_alert"));
    }

    #[test]
    fn test_retention_pruning() {
        let sink = AlertSink::new(
            Severity::Medium,
            0, // zero retention: everything is already expired
            20,
            Arc::new(PipelineMetrics::new()),
        );
        sink.record(&score("evt_1", "user_1", 0.9, Severity::Critical))
            .unwrap();

        // created_at == now, cutoff == now; give the clock a tick
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(sink.prune_expired(), 1);
        assert_eq!(sink.alert_count(), 0);
    }

    #[test]
    fn test_dedup_claims_age_out_with_retention() {
        let sink = AlertSink::new(
            Severity::Medium,
            0,
            20,
            Arc::new(PipelineMetrics::new()),
        );
        sink.record(&score("evt_1", "user_1", 0.9, Severity::Critical))
            .unwrap();
        assert!(sink.record(&score("evt_1", "user_1", 0.9, Severity::Critical)).is_err());

        std::thread::sleep(std::time::Duration::from_millis(5));
        sink.prune_expired();

        // The expired claim no longer blocks the event_id, and the idle
        // summary was dropped with it
        assert!(sink
            .record(&score("evt_1", "user_1", 0.9, Severity::Critical))
            .unwrap()
            .is_some());
        assert_eq!(sink.dashboard(Some("user_1")).summary.scored_total, 1);
    }

    #[test]
    fn test_global_dashboard_merges_users() {
        let sink = sink();
        sink.record(&score("evt_1", "user_1", 0.9, Severity::Critical))
            .unwrap();
        sink.record(&score("evt_2", "user_2", 0.7, Severity::High))
            .unwrap();
        sink.record(&score("evt_3", "user_3", 0.1, Severity::Safe))
            .unwrap();

        let dash = sink.dashboard(None);
        assert_eq!(dash.summary.scored_total, 3);
        assert_eq!(dash.recent_alerts.len(), 2);
        assert_eq!(dash.summary.severity_counts.get("critical"), Some(&1));
    }
}
