//! Performance metrics and statistics tracking for the scoring pipeline.

use crate::types::Severity;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for pipeline performance
pub struct PipelineMetrics {
    /// Total events scored to completion
    pub events_processed: AtomicU64,
    /// Total alerts generated
    pub alerts_generated: AtomicU64,
    /// Scored events by severity
    severity_counts: RwLock<HashMap<&'static str, u64>>,
    /// Processing-issue counts by kind (out_of_order, malformed, ...)
    issue_counts: RwLock<HashMap<&'static str, u64>>,
    /// Operator-visible issue totals per user, for user-scoped dashboards
    user_issue_counts: RwLock<HashMap<String, u64>>,
    /// End-to-end per-event processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Fused score distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            events_processed: AtomicU64::new(0),
            alerts_generated: AtomicU64::new(0),
            severity_counts: RwLock::new(HashMap::new()),
            issue_counts: RwLock::new(HashMap::new()),
            user_issue_counts: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a fully scored event
    pub fn record_event(&self, processing_time: Duration, fused_score: f64, severity: Severity) {
        self.events_processed.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only recent samples for memory efficiency
            if times.len() > 10_000 {
                times.drain(0..5_000);
            }
        }

        let bucket = (fused_score * 10.0).min(9.0) as usize;
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }

        if let Ok(mut counts) = self.severity_counts.write() {
            *counts.entry(severity.as_str()).or_insert(0) += 1;
        }
    }

    /// Record a generated alert
    pub fn record_alert(&self) {
        self.alerts_generated.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a processing issue (rejected, failed or deduplicated event)
    pub fn record_issue(&self, kind: &'static str) {
        if let Ok(mut counts) = self.issue_counts.write() {
            *counts.entry(kind).or_insert(0) += 1;
        }
    }

    /// Record a processing issue attributed to a specific user. Silent
    /// deduplication is not attributed; neither are events whose user id
    /// failed validation.
    pub fn record_issue_for(&self, user_id: &str, kind: &'static str) {
        self.record_issue(kind);
        if kind == "duplicate" || user_id.is_empty() {
            return;
        }
        if let Ok(mut counts) = self.user_issue_counts.write() {
            *counts.entry(user_id.to_string()).or_insert(0) += 1;
        }
    }

    /// Operator-visible issue total for one user
    pub fn user_issue_total(&self, user_id: &str) -> u64 {
        self.user_issue_counts
            .read()
            .ok()
            .and_then(|counts| counts.get(user_id).copied())
            .unwrap_or(0)
    }

    /// Drop the per-user issue counter when the user's state is evicted
    pub fn forget_user(&self, user_id: &str) {
        if let Ok(mut counts) = self.user_issue_counts.write() {
            counts.remove(user_id);
        }
    }

    /// Total processing issues across all kinds. Silent deduplication is
    /// excluded; a redelivered event is not an operator-visible problem.
    pub fn issue_total(&self) -> u64 {
        self.issue_counts
            .read()
            .map(|counts| {
                counts
                    .iter()
                    .filter(|(kind, _)| **kind != "duplicate")
                    .map(|(_, count)| *count)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Issue counts by kind
    pub fn issues(&self) -> HashMap<&'static str, u64> {
        self.issue_counts.read().map(|c| c.clone()).unwrap_or_default()
    }

    /// Severity counts by band
    pub fn severity_counts(&self) -> HashMap<&'static str, u64> {
        self.severity_counts
            .read()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Get processing time statistics
    pub fn processing_stats(&self) -> ProcessingStats {
        let times = match self.processing_times.read() {
            Ok(times) if !times.is_empty() => times,
            _ => return ProcessingStats::default(),
        };

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Current throughput (events per second)
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.events_processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Fused score distribution
    pub fn score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let event_count = self.events_processed.load(Ordering::Relaxed);
        let alert_count = self.alerts_generated.load(Ordering::Relaxed);
        let alert_rate = if event_count > 0 {
            (alert_count as f64 / event_count as f64) * 100.0
        } else {
            0.0
        };

        let processing = self.processing_stats();
        let throughput = self.throughput();

        info!(
            events = event_count,
            alerts = alert_count,
            alert_rate = format!("{alert_rate:.1}%"),
            throughput = format!("{throughput:.1} ev/s"),
            "Risk Guard metrics summary"
        );
        info!(
            mean_us = processing.mean_us,
            p50_us = processing.p50_us,
            p95_us = processing.p95_us,
            p99_us = processing.p99_us,
            "End-to-end processing time"
        );

        for (severity, count) in self.severity_counts() {
            info!(severity, count, "Scored events by severity");
        }

        let issues = self.issues();
        if !issues.is_empty() {
            for (kind, count) in issues {
                info!(kind, count, "Processing issues");
            }
        }

        let score_dist = self.score_distribution();
        let total: u64 = score_dist.iter().sum();
        if total > 0 {
            for (i, &count) in score_dist.iter().enumerate() {
                let pct = (count as f64 / total as f64) * 100.0;
                info!(
                    bucket = format!("{:.1}-{:.1}", i as f64 / 10.0, (i + 1) as f64 / 10.0),
                    count,
                    pct = format!("{pct:.1}%"),
                    "Score distribution"
                );
            }
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Real-time metrics reporter that logs periodic summaries
pub struct MetricsReporter {
    metrics: std::sync::Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: std::sync::Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
