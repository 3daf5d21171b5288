//! Risk alert data structures

use crate::types::score::{DetectorKind, RiskScore, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alert created when a scored transaction crosses the severity threshold.
///
/// Exactly one alert exists per qualifying RiskScore; the sink deduplicates
/// by `event_id`. Only `acknowledged` is ever mutated, by the external API
/// layer on user action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Unique alert identifier
    pub alert_id: String,

    /// Event that triggered the alert
    pub event_id: String,

    pub user_id: String,

    /// Fused risk score (0.0 - 1.0)
    pub fused_score: f64,

    pub severity: Severity,

    /// Contributing detectors, highest partial score first
    pub reasons: Vec<DetectorKind>,

    /// Operator-facing suggested action for this severity
    pub recommendation: String,

    pub created_at: DateTime<Utc>,

    pub acknowledged: bool,
}

impl Alert {
    /// Create an alert from a qualifying risk score.
    pub fn from_score(score: &RiskScore) -> Self {
        Self {
            alert_id: uuid::Uuid::new_v4().to_string(),
            event_id: score.event_id.clone(),
            user_id: score.user_id.clone(),
            fused_score: score.fused_score,
            severity: score.severity,
            reasons: score.reasons.clone(),
            recommendation: recommendation_for(score.severity).to_string(),
            created_at: Utc::now(),
            acknowledged: false,
        }
    }
}

/// Suggested operator action per severity band.
fn recommendation_for(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => {
            "Verify this transaction immediately. Consider blocking the card if not recognized."
        }
        Severity::High => {
            "Confirm whether this transaction was made. Enable additional verification if not."
        }
        Severity::Medium => "Unusual transaction. Review recent account activity.",
        Severity::Low | Severity::Safe => "Transaction appears normal. No action needed.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_from_score() {
        let score = RiskScore {
            event_id: "evt_1".to_string(),
            user_id: "user_1".to_string(),
            partial_scores: vec![(DetectorKind::Amount, 0.9)],
            fused_score: 0.85,
            severity: Severity::Critical,
            reasons: vec![DetectorKind::Amount],
        };

        let alert = Alert::from_score(&score);
        assert_eq!(alert.event_id, "evt_1");
        assert_eq!(alert.severity, Severity::Critical);
        assert!(!alert.acknowledged);
        assert!(alert.recommendation.contains("immediately"));
    }

    #[test]
    fn test_alert_serialization() {
        let score = RiskScore {
            event_id: "evt_2".to_string(),
            user_id: "user_1".to_string(),
            partial_scores: vec![],
            fused_score: 0.65,
            severity: Severity::High,
            reasons: vec![DetectorKind::Merchant, DetectorKind::Location],
        };

        let alert = Alert::from_score(&score);
        let json = serde_json::to_string(&alert).unwrap();
        let back: Alert = serde_json::from_str(&json).unwrap();

        assert_eq!(alert.alert_id, back.alert_id);
        assert_eq!(alert.severity, back.severity);
        assert_eq!(alert.reasons, back.reasons);
    }
}
