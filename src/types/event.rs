//! Transaction event data structures

use crate::errors::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A financial transaction delivered by the external feed.
///
/// Immutable once created; consumed exactly once by the pipeline for scoring.
/// `sequence_no` is a per-user strictly increasing counter assigned by the
/// feed and is the basis of the per-user ordering guarantee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionEvent {
    /// Unique event identifier
    pub event_id: String,

    /// Owning user
    pub user_id: String,

    /// Transaction time
    pub timestamp: DateTime<Utc>,

    /// Signed amount (refunds are negative)
    pub amount: f64,

    /// Spending category (e.g. "groceries", "travel")
    pub category: String,

    /// Merchant identifier
    pub merchant_id: String,

    /// Region code, when the feed knows it
    #[serde(default)]
    pub geo_location: Option<String>,

    /// Per-user strictly increasing counter, starting at 1
    pub sequence_no: u64,
}

impl TransactionEvent {
    /// Validate required fields before the event enters the pipeline.
    ///
    /// Rejected events are reported as `MalformedEvent` and never scored.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.event_id.is_empty() {
            return Err(PipelineError::MalformedEvent {
                reason: "empty event_id".to_string(),
            });
        }
        if self.user_id.is_empty() {
            return Err(PipelineError::MalformedEvent {
                reason: format!("event {}: empty user_id", self.event_id),
            });
        }
        if self.sequence_no == 0 {
            return Err(PipelineError::MalformedEvent {
                reason: format!("event {}: sequence_no must start at 1", self.event_id),
            });
        }
        if !self.amount.is_finite() {
            return Err(PipelineError::MalformedEvent {
                reason: format!("event {}: non-finite amount", self.event_id),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_event(user: &str, seq: u64, amount: f64) -> TransactionEvent {
        TransactionEvent {
            event_id: format!("evt_{}_{}", user, seq),
            user_id: user.to_string(),
            timestamp: Utc::now(),
            amount,
            category: "groceries".to_string(),
            merchant_id: "merchant_1".to_string(),
            geo_location: Some("US-CA".to_string()),
            sequence_no: seq,
        }
    }

    #[test]
    fn test_event_serialization() {
        let event = sample_event("user_1", 1, 42.50);
        let json = serde_json::to_string(&event).unwrap();
        let back: TransactionEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(event.event_id, back.event_id);
        assert_eq!(event.sequence_no, back.sequence_no);
        assert_eq!(event.amount, back.amount);
    }

    #[test]
    fn test_missing_geo_location_deserializes() {
        let json = r#"{
            "event_id": "evt_1",
            "user_id": "user_1",
            "timestamp": "2026-01-15T10:30:00Z",
            "amount": 25.0,
            "category": "food",
            "merchant_id": "m_1",
            "sequence_no": 1
        }"#;
        let event: TransactionEvent = serde_json::from_str(json).unwrap();
        assert!(event.geo_location.is_none());
        assert!(event.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_events() {
        let mut event = sample_event("user_1", 1, 10.0);
        event.user_id = String::new();
        assert!(matches!(
            event.validate(),
            Err(PipelineError::MalformedEvent { .. })
        ));

        let mut event = sample_event("user_1", 1, 10.0);
        event.sequence_no = 0;
        assert!(event.validate().is_err());

        let mut event = sample_event("user_1", 1, 10.0);
        event.amount = f64::NAN;
        assert!(event.validate().is_err());
    }
}
