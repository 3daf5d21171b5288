//! Error taxonomy for the risk scoring pipeline.
//!
//! Every per-event failure is isolated to that event and its user's lane;
//! none of these variants crash the pipeline or affect other users.

use thiserror::Error;

/// Per-event processing errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Sequence number regression for a user. The event is rejected and
    /// reported; the lane continues with the next event.
    #[error("out-of-order event for user {user_id}: sequence_no {sequence_no} <= last processed {last_sequence_no}")]
    OutOfOrderEvent {
        user_id: String,
        sequence_no: u64,
        last_sequence_no: u64,
    },

    /// Same event_id delivered twice (at-least-once feed). Deduplicated
    /// silently; counted in metrics but not surfaced to operators.
    #[error("duplicate event {event_id}")]
    DuplicateEvent { event_id: String },

    /// Detector evaluation exceeded the configured deadline. The event is
    /// marked failed and the lane proceeds to its next queued event.
    #[error("scoring deadline of {deadline_ms}ms exceeded for event {event_id}")]
    ScoringTimeout { event_id: String, deadline_ms: u64 },

    /// Alert/summary persistence failed after bounded retries. Scoring
    /// itself succeeded, so the baseline update stays applied.
    #[error("sink write failed for event {event_id} after {attempts} attempts")]
    SinkWriteFailure { event_id: String, attempts: u32 },

    /// Event rejected before entering the pipeline.
    #[error("malformed event: {reason}")]
    MalformedEvent { reason: String },

    /// Graceful shutdown in progress; lanes no longer accept new work.
    #[error("pipeline is shutting down")]
    ShuttingDown,
}

impl PipelineError {
    /// Metrics bucket name for the processing-issues dashboard counter.
    pub fn issue_kind(&self) -> &'static str {
        match self {
            PipelineError::OutOfOrderEvent { .. } => "out_of_order",
            PipelineError::DuplicateEvent { .. } => "duplicate",
            PipelineError::ScoringTimeout { .. } => "scoring_timeout",
            PipelineError::SinkWriteFailure { .. } => "sink_write_failure",
            PipelineError::MalformedEvent { .. } => "malformed",
            PipelineError::ShuttingDown => "shutting_down",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::OutOfOrderEvent {
            user_id: "user_1".to_string(),
            sequence_no: 3,
            last_sequence_no: 7,
        };
        assert!(err.to_string().contains("user_1"));
        assert!(err.to_string().contains("3"));
        assert_eq!(err.issue_kind(), "out_of_order");
    }
}
