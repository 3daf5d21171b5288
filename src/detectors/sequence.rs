//! Sequence anomaly detector: improbable category-to-category transitions.

use super::Detector;
use crate::baseline::UserBaseline;
use crate::types::{DetectorKind, TransactionEvent};

pub struct SequenceAnomalyDetector {
    min_samples: u64,
}

impl SequenceAnomalyDetector {
    pub fn new(min_samples: u64) -> Self {
        Self { min_samples }
    }
}

impl Detector for SequenceAnomalyDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Sequence
    }

    /// Likelihood of the current category following the previous one under
    /// the learned first-order transition model; low-probability transitions
    /// score higher. Without a previous category or enough row history the
    /// detector is neutral.
    fn score(&self, event: &TransactionEvent, baseline: &UserBaseline) -> f64 {
        if baseline.observations < self.min_samples {
            return 0.0;
        }
        let Some(prev) = &baseline.last_category else {
            return 0.0;
        };
        match baseline.transition_probability(prev, &event.category) {
            Some((probability, row_total)) if row_total >= 1.0 => {
                (1.0 - probability).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }
}
