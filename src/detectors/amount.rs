//! Amount anomaly detector: spend far outside the learned distribution.

use super::Detector;
use crate::baseline::UserBaseline;
use crate::types::{DetectorKind, TransactionEvent};

pub struct AmountAnomalyDetector {
    min_samples: u64,
}

impl AmountAnomalyDetector {
    pub fn new(min_samples: u64) -> Self {
        Self { min_samples }
    }
}

impl Detector for AmountAnomalyDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Amount
    }

    /// Z-score of the amount against the baseline mean/variance, mapped
    /// linearly so that anything within one standard deviation is neutral
    /// and four or more is maximal.
    fn score(&self, event: &TransactionEvent, baseline: &UserBaseline) -> f64 {
        if baseline.amount.count < self.min_samples {
            return 0.0;
        }
        let mean = baseline.amount.mean;
        let spread = baseline.amount.std_dev().max(0.05 * mean.abs()).max(1.0);
        let z = (event.amount - mean).abs() / spread;
        ((z - 1.0) / 3.0).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{event, seeded_baseline};
    use super::*;

    #[test]
    fn test_cold_start_is_neutral_regardless_of_magnitude() {
        let detector = AmountAnomalyDetector::new(5);
        let baseline = seeded_baseline(4);
        assert_eq!(detector.score(&event(5, 1_000_000.0), &baseline), 0.0);
    }

    #[test]
    fn test_huge_amount_scores_max() {
        let detector = AmountAnomalyDetector::new(5);
        let baseline = seeded_baseline(10);
        assert_eq!(detector.score(&event(11, 50_000.0), &baseline), 1.0);
    }

    #[test]
    fn test_routine_amount_is_neutral() {
        let detector = AmountAnomalyDetector::new(5);
        let baseline = seeded_baseline(10);
        assert_eq!(detector.score(&event(11, 51.0), &baseline), 0.0);
    }

    #[test]
    fn test_refund_magnitude_counts() {
        let detector = AmountAnomalyDetector::new(5);
        let baseline = seeded_baseline(10);
        // Large negative amounts are just as anomalous
        assert!(detector.score(&event(11, -50_000.0), &baseline) > 0.9);
    }
}
