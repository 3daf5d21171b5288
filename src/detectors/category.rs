//! Category anomaly detector: spend in an unseen or rarely seen category.

use super::Detector;
use crate::baseline::UserBaseline;
use crate::types::{DetectorKind, TransactionEvent};

pub struct CategoryAnomalyDetector {
    min_samples: u64,
}

impl CategoryAnomalyDetector {
    pub fn new(min_samples: u64) -> Self {
        Self { min_samples }
    }
}

impl Detector for CategoryAnomalyDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Category
    }

    /// One minus the category's recency/frequency weight: 1.0 for a category
    /// never seen, 0.0 for one that is well-established in recent history.
    fn score(&self, event: &TransactionEvent, baseline: &UserBaseline) -> f64 {
        if baseline.observations < self.min_samples {
            return 0.0;
        }
        1.0 - baseline.category_familiarity(&event.category)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{event, seeded_baseline};
    use super::*;

    #[test]
    fn test_cold_start_is_neutral() {
        let detector = CategoryAnomalyDetector::new(5);
        let baseline = seeded_baseline(4);
        let mut e = event(5, 50.0);
        e.category = "casino".to_string();
        assert_eq!(detector.score(&e, &baseline), 0.0);
    }

    #[test]
    fn test_unseen_category_scores_max() {
        let detector = CategoryAnomalyDetector::new(5);
        let baseline = seeded_baseline(10);
        let mut e = event(11, 50.0);
        e.category = "casino".to_string();
        assert_eq!(detector.score(&e, &baseline), 1.0);
    }

    #[test]
    fn test_established_category_is_neutral() {
        let detector = CategoryAnomalyDetector::new(5);
        let baseline = seeded_baseline(10);
        assert!(detector.score(&event(11, 50.0), &baseline) < 0.1);
    }
}
