//! Time anomaly detector: activity at hours the user never transacts.

use super::Detector;
use crate::baseline::UserBaseline;
use crate::types::{DetectorKind, TransactionEvent};
use chrono::Timelike;

pub struct TimeAnomalyDetector {
    min_samples: u64,
}

impl TimeAnomalyDetector {
    pub fn new(min_samples: u64) -> Self {
        Self { min_samples }
    }
}

impl Detector for TimeAnomalyDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Time
    }

    /// Deviation of the hour-of-day from the baseline histogram: the score is
    /// one minus the hour's weight relative to the histogram mode, so the
    /// user's busiest hour is 0.0 and a never-seen hour is 1.0.
    fn score(&self, event: &TransactionEvent, baseline: &UserBaseline) -> f64 {
        if baseline.observations < self.min_samples {
            return 0.0;
        }
        let hour = event.timestamp.hour() as usize;
        1.0 - baseline.hour_weight(hour)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{event, seeded_baseline};
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_cold_start_is_neutral() {
        let detector = TimeAnomalyDetector::new(5);
        let baseline = seeded_baseline(4);
        let mut e = event(5, 50.0);
        e.timestamp = Utc.with_ymd_and_hms(2026, 1, 10, 3, 0, 0).unwrap();
        assert_eq!(detector.score(&e, &baseline), 0.0);
    }

    #[test]
    fn test_unseen_hour_scores_max() {
        let detector = TimeAnomalyDetector::new(5);
        let baseline = seeded_baseline(12);
        // Seeded cadence never touches 3am
        let mut e = event(13, 50.0);
        e.timestamp = Utc.with_ymd_and_hms(2026, 1, 10, 3, 0, 0).unwrap();
        assert_eq!(detector.score(&e, &baseline), 1.0);
    }

    #[test]
    fn test_busiest_hour_is_neutral() {
        let detector = TimeAnomalyDetector::new(5);
        let mut baseline = seeded_baseline(0);
        // All history at 14:00
        for seq in 1..=10 {
            let mut e = event(seq, 50.0);
            e.timestamp = Utc.with_ymd_and_hms(2026, 1, seq as u32, 14, 0, 0).unwrap();
            baseline.observe(&e);
        }
        let mut e = event(11, 50.0);
        e.timestamp = Utc.with_ymd_and_hms(2026, 1, 11, 14, 30, 0).unwrap();
        assert_eq!(detector.score(&e, &baseline), 0.0);
    }
}
