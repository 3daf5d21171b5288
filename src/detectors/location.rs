//! Location anomaly detector: activity from regions outside recent history.

use super::Detector;
use crate::baseline::UserBaseline;
use crate::types::{DetectorKind, TransactionEvent};
use chrono::Duration;

/// Window within which a region change counts as an implausible jump.
const RAPID_JUMP_WINDOW_MINS: i64 = 60;

pub struct LocationAnomalyDetector;

impl LocationAnomalyDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocationAnomalyDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for LocationAnomalyDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Location
    }

    /// Region mismatch against the recent geo set. A new region scores 0.8;
    /// a new region reached within an hour of activity somewhere else scores
    /// 1.0 (the velocity-distance joint condition). Events without a
    /// location, and users without location history, are neutral.
    fn score(&self, event: &TransactionEvent, baseline: &UserBaseline) -> f64 {
        let Some(region) = &event.geo_location else {
            return 0.0;
        };
        if baseline.regions.is_empty() {
            return 0.0;
        }
        if baseline.regions.contains_key(region) {
            return 0.0;
        }

        if let Some((last_region, last_at)) = &baseline.last_region {
            let elapsed = event.timestamp - *last_at;
            if last_region != region
                && elapsed >= Duration::zero()
                && elapsed <= Duration::minutes(RAPID_JUMP_WINDOW_MINS)
            {
                return 1.0;
            }
        }
        0.8
    }
}
