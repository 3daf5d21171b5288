//! Velocity detector: transactions arriving faster than the learned cadence.

use super::{bounded_sigmoid, Detector};
use crate::baseline::UserBaseline;
use crate::types::{DetectorKind, TransactionEvent};

pub struct VelocityDetector {
    min_samples: u64,
}

impl VelocityDetector {
    pub fn new(min_samples: u64) -> Self {
        Self { min_samples }
    }
}

impl Detector for VelocityDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Velocity
    }

    /// Compares the observed inter-arrival gap against the baseline's
    /// expected distribution. Only faster-than-normal arrivals score; a
    /// quiet account coming back after a long gap is not an anomaly.
    fn score(&self, event: &TransactionEvent, baseline: &UserBaseline) -> f64 {
        if baseline.inter_arrival.count < self.min_samples {
            return 0.0;
        }
        let Some(last) = baseline.last_timestamp else {
            return 0.0;
        };

        let gap = (event.timestamp - last).num_milliseconds() as f64 / 1000.0;
        if gap < 0.0 {
            return 0.0;
        }

        let mean = baseline.inter_arrival.mean;
        // Relative floor keeps a perfectly regular cadence from producing
        // degenerate z-scores.
        let spread = baseline
            .inter_arrival
            .std_dev()
            .max(0.1 * mean.abs())
            .max(1.0);
        let z = (mean - gap) / spread;
        bounded_sigmoid(z)
    }
}
