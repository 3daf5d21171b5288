//! The seven detection models.
//!
//! Each detector is a pure scoring function over an `(event, baseline)` pair,
//! bounded to [0, 1]. Detectors never mutate the baseline and never fail on
//! missing optional fields; a dimension without enough history returns a
//! neutral 0.0 instead of flagging novelty as anomalous.

pub mod amount;
pub mod category;
pub mod location;
pub mod merchant;
pub mod sequence;
pub mod time;
pub mod velocity;

use crate::baseline::UserBaseline;
use crate::types::{DetectorKind, TransactionEvent};

pub use amount::AmountAnomalyDetector;
pub use category::CategoryAnomalyDetector;
pub use location::LocationAnomalyDetector;
pub use merchant::MerchantRiskDetector;
pub use sequence::SequenceAnomalyDetector;
pub use time::TimeAnomalyDetector;
pub use velocity::VelocityDetector;

/// A single detection model scoring one event against one user baseline.
pub trait Detector: Send + Sync {
    fn kind(&self) -> DetectorKind;

    /// Score in [0, 1]; 0.0 is neutral, 1.0 is maximally anomalous.
    fn score(&self, event: &TransactionEvent, baseline: &UserBaseline) -> f64;
}

/// All seven detectors in fixed priority order (`DetectorKind::ALL`).
pub fn registry(cold_start_min_samples: u64) -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(VelocityDetector::new(cold_start_min_samples)),
        Box::new(AmountAnomalyDetector::new(cold_start_min_samples)),
        Box::new(CategoryAnomalyDetector::new(cold_start_min_samples)),
        Box::new(MerchantRiskDetector::new(cold_start_min_samples)),
        Box::new(TimeAnomalyDetector::new(cold_start_min_samples)),
        Box::new(LocationAnomalyDetector::new()),
        Box::new(SequenceAnomalyDetector::new(cold_start_min_samples)),
    ]
}

/// Map a positive z-score through a bounded sigmoid: 0.0 at z <= 0,
/// approaching 1.0 as z grows.
pub(crate) fn bounded_sigmoid(z: f64) -> f64 {
    if z <= 0.0 {
        0.0
    } else {
        2.0 / (1.0 + (-z).exp()) - 1.0
    }
}
