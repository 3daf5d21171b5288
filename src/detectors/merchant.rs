//! Merchant risk detector: static merchant risk combined with novelty.

use super::Detector;
use crate::baseline::UserBaseline;
use crate::types::{DetectorKind, TransactionEvent};

/// Merchant id substrings carrying a static high risk weight, independent of
/// user history.
const HIGH_RISK_PATTERNS: [&str; 5] = [
    "crypto",
    "gambling",
    "casino",
    "wire_transfer",
    "international_transfer",
];

pub struct MerchantRiskDetector {
    min_samples: u64,
}

impl MerchantRiskDetector {
    pub fn new(min_samples: u64) -> Self {
        Self { min_samples }
    }

    fn static_risk(merchant_id: &str) -> f64 {
        let lowered = merchant_id.to_lowercase();
        if HIGH_RISK_PATTERNS.iter().any(|p| lowered.contains(p)) {
            0.95
        } else {
            0.0
        }
    }
}

impl Detector for MerchantRiskDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Merchant
    }

    /// The static risk weight applies regardless of history; the novelty
    /// component needs enough observations to mean anything.
    fn score(&self, event: &TransactionEvent, baseline: &UserBaseline) -> f64 {
        let static_risk = Self::static_risk(&event.merchant_id);

        let novelty = if baseline.observations < self.min_samples {
            0.0
        } else {
            0.9 * (1.0 - baseline.merchant_familiarity(&event.merchant_id))
        };

        static_risk.max(novelty)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{event, seeded_baseline};
    use super::*;

    #[test]
    fn test_known_merchant_is_neutral() {
        let detector = MerchantRiskDetector::new(5);
        let baseline = seeded_baseline(10);
        assert!(detector.score(&event(11, 50.0), &baseline) < 0.1);
    }

    #[test]
    fn test_unseen_merchant_scores_high() {
        let detector = MerchantRiskDetector::new(5);
        let baseline = seeded_baseline(10);
        let mut e = event(11, 50.0);
        e.merchant_id = "merchant_unknown_42".to_string();
        let score = detector.score(&e, &baseline);
        assert!(score > 0.8);
    }

    #[test]
    fn test_static_risk_fires_even_during_cold_start() {
        let detector = MerchantRiskDetector::new(5);
        let baseline = seeded_baseline(1);
        let mut e = event(2, 50.0);
        e.merchant_id = "acme_crypto_exchange".to_string();
        assert!(detector.score(&e, &baseline) > 0.9);
    }

    #[test]
    fn test_novelty_gated_during_cold_start() {
        let detector = MerchantRiskDetector::new(5);
        let baseline = seeded_baseline(1);
        let mut e = event(2, 50.0);
        e.merchant_id = "merchant_new".to_string();
        assert_eq!(detector.score(&e, &baseline), 0.0);
    }
}
