//! Ensemble fusion of the seven detector scores.
//!
//! Stateless and side-effect-free: a given set of partial scores and weights
//! always produces the identical fused score, severity and reasons.

use crate::types::{DetectorKind, RiskScore, Severity, SeverityThresholds};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Fixed per-detector fusion weights; validated to sum to 1.0 at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionWeights {
    pub velocity: f64,
    pub amount: f64,
    pub category: f64,
    pub merchant: f64,
    pub time: f64,
    pub location: f64,
    pub sequence: f64,
}

impl FusionWeights {
    pub fn get(&self, kind: DetectorKind) -> f64 {
        match kind {
            DetectorKind::Velocity => self.velocity,
            DetectorKind::Amount => self.amount,
            DetectorKind::Category => self.category,
            DetectorKind::Merchant => self.merchant,
            DetectorKind::Time => self.time,
            DetectorKind::Location => self.location,
            DetectorKind::Sequence => self.sequence,
        }
    }

    /// Weights must be non-negative and sum to 1.0 (within 1e-6).
    pub fn validate(&self) -> Result<()> {
        let all = [
            self.velocity,
            self.amount,
            self.category,
            self.merchant,
            self.time,
            self.location,
            self.sequence,
        ];
        if all.iter().any(|w| *w < 0.0 || !w.is_finite()) {
            bail!("fusion weights must be finite and non-negative");
        }
        let sum: f64 = all.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            bail!("fusion weights must sum to 1.0, got {sum}");
        }
        Ok(())
    }
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            velocity: 0.10,
            amount: 0.30,
            category: 0.05,
            merchant: 0.20,
            time: 0.15,
            location: 0.15,
            sequence: 0.05,
        }
    }
}

/// Combines partial detector scores into one risk score with severity and
/// an ordered explanation.
pub struct ScoreFuser {
    weights: FusionWeights,
    thresholds: SeverityThresholds,
    explainability_cutoff: f64,
}

impl ScoreFuser {
    pub fn new(
        weights: FusionWeights,
        thresholds: SeverityThresholds,
        explainability_cutoff: f64,
    ) -> Result<Self> {
        weights.validate()?;
        Ok(Self {
            weights,
            thresholds,
            explainability_cutoff,
        })
    }

    /// Weighted sum of the partial scores, severity from the threshold
    /// ladder, reasons ordered by descending partial score with ties broken
    /// by the fixed detector priority order.
    pub fn fuse(
        &self,
        event_id: &str,
        user_id: &str,
        partial_scores: Vec<(DetectorKind, f64)>,
    ) -> RiskScore {
        let fused_score = partial_scores
            .iter()
            .map(|(kind, score)| self.weights.get(*kind) * score.clamp(0.0, 1.0))
            .sum::<f64>()
            .clamp(0.0, 1.0);

        let severity = Severity::from_score(fused_score, &self.thresholds);

        let mut reasons: Vec<(DetectorKind, f64)> = partial_scores
            .iter()
            .filter(|(_, score)| *score > self.explainability_cutoff)
            .copied()
            .collect();
        // Descending by score; DetectorKind's derived Ord is the priority
        // order, so equal scores resolve deterministically.
        reasons.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));

        RiskScore {
            event_id: event_id.to_string(),
            user_id: user_id.to_string(),
            partial_scores,
            fused_score,
            severity,
            reasons: reasons.into_iter().map(|(kind, _)| kind).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fuser() -> ScoreFuser {
        ScoreFuser::new(
            FusionWeights::default(),
            SeverityThresholds::default(),
            0.5,
        )
        .unwrap()
    }

    fn partials(values: [f64; 7]) -> Vec<(DetectorKind, f64)> {
        DetectorKind::ALL.iter().copied().zip(values).collect()
    }

    #[test]
    fn test_default_weights_are_valid() {
        assert!(FusionWeights::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let mut weights = FusionWeights::default();
        weights.amount = 0.9;
        assert!(weights.validate().is_err());

        let mut weights = FusionWeights::default();
        weights.velocity = -0.1;
        weights.amount += 0.2;
        assert!(weights.validate().is_err());
    }

    #[test]
    fn test_fusion_is_deterministic() {
        let fuser = fuser();
        let p = partials([0.3, 0.9, 0.1, 0.7, 0.2, 0.6, 0.0]);

        let first = fuser.fuse("evt_1", "user_1", p.clone());
        let second = fuser.fuse("evt_1", "user_1", p);

        assert_eq!(first.fused_score, second.fused_score);
        assert_eq!(first.severity, second.severity);
        assert_eq!(first.reasons, second.reasons);
    }

    #[test]
    fn test_all_zero_partials_are_safe() {
        let score = fuser().fuse("evt_1", "user_1", partials([0.0; 7]));
        assert_eq!(score.fused_score, 0.0);
        assert_eq!(score.severity, Severity::Safe);
        assert!(score.reasons.is_empty());
    }

    #[test]
    fn test_all_max_partials_are_critical() {
        let score = fuser().fuse("evt_1", "user_1", partials([1.0; 7]));
        assert!((score.fused_score - 1.0).abs() < 1e-9);
        assert_eq!(score.severity, Severity::Critical);
        assert_eq!(score.reasons.len(), 7);
    }

    #[test]
    fn test_reasons_ordered_by_score_then_priority() {
        let score = fuser().fuse(
            "evt_1",
            "user_1",
            partials([0.7, 0.9, 0.1, 0.7, 0.2, 0.95, 0.0]),
        );
        // Location 0.95, Amount 0.9, then the 0.7 tie resolved by priority:
        // Velocity before Merchant.
        assert_eq!(
            score.reasons,
            vec![
                DetectorKind::Location,
                DetectorKind::Amount,
                DetectorKind::Velocity,
                DetectorKind::Merchant,
            ]
        );
    }

    #[test]
    fn test_cutoff_is_exclusive() {
        let score = fuser().fuse("evt_1", "user_1", partials([0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]));
        assert!(score.reasons.is_empty());
    }
}
