//! Risk score and severity classification

use serde::{Deserialize, Serialize};
use std::fmt;

/// The seven detection dimensions, in fixed priority order.
///
/// The declaration order doubles as the deterministic tie-break order when
/// sorting `reasons` on a fused score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Velocity,
    Amount,
    Category,
    Merchant,
    Time,
    Location,
    Sequence,
}

impl DetectorKind {
    /// All detector kinds in priority order.
    pub const ALL: [DetectorKind; 7] = [
        DetectorKind::Velocity,
        DetectorKind::Amount,
        DetectorKind::Category,
        DetectorKind::Merchant,
        DetectorKind::Time,
        DetectorKind::Location,
        DetectorKind::Sequence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::Velocity => "velocity",
            DetectorKind::Amount => "amount_anomaly",
            DetectorKind::Category => "category_anomaly",
            DetectorKind::Merchant => "merchant_risk",
            DetectorKind::Time => "time_anomaly",
            DetectorKind::Location => "location_anomaly",
            DetectorKind::Sequence => "sequence_anomaly",
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity classification of a fused risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Map a fused score onto the severity ladder.
    ///
    /// Thresholds are closed lower bounds: a score of exactly `thresholds.critical`
    /// classifies as Critical.
    pub fn from_score(score: f64, thresholds: &SeverityThresholds) -> Self {
        if score >= thresholds.critical {
            Severity::Critical
        } else if score >= thresholds.high {
            Severity::High
        } else if score >= thresholds.medium {
            Severity::Medium
        } else if score >= thresholds.low {
            Severity::Low
        } else {
            Severity::Safe
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Safe => "safe",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configurable severity ladder thresholds.
///
/// Each field is the closed lower bound of its band; everything below `low`
/// is Safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeverityThresholds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            low: 0.2,
            medium: 0.4,
            high: 0.6,
            critical: 0.8,
        }
    }
}

/// The fused risk assessment of a single transaction event.
///
/// Produced by the ensemble fuser; immutable once produced. `partial_scores`
/// keeps the fixed detector order so that replaying the same event against
/// the same baseline snapshot reproduces the identical value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskScore {
    pub event_id: String,
    pub user_id: String,
    /// Per-detector scores in [0, 1], in `DetectorKind::ALL` order
    pub partial_scores: Vec<(DetectorKind, f64)>,
    /// Weighted combination of the partial scores, in [0, 1]
    pub fused_score: f64,
    pub severity: Severity,
    /// Detectors above the explainability cutoff, highest score first
    pub reasons: Vec<DetectorKind>,
}
