//! Type definitions for the risk scoring engine

pub mod alert;
pub mod event;
pub mod score;

pub use alert::Alert;
pub use event::TransactionEvent;
pub use score::{DetectorKind, RiskScore, Severity, SeverityThresholds};
