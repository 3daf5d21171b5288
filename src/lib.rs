//! Risk Guard
//!
//! A real-time transaction risk scoring engine: per-user adaptive baselines,
//! seven independent detection models, deterministic ensemble fusion, and a
//! queryable alert/dashboard sink, wired together by an ordered, backpressured
//! stream ingestion pipeline.

pub mod baseline;
pub mod config;
pub mod consumer;
pub mod detectors;
pub mod errors;
pub mod fusion;
pub mod metrics;
pub mod pipeline;
pub mod producer;
pub mod sink;
pub mod types;

pub use config::AppConfig;
pub use consumer::EventConsumer;
pub use errors::PipelineError;
pub use fusion::{FusionWeights, ScoreFuser};
pub use metrics::PipelineMetrics;
pub use pipeline::Pipeline;
pub use producer::AlertProducer;
pub use sink::{AlertSink, DashboardSummary};
pub use types::{Alert, DetectorKind, RiskScore, Severity, TransactionEvent};
