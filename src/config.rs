//! Configuration management for the risk scoring pipeline

use crate::fusion::FusionWeights;
use crate::types::{Severity, SeverityThresholds};
use anyhow::{bail, Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub detection: DetectionConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming transaction events
    pub transaction_subject: String,
    /// Subject for outgoing risk alerts
    pub alert_subject: String,
}

/// Detection and fusion configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Per-detector fusion weights; must sum to 1.0
    #[serde(default)]
    pub fusion_weights: FusionWeights,
    /// Severity ladder (closed lower bounds)
    #[serde(default)]
    pub severity_thresholds: SeverityThresholds,
    /// Partial scores above this value appear in the alert's reasons
    #[serde(default = "default_explainability_cutoff")]
    pub explainability_cutoff: f64,
    /// Minimum severity that creates an alert
    #[serde(default = "default_alert_severity")]
    pub alert_severity_threshold: Severity,
    /// Observations per dimension before its detector stops being neutral
    #[serde(default = "default_cold_start_min_samples")]
    pub cold_start_min_samples: u64,
    /// EWMA decay factor for baseline updates (0 < decay < 1)
    #[serde(default = "default_baseline_decay")]
    pub baseline_decay: f64,
}

fn default_explainability_cutoff() -> f64 {
    0.5
}

fn default_alert_severity() -> Severity {
    Severity::Medium
}

fn default_cold_start_min_samples() -> u64 {
    5
}

fn default_baseline_decay() -> f64 {
    0.2
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            fusion_weights: FusionWeights::default(),
            severity_thresholds: SeverityThresholds::default(),
            explainability_cutoff: default_explainability_cutoff(),
            alert_severity_threshold: default_alert_severity(),
            cold_start_min_samples: default_cold_start_min_samples(),
            baseline_decay: default_baseline_decay(),
        }
    }
}

/// Pipeline concurrency and resource configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Bounded queue depth per user lane (backpressure point)
    #[serde(default = "default_queue_depth_limit")]
    pub queue_depth_limit: usize,
    /// Deadline for scoring a single event
    #[serde(default = "default_scoring_deadline_ms")]
    pub scoring_deadline_ms: u64,
    /// Bounded retries for sink writes
    #[serde(default = "default_sink_retry_limit")]
    pub sink_retry_limit: u32,
    /// Baselines idle longer than this are evicted
    #[serde(default = "default_inactivity_eviction_secs")]
    pub inactivity_eviction_secs: u64,
    /// Alerts older than this are pruned from the sink
    #[serde(default = "default_alert_retention_secs")]
    pub alert_retention_secs: u64,
    /// Most-recent-first alert window returned by the dashboard
    #[serde(default = "default_dashboard_recent_alerts")]
    pub dashboard_recent_alerts: usize,
}

fn default_queue_depth_limit() -> usize {
    64
}

fn default_scoring_deadline_ms() -> u64 {
    50
}

fn default_sink_retry_limit() -> u32 {
    3
}

fn default_inactivity_eviction_secs() -> u64 {
    30 * 24 * 3600
}

fn default_alert_retention_secs() -> u64 {
    90 * 24 * 3600
}

fn default_dashboard_recent_alerts() -> usize {
    20
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_depth_limit: default_queue_depth_limit(),
            scoring_deadline_ms: default_scoring_deadline_ms(),
            sink_retry_limit: default_sink_retry_limit(),
            inactivity_eviction_secs: default_inactivity_eviction_secs(),
            alert_retention_secs: default_alert_retention_secs(),
            dashboard_recent_alerts: default_dashboard_recent_alerts(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints at startup.
    pub fn validate(&self) -> Result<()> {
        self.detection.fusion_weights.validate()?;

        let t = &self.detection.severity_thresholds;
        if !(t.low < t.medium && t.medium < t.high && t.high < t.critical) {
            bail!("severity thresholds must be strictly ascending");
        }
        if self.detection.baseline_decay <= 0.0 || self.detection.baseline_decay >= 1.0 {
            bail!("baseline_decay must be in (0, 1)");
        }
        if self.pipeline.queue_depth_limit == 0 {
            bail!("queue_depth_limit must be at least 1");
        }
        if self.pipeline.scoring_deadline_ms == 0 {
            bail!("scoring_deadline_ms must be at least 1");
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                transaction_subject: "transactions".to_string(),
                alert_subject: "risk.alerts".to_string(),
            },
            detection: DetectionConfig::default(),
            pipeline: PipelineConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.detection.cold_start_min_samples, 5);
        assert_eq!(config.detection.alert_severity_threshold, Severity::Medium);
        assert_eq!(config.pipeline.scoring_deadline_ms, 50);
    }

    #[test]
    fn test_bad_thresholds_rejected() {
        let mut config = AppConfig::default();
        config.detection.severity_thresholds.high = 0.3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_weights_rejected() {
        let mut config = AppConfig::default();
        config.detection.fusion_weights.amount = 0.99;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_decay_rejected() {
        let mut config = AppConfig::default();
        config.detection.baseline_decay = 1.5;
        assert!(config.validate().is_err());
    }
}
