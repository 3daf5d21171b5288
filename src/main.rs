//! Risk Guard - Main Entry Point
//!
//! Consumes transaction events from NATS, scores each against the user's
//! adaptive baseline through seven detectors, and publishes risk alerts.

use anyhow::Result;
use futures::StreamExt;
use risk_guard::{
    config::AppConfig, consumer::EventConsumer, metrics::MetricsReporter,
    metrics::PipelineMetrics, producer::AlertProducer, Pipeline, TransactionEvent,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("risk_guard=info".parse()?),
        )
        .init();

    info!("Starting Risk Guard");

    // Load configuration
    let config = AppConfig::load()?;
    info!("Configuration loaded successfully");
    info!(
        alert_threshold = %config.detection.alert_severity_threshold,
        cold_start_min_samples = config.detection.cold_start_min_samples,
        scoring_deadline_ms = config.pipeline.scoring_deadline_ms,
        queue_depth_limit = config.pipeline.queue_depth_limit,
        "Detection configuration"
    );

    // Initialize metrics and pipeline
    let metrics = Arc::new(PipelineMetrics::new());
    let pipeline = Arc::new(Pipeline::new(&config, metrics.clone())?);
    info!("Pipeline initialized with 7 detectors");

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!(url = %config.nats.url, "Connected to NATS");

    let consumer = EventConsumer::new(client.clone(), &config.nats.transaction_subject);
    let producer = AlertProducer::new(client.clone(), &config.nats.alert_subject);

    info!(subject = %consumer.subject(), "Listening for transaction events");
    info!(subject = %producer.subject(), "Publishing alerts");

    // Forward created alerts to the outbound subject
    let mut alert_rx = pipeline
        .take_alert_stream()
        .expect("alert stream taken once at startup");
    tokio::spawn(async move {
        while let Some(alert) = alert_rx.recv().await {
            if let Err(e) = producer.publish(&alert).await {
                error!(alert_id = %alert.alert_id, error = %e, "Failed to publish alert");
            }
        }
    });

    // Periodic metrics summary
    let metrics_clone = metrics.clone();
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(metrics_clone, 30);
        reporter.start().await;
    });

    // Periodic housekeeping: baseline eviction and alert retention
    let maintenance_pipeline = pipeline.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let (evicted, pruned) = maintenance_pipeline.maintenance_tick();
            if evicted > 0 || pruned > 0 {
                info!(evicted, pruned, "Maintenance tick");
            }
        }
    });

    // Feed-consumption loop; ingest() awaiting on a full lane queue is the
    // backpressure signal to the feed.
    let mut subscription = consumer.subscribe().await?;
    loop {
        tokio::select! {
            message = subscription.next() => {
                let Some(message) = message else {
                    warn!("Transaction feed closed");
                    break;
                };
                match serde_json::from_slice::<TransactionEvent>(&message.payload) {
                    Ok(event) => {
                        if let Err(e) = pipeline.ingest(event).await {
                            warn!(error = %e, "Event rejected at ingestion");
                        }
                    }
                    Err(e) => {
                        metrics.record_issue("malformed");
                        warn!(error = %e, "Failed to deserialize transaction event");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    // Graceful shutdown: drain lanes to terminal states before exit
    pipeline.shutdown().await;
    metrics.print_summary();

    Ok(())
}
