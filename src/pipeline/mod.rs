//! Stream ingestion pipeline.
//!
//! The ordering and concurrency backbone: events are fanned out to per-user
//! lanes so that one user's events are processed strictly in sequence order
//! while different users proceed in parallel. Each lane queue is bounded;
//! `ingest` awaiting on a full queue is the backpressure signal to the feed.

mod lane;

use crate::baseline::BaselineStore;
use crate::config::{AppConfig, PipelineConfig};
use crate::detectors::{self, Detector};
use crate::errors::PipelineError;
use crate::fusion::ScoreFuser;
use crate::metrics::PipelineMetrics;
use crate::sink::AlertSink;
use crate::types::{Alert, TransactionEvent};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use lane::Lane;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Lifecycle of a single in-flight event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventState {
    Received,
    Scoring,
    Aggregated,
    BaselineUpdated,
    /// Terminal: fully processed
    SinkWritten,
    /// Terminal: unrecoverable per-event error, recorded and reported
    Failed,
}

/// Shared context handed to every lane.
pub(crate) struct PipelineCtx {
    pub(crate) pipeline: PipelineConfig,
    pub(crate) store: BaselineStore,
    pub(crate) detectors: Vec<Box<dyn Detector>>,
    pub(crate) fuser: ScoreFuser,
    pub(crate) sink: AlertSink,
    pub(crate) metrics: Arc<PipelineMetrics>,
    /// Ingestion-level event_id dedup for the at-least-once feed, keyed
    /// to first-seen time so entries age out on the retention window
    pub(crate) seen_events: DashMap<String, DateTime<Utc>>,
    /// Created alerts, forwarded to the outbound publisher
    pub(crate) alert_tx: mpsc::UnboundedSender<Alert>,
}

struct LaneHandle {
    tx: mpsc::Sender<TransactionEvent>,
    task: JoinHandle<()>,
    /// Unix time of the last event routed to this lane; idle lanes are
    /// reaped by the maintenance tick
    last_active: AtomicI64,
}

/// The risk scoring pipeline.
pub struct Pipeline {
    ctx: Arc<PipelineCtx>,
    lanes: DashMap<String, LaneHandle>,
    shutting_down: AtomicBool,
    alert_rx: Mutex<Option<mpsc::UnboundedReceiver<Alert>>>,
}

impl Pipeline {
    /// Build a pipeline with the standard seven-detector registry.
    pub fn new(config: &AppConfig, metrics: Arc<PipelineMetrics>) -> Result<Self> {
        let detectors = detectors::registry(config.detection.cold_start_min_samples);
        Self::with_detectors(config, metrics, detectors)
    }

    /// Build a pipeline with an explicit detector set.
    pub fn with_detectors(
        config: &AppConfig,
        metrics: Arc<PipelineMetrics>,
        detectors: Vec<Box<dyn Detector>>,
    ) -> Result<Self> {
        let fuser = ScoreFuser::new(
            config.detection.fusion_weights.clone(),
            config.detection.severity_thresholds.clone(),
            config.detection.explainability_cutoff,
        )?;
        let sink = AlertSink::new(
            config.detection.alert_severity_threshold,
            config.pipeline.alert_retention_secs,
            config.pipeline.dashboard_recent_alerts,
            metrics.clone(),
        );

        let (alert_tx, alert_rx) = mpsc::unbounded_channel();
        Ok(Self {
            ctx: Arc::new(PipelineCtx {
                pipeline: config.pipeline.clone(),
                store: BaselineStore::new(config.detection.baseline_decay),
                detectors,
                fuser,
                sink,
                metrics,
                seen_events: DashMap::new(),
                alert_tx,
            }),
            lanes: DashMap::new(),
            shutting_down: AtomicBool::new(false),
            alert_rx: Mutex::new(Some(alert_rx)),
        })
    }

    /// Take the stream of created alerts, for forwarding to the outbound
    /// publisher. Yields `None` after the first call.
    pub fn take_alert_stream(&self) -> Option<mpsc::UnboundedReceiver<Alert>> {
        self.alert_rx.lock().ok().and_then(|mut rx| rx.take())
    }

    /// Submit one event from the feed.
    ///
    /// Validates the event, then routes it to its user's lane. Awaiting on a
    /// full lane queue is the backpressure point; the event is never dropped
    /// silently. Rejections that happen inside the lane (ordering, dedup,
    /// timeouts) are reported through metrics and logs, not this result.
    pub async fn ingest(&self, event: TransactionEvent) -> Result<(), PipelineError> {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(PipelineError::ShuttingDown);
        }
        if let Err(err) = event.validate() {
            self.ctx
                .metrics
                .record_issue_for(&event.user_id, err.issue_kind());
            return Err(err);
        }

        let tx = self.lane_sender(&event.user_id);
        tx.send(event).await.map_err(|_| PipelineError::ShuttingDown)
    }

    /// Sender for the user's lane, spawning the lane on first use.
    fn lane_sender(&self, user_id: &str) -> mpsc::Sender<TransactionEvent> {
        let handle = self.lanes.entry(user_id.to_string()).or_insert_with(|| {
            let (tx, rx) = mpsc::channel(self.ctx.pipeline.queue_depth_limit);
            let lane = Lane::new(user_id.to_string(), rx, self.ctx.clone());
            debug!(user_id, "Spawning user lane");
            LaneHandle {
                tx,
                task: tokio::spawn(lane.run()),
                last_active: AtomicI64::new(Utc::now().timestamp()),
            }
        });
        handle
            .last_active
            .store(Utc::now().timestamp(), Ordering::Relaxed);
        handle.tx.clone()
    }

    /// Graceful shutdown: stop accepting new events, let every queued event
    /// reach a terminal state, then await all lane tasks.
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);

        let users: Vec<String> = self.lanes.iter().map(|entry| entry.key().clone()).collect();
        let mut tasks = Vec::with_capacity(users.len());
        for user in users {
            if let Some((_, handle)) = self.lanes.remove(&user) {
                // Dropping the sender closes the queue; the lane drains it.
                drop(handle.tx);
                tasks.push(handle.task);
            }
        }
        for task in tasks {
            let _ = task.await;
        }
        info!("Pipeline shut down; all lanes drained");
    }

    /// Periodic housekeeping: reap idle lanes together with their baselines,
    /// age out ingestion dedup entries, and prune expired sink state.
    /// Returns (users evicted, alerts pruned).
    pub fn maintenance_tick(&self) -> (usize, usize) {
        let now = Utc::now();
        let idle_cutoff = now.timestamp() - self.ctx.pipeline.inactivity_eviction_secs as i64;
        let idle: Vec<String> = self
            .lanes
            .iter()
            .filter(|lane| lane.value().last_active.load(Ordering::Relaxed) <= idle_cutoff)
            .map(|lane| lane.key().clone())
            .collect();

        let mut evicted = 0;
        for user in idle {
            // Lane and baseline are evicted together, so a returning user
            // gets a fresh lane whose sequence cursor re-seeds from a fresh
            // baseline.
            if let Some((_, handle)) = self.lanes.remove(&user) {
                // Closing the queue lets the lane drain anything still in
                // flight and exit on its own.
                drop(handle.tx);
            }
            if self.ctx.store.evict(&user) {
                evicted += 1;
            }
            self.ctx.metrics.forget_user(&user);
        }
        if evicted > 0 {
            debug!(evicted, "Reaped idle user lanes");
        }
        evicted += self
            .ctx
            .store
            .evict_inactive(self.ctx.pipeline.inactivity_eviction_secs);

        let dedup_cutoff = now - Duration::seconds(self.ctx.pipeline.alert_retention_secs as i64);
        self.ctx.seen_events.retain(|_, seen| *seen >= dedup_cutoff);

        let pruned = self.ctx.sink.prune_expired();
        (evicted, pruned)
    }

    pub fn sink(&self) -> &AlertSink {
        &self.ctx.sink
    }

    pub fn baselines(&self) -> &BaselineStore {
        &self.ctx.store
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.ctx.metrics
    }

    /// Number of live user lanes.
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }
}
