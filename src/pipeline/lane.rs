//! Per-user lane worker.
//!
//! All events for one user flow through a single lane, giving the scoring
//! path exclusive logical ownership of that user's baseline and strict
//! sequence ordering. Lanes for different users run in parallel.

use super::{EventState, PipelineCtx};
use crate::errors::PipelineError;
use crate::types::{DetectorKind, RiskScore, TransactionEvent};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Base delay between sink write attempts; doubles per attempt, capped.
const SINK_RETRY_BACKOFF_MS: u64 = 25;

/// Bounded exponential backoff: 25ms, 50ms, 100ms, ... capped at 400ms.
fn retry_backoff(attempt: u32) -> Duration {
    Duration::from_millis(SINK_RETRY_BACKOFF_MS << (attempt - 1).min(4))
}

pub(super) struct Lane {
    user_id: String,
    rx: mpsc::Receiver<TransactionEvent>,
    ctx: Arc<PipelineCtx>,
    /// Highest sequence_no with a terminal record (processed or failed)
    last_sequence_no: u64,
}

impl Lane {
    pub(super) fn new(
        user_id: String,
        rx: mpsc::Receiver<TransactionEvent>,
        ctx: Arc<PipelineCtx>,
    ) -> Self {
        let last_sequence_no = ctx.store.last_sequence_no(&user_id);
        Self {
            user_id,
            rx,
            ctx,
            last_sequence_no,
        }
    }

    /// Drive queued events to a terminal state until the channel closes.
    /// Closing the sender (shutdown) drains the queue before the lane exits.
    pub(super) async fn run(mut self) {
        while let Some(event) = self.rx.recv().await {
            self.process(event).await;
        }
        debug!(user_id = %self.user_id, "Lane drained and stopped");
    }

    async fn process(&mut self, event: TransactionEvent) {
        let started = Instant::now();
        let mut state = EventState::Received;

        if let Err(err) = self.check_admissible(&event) {
            match &err {
                PipelineError::DuplicateEvent { event_id } => {
                    // At-least-once feed; not an operator-visible problem
                    debug!(event_id = %event_id, "Duplicate delivery ignored");
                }
                _ => {
                    warn!(
                        user_id = %self.user_id,
                        state = ?state,
                        error = %err,
                        "Event rejected"
                    );
                }
            }
            self.ctx
                .metrics
                .record_issue_for(&self.user_id, err.issue_kind());
            return;
        }

        state = EventState::Scoring;
        let partials = match self.score(&event) {
            Ok(partials) => partials,
            Err(err) => {
                // Deadline exceeded: record the failure so the sequence
                // number is not silently skipped, then move on.
                self.fail(&event, state, err);
                return;
            }
        };

        let score = self
            .ctx
            .fuser
            .fuse(&event.event_id, &event.user_id, partials);
        state = EventState::Aggregated;
        debug!(
            event_id = %event.event_id,
            fused_score = score.fused_score,
            state = ?state,
            "Partial scores fused"
        );

        // Score-then-update: the baseline never sees the event it judged.
        self.ctx.store.update(&event.user_id, &event);
        state = EventState::BaselineUpdated;

        match self.write_sink(&score).await {
            Ok(()) => {
                state = EventState::SinkWritten;
                self.last_sequence_no = event.sequence_no;
                self.ctx
                    .metrics
                    .record_event(started.elapsed(), score.fused_score, score.severity);
                debug!(
                    event_id = %event.event_id,
                    user_id = %event.user_id,
                    fused_score = score.fused_score,
                    severity = %score.severity,
                    state = ?state,
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "Event processed"
                );
            }
            Err(err) => {
                // Scoring succeeded, so the baseline update stays applied;
                // only the risk score is reported lost.
                self.fail(&event, state, err);
            }
        }
    }

    /// Ingestion idempotence and per-user ordering checks.
    fn check_admissible(&self, event: &TransactionEvent) -> Result<(), PipelineError> {
        if self
            .ctx
            .seen_events
            .insert(event.event_id.clone(), Utc::now())
            .is_some()
        {
            return Err(PipelineError::DuplicateEvent {
                event_id: event.event_id.clone(),
            });
        }
        if event.sequence_no <= self.last_sequence_no {
            return Err(PipelineError::OutOfOrderEvent {
                user_id: self.user_id.clone(),
                sequence_no: event.sequence_no,
                last_sequence_no: self.last_sequence_no,
            });
        }
        Ok(())
    }

    /// Run all detectors against the current baseline snapshot.
    ///
    /// Scoring is synchronous, non-suspending computation; the deadline is
    /// checked between detectors and after the last one, so one slow
    /// detector cannot stall the lane past the configured budget.
    fn score(
        &self,
        event: &TransactionEvent,
    ) -> Result<Vec<(DetectorKind, f64)>, PipelineError> {
        let deadline = Duration::from_millis(self.ctx.pipeline.scoring_deadline_ms);
        let started = Instant::now();

        let mut partials = Vec::with_capacity(self.ctx.detectors.len());
        for detector in &self.ctx.detectors {
            let partial = self
                .ctx
                .store
                .with_baseline(&event.user_id, |baseline| detector.score(event, baseline));
            partials.push((detector.kind(), partial.clamp(0.0, 1.0)));

            if started.elapsed() > deadline {
                return Err(PipelineError::ScoringTimeout {
                    event_id: event.event_id.clone(),
                    deadline_ms: self.ctx.pipeline.scoring_deadline_ms,
                });
            }
        }
        Ok(partials)
    }

    /// Persist the risk score with bounded retry and backoff.
    async fn write_sink(&self, score: &RiskScore) -> Result<(), PipelineError> {
        let attempts = self.ctx.pipeline.sink_retry_limit.max(1);
        for attempt in 1..=attempts {
            match self.ctx.sink.record(score) {
                Ok(created) => {
                    if let Some(alert) = created {
                        // Receiver may have been dropped; the sink already
                        // holds the durable copy.
                        let _ = self.ctx.alert_tx.send(alert);
                    }
                    return Ok(());
                }
                // A concurrent retry already recorded this event; done.
                Err(PipelineError::DuplicateEvent { .. }) => return Ok(()),
                Err(err) if attempt < attempts => {
                    warn!(
                        event_id = %score.event_id,
                        attempt,
                        error = %err,
                        "Sink write failed, retrying"
                    );
                    tokio::time::sleep(retry_backoff(attempt)).await;
                }
                Err(_) => {
                    return Err(PipelineError::SinkWriteFailure {
                        event_id: score.event_id.clone(),
                        attempts,
                    });
                }
            }
        }
        Ok(())
    }

    /// Record a terminal failure for this event and advance the lane.
    fn fail(&mut self, event: &TransactionEvent, state: EventState, err: PipelineError) {
        error!(
            event_id = %event.event_id,
            user_id = %event.user_id,
            state = ?EventState::Failed,
            failed_at = ?state,
            error = %err,
            "Event failed"
        );
        self.ctx
            .metrics
            .record_issue_for(&self.user_id, err.issue_kind());
        self.last_sequence_no = event.sequence_no;
    }
}
