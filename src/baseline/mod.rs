//! Per-user baseline arena.
//!
//! Keyed by user id with per-entry locking; cross-user access never
//! contends on a global lock. Lane affinity in the pipeline guarantees a
//! single logical writer per user, the map only enforces memory safety.

pub mod profile;

pub use profile::UserBaseline;

use crate::types::TransactionEvent;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

/// Arena of per-user baselines.
pub struct BaselineStore {
    baselines: DashMap<String, UserBaseline>,
    decay: f64,
}

impl BaselineStore {
    pub fn new(decay: f64) -> Self {
        Self {
            baselines: DashMap::new(),
            decay,
        }
    }

    /// Run `f` against the user's baseline, creating a fresh neutral one for
    /// a cold-start user. Read access for detectors; no mutation.
    pub fn with_baseline<T>(&self, user_id: &str, f: impl FnOnce(&UserBaseline) -> T) -> T {
        let entry = self
            .baselines
            .entry(user_id.to_string())
            .or_insert_with(|| UserBaseline::new(self.decay));
        f(entry.value())
    }

    /// Fold a scored event into the user's baseline.
    ///
    /// Called only by the pipeline's post-scoring step; detectors and the
    /// fuser never mutate baselines.
    pub fn update(&self, user_id: &str, event: &TransactionEvent) {
        let mut entry = self
            .baselines
            .entry(user_id.to_string())
            .or_insert_with(|| UserBaseline::new(self.decay));
        entry.observe(event);
    }

    /// Last processed sequence number for the user, 0 if unknown.
    pub fn last_sequence_no(&self, user_id: &str) -> u64 {
        self.baselines
            .get(user_id)
            .map(|b| b.last_sequence_no)
            .unwrap_or(0)
    }

    /// Remove a single user's baseline.
    pub fn evict(&self, user_id: &str) -> bool {
        self.baselines.remove(user_id).is_some()
    }

    /// Drop baselines idle longer than `window_secs`. Returns evicted count.
    pub fn evict_inactive(&self, window_secs: u64) -> usize {
        let cutoff = Utc::now() - Duration::seconds(window_secs as i64);
        let before = self.baselines.len();
        self.baselines.retain(|_, baseline| baseline.last_seen >= cutoff);
        let evicted = before - self.baselines.len();
        if evicted > 0 {
            debug!(evicted, "Evicted inactive user baselines");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.baselines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.baselines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(user: &str, seq: u64) -> TransactionEvent {
        TransactionEvent {
            event_id: format!("evt_{}_{}", user, seq),
            user_id: user.to_string(),
            timestamp: Utc::now(),
            amount: 25.0,
            category: "food".to_string(),
            merchant_id: "m_1".to_string(),
            geo_location: None,
            sequence_no: seq,
        }
    }

    #[test]
    fn test_cold_start_user_gets_neutral_baseline() {
        let store = BaselineStore::new(0.2);
        let observations = store.with_baseline("new_user", |b| b.observations);
        assert_eq!(observations, 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_and_sequence_tracking() {
        let store = BaselineStore::new(0.2);
        store.update("user_1", &event("user_1", 1));
        store.update("user_1", &event("user_1", 2));

        assert_eq!(store.last_sequence_no("user_1"), 2);
        assert_eq!(store.last_sequence_no("unknown"), 0);
        assert_eq!(store.with_baseline("user_1", |b| b.observations), 2);
    }

    #[test]
    fn test_evict() {
        let store = BaselineStore::new(0.2);
        store.update("user_1", &event("user_1", 1));
        assert!(store.evict("user_1"));
        assert!(!store.evict("user_1"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_evict_inactive_keeps_recent_users() {
        let store = BaselineStore::new(0.2);
        store.update("user_1", &event("user_1", 1));
        // A generous window keeps the just-updated user
        assert_eq!(store.evict_inactive(3600), 0);
        assert_eq!(store.len(), 1);
    }
}
