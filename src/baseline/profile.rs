//! Per-user adaptive statistical baseline.
//!
//! All dimensions use exponentially-weighted moving updates so recent
//! behavior dominates without storing unbounded history.

use crate::types::TransactionEvent;
use chrono::{DateTime, Timelike, Utc};
use std::collections::HashMap;

/// Weight below which decayed map entries are dropped.
const PRUNE_EPSILON: f64 = 0.01;

/// Maximum geo regions remembered per user.
const MAX_REGIONS: usize = 16;

/// Exponentially-weighted mean and variance of a single scalar dimension.
#[derive(Debug, Clone, Default)]
pub struct EwmaStat {
    pub mean: f64,
    variance: f64,
    pub count: u64,
}

impl EwmaStat {
    /// Fold one observation in with decay factor `alpha`.
    pub fn update(&mut self, value: f64, alpha: f64) {
        if self.count == 0 {
            self.mean = value;
            self.variance = 0.0;
        } else {
            let diff = value - self.mean;
            let incr = alpha * diff;
            self.mean += incr;
            self.variance = (1.0 - alpha) * (self.variance + diff * incr);
        }
        self.count += 1;
    }

    /// Standard deviation, floored to avoid division blow-ups on flat history.
    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt().max(f64::EPSILON)
    }

    /// Absolute z-score of `value` against this distribution.
    pub fn z_score(&self, value: f64) -> f64 {
        (value - self.mean).abs() / self.std_dev()
    }
}

/// Rolling statistical profile of one user's transaction behavior.
///
/// Owned by the user's pipeline lane; mutated only through [`Self::observe`]
/// after the event has been scored, so an event never contaminates its own
/// judgment.
#[derive(Debug, Clone)]
pub struct UserBaseline {
    /// Amount distribution
    pub amount: EwmaStat,
    /// Seconds between consecutive transactions
    pub inter_arrival: EwmaStat,
    /// Decayed frequency weight per category
    pub categories: HashMap<String, f64>,
    /// Decayed trust weight per merchant
    pub merchants: HashMap<String, f64>,
    /// Decayed hour-of-day counts
    pub hour_histogram: [f64; 24],
    /// Last-seen time per geo region
    pub regions: HashMap<String, DateTime<Utc>>,
    /// Decayed category-to-category transition counts
    pub transitions: HashMap<String, HashMap<String, f64>>,
    /// Category of the most recent transaction
    pub last_category: Option<String>,
    /// Region of the most recent transaction that carried one
    pub last_region: Option<(String, DateTime<Utc>)>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub last_sequence_no: u64,
    pub last_seen: DateTime<Utc>,
    /// Total events folded into this baseline
    pub observations: u64,
    decay: f64,
}

impl UserBaseline {
    /// Fresh, neutral baseline for a cold-start user.
    pub fn new(decay: f64) -> Self {
        Self {
            amount: EwmaStat::default(),
            inter_arrival: EwmaStat::default(),
            categories: HashMap::new(),
            merchants: HashMap::new(),
            hour_histogram: [0.0; 24],
            regions: HashMap::new(),
            transitions: HashMap::new(),
            last_category: None,
            last_region: None,
            last_timestamp: None,
            last_sequence_no: 0,
            last_seen: Utc::now(),
            observations: 0,
            decay,
        }
    }

    /// Fold one scored event into every dimension.
    pub fn observe(&mut self, event: &TransactionEvent) {
        let alpha = self.decay;

        self.amount.update(event.amount, alpha);

        if let Some(prev) = self.last_timestamp {
            let gap = (event.timestamp - prev).num_milliseconds() as f64 / 1000.0;
            if gap >= 0.0 {
                self.inter_arrival.update(gap, alpha);
            }
        }

        decay_and_bump(&mut self.categories, &event.category, alpha);
        decay_and_bump(&mut self.merchants, &event.merchant_id, alpha);

        let hour = event.timestamp.hour() as usize;
        for bucket in self.hour_histogram.iter_mut() {
            *bucket *= 1.0 - alpha;
        }
        self.hour_histogram[hour] += 1.0;

        if let Some(region) = &event.geo_location {
            self.regions.insert(region.clone(), event.timestamp);
            if self.regions.len() > MAX_REGIONS {
                // Drop the stalest region to keep the set bounded.
                if let Some(oldest) = self
                    .regions
                    .iter()
                    .min_by_key(|(_, seen)| **seen)
                    .map(|(r, _)| r.clone())
                {
                    self.regions.remove(&oldest);
                }
            }
            self.last_region = Some((region.clone(), event.timestamp));
        }

        if let Some(prev_cat) = self.last_category.take() {
            let row = self.transitions.entry(prev_cat).or_default();
            decay_and_bump(row, &event.category, alpha);
        }
        self.last_category = Some(event.category.clone());

        self.last_timestamp = Some(event.timestamp);
        self.last_sequence_no = event.sequence_no;
        self.last_seen = Utc::now();
        self.observations += 1;
    }

    /// Normalized familiarity of a category in [0, 1]; 1.0 means
    /// well-established in recent history.
    pub fn category_familiarity(&self, category: &str) -> f64 {
        familiarity(&self.categories, category)
    }

    /// Normalized familiarity of a merchant in [0, 1].
    pub fn merchant_familiarity(&self, merchant_id: &str) -> f64 {
        familiarity(&self.merchants, merchant_id)
    }

    /// Relative weight of an hour bucket against the histogram mode, in [0, 1].
    pub fn hour_weight(&self, hour: usize) -> f64 {
        let mode = self
            .hour_histogram
            .iter()
            .cloned()
            .fold(0.0_f64, f64::max);
        if mode <= 0.0 {
            return 1.0;
        }
        (self.hour_histogram[hour.min(23)] / mode).clamp(0.0, 1.0)
    }

    /// Probability of `next` following `prev` under the learned transition
    /// model, or `None` when the `prev` row has too little history.
    pub fn transition_probability(&self, prev: &str, next: &str) -> Option<(f64, f64)> {
        let row = self.transitions.get(prev)?;
        let total: f64 = row.values().sum();
        if total <= 0.0 {
            return None;
        }
        let count = row.get(next).copied().unwrap_or(0.0);
        Some((count / total, total))
    }
}

/// Decay every weight in the map and add one unit to `key`; prune entries
/// that have decayed to noise.
fn decay_and_bump(map: &mut HashMap<String, f64>, key: &str, alpha: f64) {
    for weight in map.values_mut() {
        *weight *= 1.0 - alpha;
    }
    map.retain(|_, w| *w >= PRUNE_EPSILON);
    *map.entry(key.to_string()).or_insert(0.0) += 1.0;
}

/// Weight of `key` relative to an "established" threshold of 3 decayed units.
fn familiarity(map: &HashMap<String, f64>, key: &str) -> f64 {
    let weight = map.get(key).copied().unwrap_or(0.0);
    (weight / 3.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event_at(seq: u64, amount: f64, category: &str, hour: u32) -> TransactionEvent {
        TransactionEvent {
            event_id: format!("evt_{}", seq),
            user_id: "user_1".to_string(),
            timestamp: Utc
                .with_ymd_and_hms(2026, 1, (seq % 27 + 1) as u32, hour, 0, 0)
                .unwrap(),
            amount,
            category: category.to_string(),
            merchant_id: "merchant_a".to_string(),
            geo_location: Some("US-CA".to_string()),
            sequence_no: seq,
        }
    }

    #[test]
    fn test_ewma_tracks_mean() {
        let mut stat = EwmaStat::default();
        for _ in 0..50 {
            stat.update(100.0, 0.2);
        }
        assert!((stat.mean - 100.0).abs() < 1e-9);
        assert!(stat.z_score(100.0) < 0.01);
        assert!(stat.z_score(10_000.0) > 4.0);
    }

    #[test]
    fn test_observe_updates_all_dimensions() {
        let mut baseline = UserBaseline::new(0.2);
        for seq in 1..=10 {
            baseline.observe(&event_at(seq, 50.0, "groceries", 12));
        }

        assert_eq!(baseline.observations, 10);
        assert_eq!(baseline.last_sequence_no, 10);
        assert!((baseline.amount.mean - 50.0).abs() < 1e-9);
        assert!(baseline.category_familiarity("groceries") > 0.9);
        assert!(baseline.category_familiarity("casino") < 1e-9);
        assert!(baseline.merchant_familiarity("merchant_a") > 0.9);
        assert_eq!(baseline.hour_weight(12), 1.0);
        assert!(baseline.hour_weight(3) < 1e-9);
        assert!(baseline.regions.contains_key("US-CA"));
    }

    #[test]
    fn test_transition_model() {
        let mut baseline = UserBaseline::new(0.1);
        // groceries -> fuel -> groceries -> fuel ...
        for seq in 1..=20 {
            let cat = if seq % 2 == 1 { "groceries" } else { "fuel" };
            baseline.observe(&event_at(seq, 30.0, cat, 10));
        }

        let (p_expected, total) = baseline
            .transition_probability("groceries", "fuel")
            .unwrap();
        assert!(p_expected > 0.9);
        assert!(total > 1.0);

        let (p_unseen, _) = baseline
            .transition_probability("groceries", "casino")
            .unwrap();
        assert!(p_unseen < 1e-9);
    }

    #[test]
    fn test_recency_decay_forgets_old_categories() {
        let mut baseline = UserBaseline::new(0.5);
        baseline.observe(&event_at(1, 10.0, "fuel", 9));
        for seq in 2..=30 {
            baseline.observe(&event_at(seq, 10.0, "groceries", 9));
        }
        // "fuel" decayed below the prune threshold long ago
        assert!(baseline.category_familiarity("fuel") < 1e-9);
    }
}
