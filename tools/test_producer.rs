//! Test Transaction Producer
//!
//! Generates and publishes synthetic transaction events to NATS for pipeline
//! testing. Mostly routine traffic per user, with an occasional anomalous
//! event that should trip the detectors.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

/// Event structure matching the pipeline's expected format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TransactionEvent {
    event_id: String,
    user_id: String,
    timestamp: chrono::DateTime<Utc>,
    amount: f64,
    category: String,
    merchant_id: String,
    geo_location: Option<String>,
    sequence_no: u64,
}

const CATEGORIES: [&str; 5] = ["groceries", "dining", "fuel", "utilities", "shopping"];
const MERCHANTS: [&str; 5] = [
    "merchant_grocer",
    "merchant_diner",
    "merchant_fuel",
    "merchant_power",
    "merchant_mart",
];
const REGIONS: [&str; 3] = ["US-CA", "US-NV", "US-OR"];

/// Per-user sequence counters plus a shared RNG
struct EventGenerator {
    rng: rand::rngs::ThreadRng,
    sequences: HashMap<String, u64>,
    counter: u64,
}

impl EventGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            sequences: HashMap::new(),
            counter: 0,
        }
    }

    fn next_sequence(&mut self, user_id: &str) -> u64 {
        let seq = self.sequences.entry(user_id.to_string()).or_insert(0);
        *seq += 1;
        *seq
    }

    /// Routine transaction near the user's habitual profile
    fn generate_routine(&mut self, user_id: &str) -> TransactionEvent {
        self.counter += 1;
        let sequence_no = self.next_sequence(user_id);
        let pick = self.rng.gen_range(0..CATEGORIES.len());

        TransactionEvent {
            event_id: format!("evt_{:012}", self.counter),
            user_id: user_id.to_string(),
            timestamp: Utc::now(),
            amount: self.rng.gen_range(10.0..120.0),
            category: CATEGORIES[pick].to_string(),
            merchant_id: MERCHANTS[pick].to_string(),
            geo_location: Some(REGIONS[self.rng.gen_range(0..REGIONS.len())].to_string()),
            sequence_no,
        }
    }

    /// Anomalous transaction: huge amount, unseen merchant, foreign region
    fn generate_anomalous(&mut self, user_id: &str) -> TransactionEvent {
        let mut event = self.generate_routine(user_id);
        event.amount = self.rng.gen_range(20_000.0..80_000.0);
        event.category = "wire".to_string();
        event.merchant_id = format!("crypto_exchange_{}", self.rng.gen_range(1..100));
        event.geo_location = Some("RU-MOW".to_string());
        event
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let nats_url =
        std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string());
    let subject =
        std::env::var("TRANSACTION_SUBJECT").unwrap_or_else(|_| "transactions".to_string());
    let rate_ms: u64 = std::env::var("RATE_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(100);

    let client = async_nats::connect(&nats_url).await?;
    info!(url = %nats_url, subject = %subject, "Connected, producing test events");

    let users: Vec<String> = (1..=10).map(|i| format!("user_{i:03}")).collect();
    let mut generator = EventGenerator::new();
    let mut published = 0u64;

    loop {
        let user = users[generator.rng.gen_range(0..users.len())].clone();

        // Roughly one anomaly per fifty events
        let event = if generator.rng.gen_range(0..50) == 0 {
            generator.generate_anomalous(&user)
        } else {
            generator.generate_routine(&user)
        };

        let payload = serde_json::to_vec(&event)?;
        client.publish(subject.clone(), payload.into()).await?;
        published += 1;

        if published % 100 == 0 {
            info!(published, "Publishing milestone");
        }

        tokio::time::sleep(Duration::from_millis(rate_ms)).await;
    }
}
