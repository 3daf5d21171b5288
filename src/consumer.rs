//! NATS consumer for the inbound transaction event feed

use anyhow::Result;
use async_nats::{Client, Subscriber};
use tracing::info;

/// Consumer for receiving transaction events from the external feed.
///
/// The feed delivers at-least-once; dedup happens inside the pipeline.
pub struct EventConsumer {
    client: Client,
    subject: String,
}

impl EventConsumer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Subscribe to the transaction feed subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self.client.subscribe(self.subject.clone()).await?;
        info!(subject = %self.subject, "Subscribed to transaction feed");
        Ok(subscriber)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}
