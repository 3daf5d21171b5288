//! NATS producer for outbound risk alerts

use crate::types::Alert;
use anyhow::Result;
use async_nats::Client;
use tracing::debug;

/// Publisher for risk alerts consumed by the external API/dashboard layer.
#[derive(Clone)]
pub struct AlertProducer {
    client: Client,
    subject: String,
}

impl AlertProducer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish a risk alert
    pub async fn publish(&self, alert: &Alert) -> Result<()> {
        let payload = serde_json::to_vec(alert)?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;

        debug!(
            alert_id = %alert.alert_id,
            event_id = %alert.event_id,
            severity = %alert.severity,
            "Published risk alert"
        );

        Ok(())
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

#[cfg(test)]
mod tests {
    // Integration tests would require a running NATS server
}
