//! NATS notifier.
//!
//! Publishes schedule events on `{prefix}.{kind}` for the supervisory roles
//! to pick up. Delivery is fire-and-forget.

use anyhow::{Context, Result};
use async_nats::Client;
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::ports::Notifier;
use crate::types::ScheduleEvent;

#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub subject_prefix: String,
    /// Roles the events are addressed to
    pub roles: Vec<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            subject_prefix: "leker.events".to_string(),
            roles: vec!["supervisor".to_string(), "admin".to_string()],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a> {
    recipient_roles: &'a [String],
    event: &'a ScheduleEvent,
}

impl NotificationConfig {
    pub fn subject_for(&self, event: &ScheduleEvent) -> String {
        format!("{}.{}", self.subject_prefix, event.kind.as_str())
    }

    pub fn payload_for(&self, event: &ScheduleEvent) -> Result<Vec<u8>> {
        let envelope = Envelope {
            recipient_roles: &self.roles,
            event,
        };
        serde_json::to_vec(&envelope).context("Failed to encode schedule event")
    }
}

pub struct NatsNotifier {
    client: Client,
    config: NotificationConfig,
}

impl NatsNotifier {
    pub fn new(client: Client, config: NotificationConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Notifier for NatsNotifier {
    async fn notify(&self, event: &ScheduleEvent) -> Result<()> {
        let subject = self.config.subject_for(event);
        let payload = self.config.payload_for(event)?;

        self.client
            .publish(subject.clone(), payload.into())
            .await
            .with_context(|| format!("Failed to publish to {}", subject))?;

        debug!("Published {} for entry {}", subject, event.entry_id);
        Ok(())
    }
}
