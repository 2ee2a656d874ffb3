use std::sync::Arc;
use std::time::Duration;

use board_atoms::events::{EventKind, NotificationEvent, QueueMessage};
use board_atoms::items::{Item, ItemStore, Priority};
use board_atoms::users::Directory;
use board_atoms::{BoardError, Result};
use board_shared::delivery::{DeliveryChannel, OutboundMessage};
use board_shared::AppConfig;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::fanout::{self, FanoutReport};
use crate::messages;

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSettings {
    /// Must match the queue's redrive policy; only used for logging here
    pub max_receive_count: u32,
    pub recipient_cap: usize,
    pub fanout_batch_size: usize,
    pub fanout_delay: Duration,
    pub delivery_timeout: Duration,
    pub directory_timeout: Duration,
}

impl DispatchSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_receive_count: config.max_receive_count,
            recipient_cap: config.announcement_recipient_cap,
            fanout_batch_size: config.fanout_batch_size,
            fanout_delay: config.fanout_delay,
            delivery_timeout: config.delivery_timeout,
            directory_timeout: config.directory_timeout,
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// What happened to one queue message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Delivered,
    /// Permanent failure (malformed body, unknown type, item gone); acknowledged
    /// so it never comes back
    Dropped,
    /// Left for the queue to redeliver, up to its max receive count
    Retry,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::Retry)
    }
}

/// Partial batch response: only the listed messages are redelivered
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub processed: usize,
    pub successful: usize,
    pub batch_item_failures: Vec<BatchItemFailure>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    pub item_identifier: String,
}

impl BatchReport {
    pub fn failed_ids(&self) -> Vec<String> {
        self.batch_item_failures
            .iter()
            .map(|f| f.item_identifier.clone())
            .collect()
    }
}

pub struct NotificationDispatcher {
    items: Arc<dyn ItemStore>,
    directory: Arc<dyn Directory>,
    channel: Arc<dyn DeliveryChannel>,
    settings: DispatchSettings,
}

impl NotificationDispatcher {
    pub fn new(
        items: Arc<dyn ItemStore>,
        directory: Arc<dyn Directory>,
        channel: Arc<dyn DeliveryChannel>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            items,
            directory,
            channel,
            settings,
        }
    }

    /// Handle every message of a batch concurrently and report the ones the
    /// queue should hand out again.
    pub async fn process_batch(&self, messages: &[QueueMessage]) -> BatchReport {
        let outcomes = join_all(messages.iter().map(|message| async move {
            (message, self.handle_message(message).await)
        }))
        .await;

        let mut report = BatchReport {
            processed: messages.len(),
            ..BatchReport::default()
        };
        for (message, outcome) in outcomes {
            if outcome.is_success() {
                report.successful += 1;
            } else {
                report.batch_item_failures.push(BatchItemFailure {
                    item_identifier: message.message_id.clone(),
                });
            }
        }

        tracing::info!(
            processed = report.processed,
            successful = report.successful,
            failed = report.batch_item_failures.len(),
            "Notification batch processed"
        );
        report
    }

    pub async fn handle_message(&self, message: &QueueMessage) -> Outcome {
        let event = match NotificationEvent::from_json(&message.body) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(
                    message_id = %message.message_id,
                    error = %e,
                    "Dropping unparseable notification"
                );
                return Outcome::Dropped;
            }
        };
        let event_type = event.kind.type_name();

        let retry = |reason: String| {
            if message.receive_count >= self.settings.max_receive_count {
                tracing::error!(
                    message_id = %message.message_id,
                    event_type,
                    receive_count = message.receive_count,
                    reason = %reason,
                    "Notification failed on final attempt, moving to dead-letter queue"
                );
            } else {
                tracing::warn!(
                    message_id = %message.message_id,
                    event_type,
                    receive_count = message.receive_count,
                    reason = %reason,
                    "Notification failed, will retry"
                );
            }
            Outcome::Retry
        };

        match self.handle_event(&event).await {
            Ok(true) => {
                tracing::info!(message_id = %message.message_id, event_type, user_id = %event.user_id, "Notification delivered");
                Outcome::Delivered
            }
            Ok(false) => retry("recipient could not be resolved".to_string()),
            Err(e) if e.is_retryable() => retry(e.to_string()),
            Err(e) => {
                tracing::warn!(
                    message_id = %message.message_id,
                    event_type,
                    error = %e,
                    "Dropping notification that cannot succeed"
                );
                Outcome::Dropped
            }
        }
    }

    /// `Ok(false)` means "try again later"; errors are classified by
    /// [`BoardError::is_retryable`].
    async fn handle_event(&self, event: &NotificationEvent) -> Result<bool> {
        match &event.kind {
            EventKind::TaskCompleted { completed_by } => {
                let Some(email) = self.resolve(&event.user_id).await? else {
                    return Ok(false);
                };
                let item = self.load_item(event).await?;
                let message = messages::task_completed(&email, &item, completed_by.as_deref());
                self.deliver(&message).await?;
                Ok(true)
            }
            EventKind::TaskAssigned { assigned_by } => {
                let Some(email) = self.resolve(&event.user_id).await? else {
                    return Ok(false);
                };
                let item = self.load_item(event).await?;
                let message = messages::task_assigned(&email, &item, assigned_by.as_deref());
                self.deliver(&message).await?;
                Ok(true)
            }
            EventKind::TaskDeleted { reason, deadline } => {
                let Some(email) = self.resolve(&event.user_id).await? else {
                    return Ok(false);
                };
                let message = messages::task_deleted(&email, &event.title, *reason, *deadline);
                self.deliver(&message).await?;
                Ok(true)
            }
            EventKind::Announcement { content, priority } => {
                let Some(org_id) = event.org_id.as_deref() else {
                    return Err(BoardError::invalid_request(
                        "ANNOUNCEMENT event without an organization",
                    ));
                };
                let report = self
                    .announce(org_id, &event.title, content, *priority)
                    .await?;
                // Partial success is not retried; resending would duplicate
                // the message for everyone who already has it
                Ok(report.recipients == 0 || report.delivered > 0)
            }
        }
    }

    /// Fan an announcement out to the organization's directory members
    pub async fn announce(
        &self,
        org_id: &str,
        title: &str,
        content: &str,
        priority: Priority,
    ) -> Result<FanoutReport> {
        let recipients = fanout::collect_recipients(
            self.directory.as_ref(),
            org_id,
            self.settings.recipient_cap,
            self.settings.directory_timeout,
        )
        .await?;

        let (subject, body) = messages::announcement(title, content, priority);
        let mut report = fanout::fan_out(
            self.channel.as_ref(),
            &recipients.addresses,
            &subject,
            &body,
            self.settings.fanout_batch_size,
            self.settings.fanout_delay,
            self.settings.delivery_timeout,
        )
        .await;
        report.unresolved = recipients.unresolved;

        tracing::info!(
            org_id,
            recipients = report.recipients,
            delivered = report.delivered,
            failed = report.failed,
            unresolved = report.unresolved,
            batches = report.batches,
            "Announcement fanned out"
        );
        Ok(report)
    }

    async fn resolve(&self, user_id: &str) -> Result<Option<String>> {
        let email = tokio::time::timeout(
            self.settings.directory_timeout,
            self.directory.email_for(user_id),
        )
        .await
        .map_err(|_| BoardError::timeout(format!("email lookup for {}", user_id)))??;

        if email.is_none() {
            tracing::warn!(user_id, "No email on record for recipient");
        }
        Ok(email)
    }

    async fn load_item(&self, event: &NotificationEvent) -> Result<Item> {
        let (Some(org_id), Some(item_id)) = (&event.org_id, &event.item_id) else {
            return Err(BoardError::invalid_request(format!(
                "{} event without an item reference",
                event.kind.type_name()
            )));
        };
        self.items
            .get(org_id, item_id)
            .await?
            .ok_or_else(|| BoardError::not_found(format!("item {} in {}", item_id, org_id)))
    }

    async fn deliver(&self, message: &OutboundMessage) -> Result<()> {
        fanout::deliver_within(
            self.channel.as_ref(),
            message,
            self.settings.delivery_timeout,
        )
        .await
    }
}
