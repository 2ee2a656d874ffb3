use async_trait::async_trait;
use aws_sdk_sqs::Client as SqsClient;
use board_atoms::events::{EventQueue, NotificationEvent};
use board_atoms::{BoardError, Result};

/// SQS-backed notification queue (producer side)
#[derive(Debug, Clone)]
pub struct SqsEventQueue {
    client: SqsClient,
    queue_url: String,
}

impl SqsEventQueue {
    pub fn new(client: SqsClient, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }
}

#[async_trait]
impl EventQueue for SqsEventQueue {
    async fn enqueue(&self, event: &NotificationEvent) -> Result<()> {
        let body = event.to_json()?;

        let output = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| BoardError::queue(format!("SQS send_message failed: {}", e)))?;

        tracing::debug!(
            event_type = event.kind.type_name(),
            message_id = output.message_id().unwrap_or_default(),
            "Notification enqueued"
        );
        Ok(())
    }
}
