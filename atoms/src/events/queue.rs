use async_trait::async_trait;

use super::model::NotificationEvent;
use crate::error::Result;

/// Producer side of the notification queue
#[async_trait]
pub trait EventQueue: Send + Sync {
    async fn enqueue(&self, event: &NotificationEvent) -> Result<()>;
}

/// One delivered queue message, as the dispatcher sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    pub body: String,
    /// How many times the queue has handed this message out, including now
    pub receive_count: u32,
}

impl QueueMessage {
    pub fn new(message_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            body: body.into(),
            receive_count: 1,
        }
    }
}
