//! Outbound delivery channel for user notifications

pub mod memory;
pub mod ses;
pub mod sns;

use async_trait::async_trait;
use board_atoms::Result;

pub use memory::MemoryChannel;
pub use ses::SesEmailChannel;
pub use sns::SnsTopicChannel;

/// A rendered notification for one recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Fire-and-forget delivery; every failure is treated as retryable
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn deliver(&self, message: &OutboundMessage) -> Result<()>;
}
