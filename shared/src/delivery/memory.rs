//! Recording delivery channel for testing

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use board_atoms::{BoardError, Result};
use parking_lot::Mutex;

use super::{DeliveryChannel, OutboundMessage};

#[derive(Default)]
struct ChannelState {
    delivered: Vec<OutboundMessage>,
    attempts: usize,
    failing_recipients: HashSet<String>,
    fail_all: bool,
}

#[derive(Clone, Default)]
pub struct MemoryChannel {
    state: Arc<Mutex<ChannelState>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, recipient: &str) {
        self.state.lock().failing_recipients.insert(recipient.to_string());
    }

    pub fn fail_all(&self, fail: bool) {
        self.state.lock().fail_all = fail;
    }

    pub fn delivered(&self) -> Vec<OutboundMessage> {
        self.state.lock().delivered.clone()
    }

    /// Delivery attempts, successful or not
    pub fn attempts(&self) -> usize {
        self.state.lock().attempts
    }
}

#[async_trait]
impl DeliveryChannel for MemoryChannel {
    async fn deliver(&self, message: &OutboundMessage) -> Result<()> {
        let mut state = self.state.lock();
        state.attempts += 1;
        if state.fail_all || state.failing_recipients.contains(&message.recipient) {
            return Err(BoardError::delivery(format!(
                "simulated bounce for {}",
                message.recipient
            )));
        }
        state.delivered.push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(recipient: &str) -> OutboundMessage {
        OutboundMessage {
            recipient: recipient.to_string(),
            subject: "Hello".to_string(),
            body: "Body".to_string(),
        }
    }

    #[tokio::test]
    async fn test_failures_count_as_attempts_only() {
        let channel = MemoryChannel::new();
        channel.fail_for("bounce@example.com");

        channel.deliver(&message("ok@example.com")).await.unwrap();
        let err = channel.deliver(&message("bounce@example.com")).await.unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(channel.attempts(), 2);
        assert_eq!(channel.delivered(), vec![message("ok@example.com")]);
    }
}
