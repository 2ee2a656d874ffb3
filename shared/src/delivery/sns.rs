use async_trait::async_trait;
use aws_sdk_sns::types::MessageAttributeValue;
use aws_sdk_sns::Client as SnsClient;
use board_atoms::{BoardError, Result};

use super::{DeliveryChannel, OutboundMessage};

/// SNS caps subjects at 100 characters
const MAX_SUBJECT_CHARS: usize = 100;

/// Publishes to a topic; subscriptions filter on the `recipient` attribute
#[derive(Debug, Clone)]
pub struct SnsTopicChannel {
    client: SnsClient,
    topic_arn: String,
}

impl SnsTopicChannel {
    pub fn new(client: SnsClient, topic_arn: impl Into<String>) -> Self {
        Self {
            client,
            topic_arn: topic_arn.into(),
        }
    }
}

fn truncate_subject(subject: &str) -> String {
    subject.chars().take(MAX_SUBJECT_CHARS).collect()
}

#[async_trait]
impl DeliveryChannel for SnsTopicChannel {
    async fn deliver(&self, message: &OutboundMessage) -> Result<()> {
        let recipient = MessageAttributeValue::builder()
            .data_type("String")
            .string_value(&message.recipient)
            .build()
            .map_err(|e| BoardError::delivery(format!("bad recipient attribute: {}", e)))?;

        self.client
            .publish()
            .topic_arn(&self.topic_arn)
            .subject(truncate_subject(&message.subject))
            .message(&message.body)
            .message_attributes("recipient", recipient)
            .send()
            .await
            .map_err(|e| BoardError::delivery(format!("SNS publish failed: {}", e)))?;

        Ok(())
    }
}
