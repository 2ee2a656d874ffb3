use async_trait::async_trait;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use aws_sdk_sesv2::Client as SesClient;
use board_atoms::{BoardError, Result};

use super::{DeliveryChannel, OutboundMessage};

/// Sends each notification as a plain-text email
#[derive(Debug, Clone)]
pub struct SesEmailChannel {
    client: SesClient,
    from_address: String,
}

impl SesEmailChannel {
    pub fn new(client: SesClient, from_address: impl Into<String>) -> Self {
        Self {
            client,
            from_address: from_address.into(),
        }
    }
}

fn utf8_content(data: &str) -> Result<Content> {
    Content::builder()
        .data(data)
        .charset("UTF-8")
        .build()
        .map_err(|e| BoardError::delivery(format!("failed to build email content: {}", e)))
}

#[async_trait]
impl DeliveryChannel for SesEmailChannel {
    async fn deliver(&self, message: &OutboundMessage) -> Result<()> {
        let email = Message::builder()
            .subject(utf8_content(&message.subject)?)
            .body(Body::builder().text(utf8_content(&message.body)?).build())
            .build();

        self.client
            .send_email()
            .from_email_address(&self.from_address)
            .destination(
                Destination::builder()
                    .to_addresses(&message.recipient)
                    .build(),
            )
            .content(EmailContent::builder().simple(email).build())
            .send()
            .await
            .map_err(|e| BoardError::delivery(format!("SES send_email failed: {}", e)))?;

        tracing::debug!(recipient = %message.recipient, "Notification email sent");
        Ok(())
    }
}
