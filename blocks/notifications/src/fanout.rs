//! Announcement fan-out: list the organization's directory members up to a
//! safety cap, then deliver the same message to every resolved address in
//! small batches.

use std::collections::HashSet;
use std::time::Duration;

use board_atoms::users::Directory;
use board_atoms::{BoardError, Result};
use board_shared::delivery::{DeliveryChannel, OutboundMessage};
use futures::future::join_all;

/// Outcome of delivering one announcement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanoutReport {
    /// Distinct addresses a delivery was attempted for
    pub recipients: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Directory users skipped for having no address
    pub unresolved: usize,
    pub batches: usize,
}

#[derive(Debug, Default)]
pub struct Recipients {
    pub addresses: Vec<String>,
    pub unresolved: usize,
}

/// Page through the members of `org_id` until exhausted or `cap` users have
/// been fetched. The whole listing shares one time budget.
pub async fn collect_recipients(
    directory: &dyn Directory,
    org_id: &str,
    cap: usize,
    budget: Duration,
) -> Result<Recipients> {
    tokio::time::timeout(budget, list_capped(directory, org_id, cap))
        .await
        .map_err(|_| {
            BoardError::timeout(format!(
                "directory listing exceeded {}ms",
                budget.as_millis()
            ))
        })?
}

async fn list_capped(directory: &dyn Directory, org_id: &str, cap: usize) -> Result<Recipients> {
    let mut recipients = Recipients::default();
    let mut seen = HashSet::new();
    let mut fetched = 0usize;
    let mut next_token: Option<String> = None;

    loop {
        let page = directory.list_users(org_id, next_token.take()).await?;

        for user in page.users {
            if fetched >= cap {
                break;
            }
            fetched += 1;
            match user.email {
                Some(email) if !email.trim().is_empty() => {
                    if seen.insert(email.clone()) {
                        recipients.addresses.push(email);
                    }
                }
                _ => {
                    tracing::debug!(user_id = %user.user_id, "Directory user has no email");
                    recipients.unresolved += 1;
                }
            }
        }

        match page.next_token {
            Some(token) if fetched < cap => next_token = Some(token),
            Some(_) => {
                tracing::warn!(org_id, cap, "Recipient cap reached, remaining users not notified");
                break;
            }
            None => break,
        }
    }

    Ok(recipients)
}

/// Deliver one message per address, `batch_size` at a time with `delay`
/// between batches. Deliveries within a batch run concurrently so a slow
/// recipient does not hold up the others.
pub async fn fan_out(
    channel: &dyn DeliveryChannel,
    addresses: &[String],
    subject: &str,
    body: &str,
    batch_size: usize,
    delay: Duration,
    delivery_timeout: Duration,
) -> FanoutReport {
    let mut report = FanoutReport {
        recipients: addresses.len(),
        ..FanoutReport::default()
    };

    for (index, batch) in addresses.chunks(batch_size.max(1)).enumerate() {
        if index > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let results = join_all(batch.iter().map(|recipient| {
            let message = OutboundMessage {
                recipient: recipient.clone(),
                subject: subject.to_string(),
                body: body.to_string(),
            };
            async move {
                let result = deliver_within(channel, &message, delivery_timeout).await;
                (message.recipient, result)
            }
        }))
        .await;

        for (recipient, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(recipient = %recipient, error = %e, "Announcement delivery failed");
                    report.failed += 1;
                }
            }
        }
        report.batches += 1;
    }

    report
}

/// One delivery under a time budget; running out of time is retryable
pub async fn deliver_within(
    channel: &dyn DeliveryChannel,
    message: &OutboundMessage,
    budget: Duration,
) -> Result<()> {
    tokio::time::timeout(budget, channel.deliver(message))
        .await
        .map_err(|_| {
            BoardError::timeout(format!(
                "delivery to {} exceeded {}ms",
                message.recipient,
                budget.as_millis()
            ))
        })?
}
