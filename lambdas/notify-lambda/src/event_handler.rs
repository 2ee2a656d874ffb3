use std::sync::Arc;

use aws_lambda_events::event::sqs::{SqsEvent, SqsMessage};
use board_atoms::events::QueueMessage;
use lambda_runtime::{tracing, Error, LambdaEvent};
use notifications_block::{BatchReport, NotificationDispatcher};

const RECEIVE_COUNT_ATTRIBUTE: &str = "ApproximateReceiveCount";

fn to_queue_message(record: SqsMessage) -> Option<QueueMessage> {
    let Some(message_id) = record.message_id else {
        tracing::warn!("SQS record without a message id, skipping");
        return None;
    };
    let receive_count = record
        .attributes
        .get(RECEIVE_COUNT_ATTRIBUTE)
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(1);

    Some(QueueMessage {
        message_id,
        body: record.body.unwrap_or_default(),
        receive_count,
    })
}

/// SQS event source with ReportBatchItemFailures: only the ids in
/// `batchItemFailures` become visible again
pub(crate) async fn function_handler(
    event: LambdaEvent<SqsEvent>,
    dispatcher: Arc<NotificationDispatcher>,
) -> Result<BatchReport, Error> {
    let messages: Vec<QueueMessage> = event
        .payload
        .records
        .into_iter()
        .filter_map(to_queue_message)
        .collect();

    tracing::info!(
        request_id = %event.context.request_id,
        messages = messages.len(),
        "Notify lambda invoked"
    );

    Ok(dispatcher.process_batch(&messages).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(json: serde_json::Value) -> SqsMessage {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_record_carries_receive_count() {
        let message = to_queue_message(record(serde_json::json!({
            "messageId": "m-1",
            "receiptHandle": "rh",
            "body": "{\"type\":\"TASK_DELETED\"}",
            "attributes": { "ApproximateReceiveCount": "2" },
            "messageAttributes": {},
            "eventSource": "aws:sqs",
            "eventSourceARN": "arn:aws:sqs:ap-southeast-2:1:notifications",
            "awsRegion": "ap-southeast-2"
        })))
        .unwrap();

        assert_eq!(message.message_id, "m-1");
        assert_eq!(message.receive_count, 2);
        assert!(message.body.contains("TASK_DELETED"));
    }

    #[test]
    fn test_missing_count_defaults_to_first_delivery() {
        let message = to_queue_message(record(serde_json::json!({
            "messageId": "m-2",
            "attributes": {},
            "messageAttributes": {}
        })))
        .unwrap();

        assert_eq!(message.receive_count, 1);
        assert_eq!(message.body, "");
    }
}
