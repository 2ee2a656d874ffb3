use std::sync::Arc;

use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_sesv2::Client as SesClient;
use aws_sdk_sns::Client as SnsClient;
use aws_sdk_sqs::Client as SqsClient;
use board_atoms::events::EventQueue;
use board_atoms::items::{DynamoItemStore, ItemStore};
use board_atoms::users::{CognitoDirectory, Directory};
use board_atoms::{BoardError, Result};

use crate::config::AppConfig;
use crate::delivery::{DeliveryChannel, SesEmailChannel, SnsTopicChannel};
use crate::queue::SqsEventQueue;

/// AWS clients shared across invocations of one Lambda container
pub struct AppState {
    pub config: AppConfig,
    pub dynamo_client: DynamoClient,
    pub sqs_client: SqsClient,
    pub cognito_client: CognitoClient,
    pub sns_client: SnsClient,
    pub ses_client: SesClient,
}

impl AppState {
    pub async fn from_env() -> Result<Self> {
        let config = AppConfig::from_env()?;
        let sdk_config = aws_config::load_from_env().await;

        tracing::info!(table_name = %config.table_name, "Loaded board configuration");

        Ok(Self {
            config,
            dynamo_client: DynamoClient::new(&sdk_config),
            sqs_client: SqsClient::new(&sdk_config),
            cognito_client: CognitoClient::new(&sdk_config),
            sns_client: SnsClient::new(&sdk_config),
            ses_client: SesClient::new(&sdk_config),
        })
    }

    pub fn item_store(&self) -> Arc<dyn ItemStore> {
        Arc::new(DynamoItemStore::new(
            self.dynamo_client.clone(),
            self.config.table_name.clone(),
        ))
    }

    pub fn event_queue(&self) -> Result<Arc<dyn EventQueue>> {
        Ok(Arc::new(SqsEventQueue::new(
            self.sqs_client.clone(),
            self.config.require_queue_url()?,
        )))
    }

    pub fn directory(&self) -> Result<Arc<dyn Directory>> {
        Ok(Arc::new(CognitoDirectory::new(
            self.cognito_client.clone(),
            self.config.require_directory_id()?,
        )))
    }

    /// SES when a sender address is configured, otherwise the SNS topic
    pub fn delivery_channel(&self) -> Result<Arc<dyn DeliveryChannel>> {
        if let Some(sender) = &self.config.sender_email {
            return Ok(Arc::new(SesEmailChannel::new(
                self.ses_client.clone(),
                sender.clone(),
            )));
        }
        match &self.config.delivery_topic {
            Some(topic) => Ok(Arc::new(SnsTopicChannel::new(
                self.sns_client.clone(),
                topic.clone(),
            ))),
            None => Err(BoardError::invalid_config(
                "either SENDER_EMAIL or DELIVERY_TOPIC_ARN must be set",
            )),
        }
    }
}
