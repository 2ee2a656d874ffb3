//! Runtime configuration, read once from the Lambda environment and passed
//! into each component at construction.

use std::env;
use std::time::Duration;

use board_atoms::{BoardError, Result};

/// Recommended redrive bound; the queue's redrive policy must match
pub const DEFAULT_MAX_RECEIVE_COUNT: u32 = 3;
pub const DEFAULT_RECIPIENT_CAP: usize = 500;
pub const DEFAULT_FANOUT_BATCH_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub table_name: String,
    pub queue_url: Option<String>,
    /// Cognito user pool id
    pub directory_id: Option<String>,
    /// SNS topic ARN notifications are published to
    pub delivery_topic: Option<String>,
    /// When set, notifications go out through SES from this address instead
    pub sender_email: Option<String>,

    pub max_receive_count: u32,
    pub announcement_recipient_cap: usize,
    pub fanout_batch_size: usize,
    pub fanout_delay: Duration,
    pub delivery_timeout: Duration,
    pub directory_timeout: Duration,
    pub job_budget: Duration,
    pub sweep_concurrency: usize,
    pub auto_archive_delay: chrono::Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            table_name: "board".to_string(),
            queue_url: None,
            directory_id: None,
            delivery_topic: None,
            sender_email: None,
            max_receive_count: DEFAULT_MAX_RECEIVE_COUNT,
            announcement_recipient_cap: DEFAULT_RECIPIENT_CAP,
            fanout_batch_size: DEFAULT_FANOUT_BATCH_SIZE,
            fanout_delay: Duration::from_millis(100),
            delivery_timeout: Duration::from_millis(5_000),
            directory_timeout: Duration::from_millis(10_000),
            job_budget: Duration::from_millis(50_000),
            sweep_concurrency: 8,
            auto_archive_delay: chrono::Duration::seconds(
                board_atoms::items::service::DEFAULT_AUTO_ARCHIVE_DELAY_SECS,
            ),
        }
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        Some(value) => value.trim().parse::<T>().map_err(|_| {
            BoardError::invalid_config(format!("{} must be a number, got {:?}", name, value))
        }),
        None => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let config = Self {
            table_name: get("TABLE_NAME").unwrap_or(defaults.table_name),
            queue_url: get("QUEUE_URL"),
            directory_id: get("DIRECTORY_ID"),
            delivery_topic: get("DELIVERY_TOPIC_ARN"),
            sender_email: get("SENDER_EMAIL"),
            max_receive_count: parse_number(
                "MAX_RECEIVE_COUNT",
                get("MAX_RECEIVE_COUNT"),
                defaults.max_receive_count,
            )?,
            announcement_recipient_cap: parse_number(
                "ANNOUNCEMENT_RECIPIENT_CAP",
                get("ANNOUNCEMENT_RECIPIENT_CAP"),
                defaults.announcement_recipient_cap,
            )?,
            fanout_batch_size: parse_number(
                "FANOUT_BATCH_SIZE",
                get("FANOUT_BATCH_SIZE"),
                defaults.fanout_batch_size,
            )?
            .max(1),
            fanout_delay: Duration::from_millis(parse_number(
                "FANOUT_DELAY_MS",
                get("FANOUT_DELAY_MS"),
                defaults.fanout_delay.as_millis() as u64,
            )?),
            delivery_timeout: Duration::from_millis(parse_number(
                "DELIVERY_TIMEOUT_MS",
                get("DELIVERY_TIMEOUT_MS"),
                defaults.delivery_timeout.as_millis() as u64,
            )?),
            directory_timeout: Duration::from_millis(parse_number(
                "DIRECTORY_TIMEOUT_MS",
                get("DIRECTORY_TIMEOUT_MS"),
                defaults.directory_timeout.as_millis() as u64,
            )?),
            job_budget: Duration::from_millis(parse_number(
                "JOB_BUDGET_MS",
                get("JOB_BUDGET_MS"),
                defaults.job_budget.as_millis() as u64,
            )?),
            sweep_concurrency: parse_number(
                "SWEEP_CONCURRENCY",
                get("SWEEP_CONCURRENCY"),
                defaults.sweep_concurrency,
            )?
            .max(1),
            auto_archive_delay: chrono::Duration::seconds(parse_number(
                "AUTO_ARCHIVE_DELAY_SECS",
                get("AUTO_ARCHIVE_DELAY_SECS"),
                defaults.auto_archive_delay.num_seconds(),
            )?),
        };

        Ok(config)
    }

    pub fn require_queue_url(&self) -> Result<&str> {
        self.queue_url
            .as_deref()
            .ok_or_else(|| BoardError::invalid_config("QUEUE_URL must be set"))
    }

    pub fn require_directory_id(&self) -> Result<&str> {
        self.directory_id
            .as_deref()
            .ok_or_else(|| BoardError::invalid_config("DIRECTORY_ID must be set"))
    }

    /// A delivery channel needs either a sender address (SES) or a topic (SNS)
    pub fn require_delivery(&self) -> Result<()> {
        if self.sender_email.is_none() && self.delivery_topic.is_none() {
            return Err(BoardError::invalid_config(
                "either SENDER_EMAIL or DELIVERY_TOPIC_ARN must be set",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.table_name, "board");
        assert_eq!(config.max_receive_count, 3);
        assert_eq!(config.announcement_recipient_cap, 500);
        assert_eq!(config.fanout_batch_size, 10);
        assert!(config.require_queue_url().is_err());
        assert!(config.require_delivery().is_err());
    }

    #[test]
    fn test_reads_recognised_fields() {
        let config = AppConfig::from_lookup(lookup(&[
            ("TABLE_NAME", "board-prod"),
            ("QUEUE_URL", "https://sqs.local/notifications"),
            ("DIRECTORY_ID", "pool-1"),
            ("DELIVERY_TOPIC_ARN", "arn:aws:sns:ap-southeast-2:1:notify"),
            ("FANOUT_DELAY_MS", "0"),
            ("SWEEP_CONCURRENCY", "0"),
        ]))
        .unwrap();

        assert_eq!(config.table_name, "board-prod");
        assert_eq!(config.require_queue_url().unwrap(), "https://sqs.local/notifications");
        assert_eq!(config.require_directory_id().unwrap(), "pool-1");
        assert!(config.require_delivery().is_ok());
        assert_eq!(config.fanout_delay, Duration::ZERO);
        assert_eq!(config.sweep_concurrency, 1);
    }

    #[test]
    fn test_blank_values_count_as_unset() {
        let config = AppConfig::from_lookup(lookup(&[("TABLE_NAME", "  "), ("QUEUE_URL", "")]))
            .unwrap();
        assert_eq!(config.table_name, "board");
        assert_eq!(config.queue_url, None);
    }

    #[test]
    fn test_rejects_non_numeric_tuning() {
        let err = AppConfig::from_lookup(lookup(&[("MAX_RECEIVE_COUNT", "three")])).unwrap_err();
        assert!(matches!(err, BoardError::InvalidConfig(_)));
    }
}
