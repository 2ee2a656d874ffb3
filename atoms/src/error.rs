//! Error type shared by every board crate.

use thiserror::Error;

/// Errors raised by the item store, the queue, the directory and the delivery channel.
#[derive(Error, Debug)]
pub enum BoardError {
    /// DynamoDB SDK error
    #[error("DynamoDB error: {0}")]
    Dynamo(String),

    /// Notification queue error
    #[error("Queue error: {0}")]
    Queue(String),

    /// User directory lookup error
    #[error("Directory error: {0}")]
    Directory(String),

    /// Delivery channel error
    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A conditional write lost against a concurrent writer, or the item is read-only
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stored record could not be decoded into an item
    #[error("Invalid item record: {0}")]
    InvalidRecord(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BoardError {
    pub fn dynamo(msg: impl Into<String>) -> Self {
        Self::Dynamo(msg.into())
    }

    pub fn queue(msg: impl Into<String>) -> Self {
        Self::Queue(msg.into())
    }

    pub fn directory(msg: impl Into<String>) -> Self {
        Self::Directory(msg.into())
    }

    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::Delivery(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether retrying the same operation later may succeed.
    ///
    /// Infrastructure failures are transient; malformed input and policy
    /// decisions will fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Dynamo(_)
                | Self::Queue(_)
                | Self::Directory(_)
                | Self::Delivery(_)
                | Self::Conflict(_)
                | Self::Timeout(_)
        )
    }
}

/// Result type for board operations
pub type Result<T> = std::result::Result<T, BoardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(BoardError::dynamo("throttled").is_retryable());
        assert!(BoardError::delivery("smtp down").is_retryable());
        assert!(BoardError::Timeout("directory".into()).is_retryable());
        assert!(!BoardError::invalid_record("no SK").is_retryable());
        assert!(!BoardError::forbidden("member").is_retryable());

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!BoardError::from(json_err).is_retryable());
    }
}
