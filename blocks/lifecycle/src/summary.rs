use board_atoms::{BoardError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of one reconciliation run
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SweepSummary {
    pub archived_count: usize,
    pub deleted_count: usize,
    pub error_count: usize,
    pub timestamp: DateTime<Utc>,
    /// False when the run stopped early on its time budget
    pub complete: bool,
}

impl SweepSummary {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            archived_count: 0,
            deleted_count: 0,
            error_count: 0,
            timestamp,
            complete: true,
        }
    }
}

/// HTTP-style envelope handed back to the scheduler
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub status_code: u16,
    pub body: String,
}

impl JobResponse {
    pub fn ok(summary: &SweepSummary) -> Result<Self> {
        Ok(Self {
            status_code: 200,
            body: serde_json::to_string(summary)?,
        })
    }

    pub fn failure(error: &BoardError) -> Self {
        Self {
            status_code: 500,
            body: serde_json::json!({ "error": error.to_string() }).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_body_uses_camel_case_counts() {
        let mut summary = SweepSummary::new(Utc::now());
        summary.archived_count = 2;
        summary.error_count = 1;

        let response = JobResponse::ok(&summary).unwrap();
        assert_eq!(response.status_code, 200);

        let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["archivedCount"], 2);
        assert_eq!(body["deletedCount"], 0);
        assert_eq!(body["errorCount"], 1);
        assert_eq!(body["complete"], true);
        assert!(body["timestamp"].is_string());
    }

    #[test]
    fn test_failure_is_500() {
        let response = JobResponse::failure(&BoardError::dynamo("scan throttled"));
        assert_eq!(response.status_code, 500);
        assert!(response.body.contains("scan throttled"));
    }
}
