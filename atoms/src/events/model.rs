use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::items::model::Priority;

/// Queue-resident notification event. Never persisted.
///
/// Wire shape: `{"type": "TASK_DELETED", "userId": .., "itemId": .., "orgId": ..,
/// "title": .., <type-specific fields>, "enqueuedAt": ..}`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    #[serde(flatten)]
    pub kind: EventKind,
    pub user_id: String,
    pub item_id: Option<String>,
    pub org_id: Option<String>,
    pub title: String,
    /// Stamped by this crate's producers; bodies from other producers may omit it
    #[serde(default = "Utc::now")]
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    #[serde(rename_all = "camelCase")]
    TaskCompleted {
        #[serde(default)]
        completed_by: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    TaskAssigned {
        #[serde(default)]
        assigned_by: Option<String>,
    },
    /// The item is gone by the time this is handled; everything the message
    /// needs travels in the payload
    #[serde(rename_all = "camelCase")]
    TaskDeleted {
        reason: DeletionReason,
        #[serde(default)]
        deadline: Option<DateTime<Utc>>,
    },
    #[serde(rename_all = "camelCase")]
    Announcement {
        #[serde(default)]
        content: String,
        #[serde(default)]
        priority: Priority,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeletionReason {
    OverdueInactive,
    DeletedByUser,
}

impl DeletionReason {
    pub fn describe(&self) -> &'static str {
        match self {
            DeletionReason::OverdueInactive => {
                "its deadline passed before any work on it was started"
            }
            DeletionReason::DeletedByUser => "it was deleted by a member of your organization",
        }
    }
}

impl EventKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            EventKind::TaskCompleted { .. } => "TASK_COMPLETED",
            EventKind::TaskAssigned { .. } => "TASK_ASSIGNED",
            EventKind::TaskDeleted { .. } => "TASK_DELETED",
            EventKind::Announcement { .. } => "ANNOUNCEMENT",
        }
    }
}

impl NotificationEvent {
    pub fn new(kind: EventKind, user_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            kind,
            user_id: user_id.into(),
            item_id: None,
            org_id: None,
            title: title.into(),
            enqueued_at: Utc::now(),
        }
    }

    pub fn for_item(mut self, org_id: impl Into<String>, item_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self.item_id = Some(item_id.into());
        self
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(body: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deleted_event_wire_shape() {
        let event = NotificationEvent::new(
            EventKind::TaskDeleted {
                reason: DeletionReason::OverdueInactive,
                deadline: None,
            },
            "u1",
            "Old task",
        )
        .for_item("acme", "t1");

        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "TASK_DELETED");
        assert_eq!(value["reason"], "overdue_inactive");
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["itemId"], "t1");
        assert_eq!(value["orgId"], "acme");
        assert!(value["enqueuedAt"].is_string());
    }

    #[test]
    fn test_parses_minimal_completed_event() {
        let body = r#"{"type":"TASK_COMPLETED","userId":"u1","itemId":"t1","orgId":"acme",
                       "title":"Ship","enqueuedAt":"2025-03-01T00:00:00.000Z"}"#;
        let event = NotificationEvent::from_json(body).unwrap();
        assert_eq!(event.kind, EventKind::TaskCompleted { completed_by: None });
        assert_eq!(event.item_id.as_deref(), Some("t1"));
    }

    #[test]
    fn test_missing_enqueued_at_is_accepted() {
        let before = Utc::now();
        let body = r#"{"type":"TASK_DELETED","userId":"u1","itemId":"t1","orgId":"acme",
                       "title":"Old","reason":"overdue_inactive"}"#;
        let event = NotificationEvent::from_json(body).unwrap();
        assert_eq!(event.user_id, "u1");
        assert!(event.enqueued_at >= before);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let body = r#"{"type":"TASK_EXPLODED","userId":"u1","title":"x",
                       "enqueuedAt":"2025-03-01T00:00:00.000Z"}"#;
        assert!(NotificationEvent::from_json(body).is_err());
    }

    #[test]
    fn test_missing_recipient_is_rejected() {
        let body = r#"{"type":"ANNOUNCEMENT","title":"x","enqueuedAt":"2025-03-01T00:00:00.000Z"}"#;
        assert!(NotificationEvent::from_json(body).is_err());
        assert!(NotificationEvent::from_json("not json").is_err());
    }
}
