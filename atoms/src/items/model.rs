use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Item domain model - a task or an announcement owned by a user inside an organization
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub org_id: String,
    pub item_id: String,
    pub owner_id: String,
    pub title: String,
    pub content: String,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Per-variant attributes, discriminated by `itemType`
    #[serde(flatten)]
    pub kind: ItemKind,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Created and never started
    Pending,
    Active,
    Completed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Active => "active",
            ItemStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ItemStatus::Pending),
            "active" => Some(ItemStatus::Active),
            "completed" => Some(ItemStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "itemType", rename_all = "lowercase")]
pub enum ItemKind {
    Task(TaskDetails),
    Announcement(AnnouncementDetails),
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetails {
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    pub assignee_id: Option<String>,

    /// Present once the task has been archived; archival is one-way
    pub archived: Option<Archived>,

    /// Scheduling marker consumed and removed by the reconciliation sweep
    pub auto_archive_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: String,
    pub title: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// `archivedAt` and `archiveStatus` always travel together
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Archived {
    pub at: DateTime<Utc>,
    pub status: ArchiveStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveStatus {
    /// Never finished, or finished with no subtask done
    Aborted,
    Partial,
    Completed,
    /// Operator override; never computed
    Forced,
}

impl ArchiveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveStatus::Aborted => "aborted",
            ArchiveStatus::Partial => "partial",
            ArchiveStatus::Completed => "completed",
            ArchiveStatus::Forced => "forced",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "aborted" => Some(ArchiveStatus::Aborted),
            "partial" => Some(ArchiveStatus::Partial),
            "completed" => Some(ArchiveStatus::Completed),
            "forced" => Some(ArchiveStatus::Forced),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementDetails {
    pub priority: Priority,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_pinned: bool,
    pub pinned_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "normal" => Some(Priority::Normal),
            "high" => Some(Priority::High),
            "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

impl Item {
    pub fn task(&self) -> Option<&TaskDetails> {
        match &self.kind {
            ItemKind::Task(task) => Some(task),
            ItemKind::Announcement(_) => None,
        }
    }

    pub fn task_mut(&mut self) -> Option<&mut TaskDetails> {
        match &mut self.kind {
            ItemKind::Task(task) => Some(task),
            ItemKind::Announcement(_) => None,
        }
    }

    pub fn is_announcement(&self) -> bool {
        matches!(self.kind, ItemKind::Announcement(_))
    }

    pub fn is_archived(&self) -> bool {
        self.task().map(|t| t.archived.is_some()).unwrap_or(false)
    }
}

impl TaskDetails {
    /// (completed, total) subtask counts
    pub fn subtask_progress(&self) -> (usize, usize) {
        let done = self.subtasks.iter().filter(|s| s.completed).count();
        (done, self.subtasks.len())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskPayload {
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subtasks: Vec<String>,
    pub assignee_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnnouncementPayload {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub priority: Priority,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_pinned: bool,
    pub pinned_until: Option<DateTime<Utc>>,
}
