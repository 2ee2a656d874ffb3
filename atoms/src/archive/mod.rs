//! Archive status calculation and the sweep selection predicates.
//!
//! The predicates mirror the filter expressions the DynamoDB store sends. Those
//! filters compare timestamps as strings, so they are only exact for rows written
//! in the canonical millisecond `Z` form. Re-applying the predicates to decoded
//! candidates can drop rows a filter wrongly let through; it cannot recover rows
//! a filter wrongly excluded.

use chrono::{DateTime, Utc};

use crate::items::model::{ArchiveStatus, Item, ItemStatus};

/// Terminal label for a task being archived.
///
/// Never returns `Forced`; that value is only written by an explicit operator
/// override. Announcements carry no subtasks and follow the same rules.
pub fn calculate_archive_status(item: &Item) -> ArchiveStatus {
    if item.status != ItemStatus::Completed {
        return ArchiveStatus::Aborted;
    }

    let (done, total) = match item.task() {
        Some(task) => task.subtask_progress(),
        None => (0, 0),
    };

    if total == 0 {
        ArchiveStatus::Completed
    } else if done == 0 {
        ArchiveStatus::Aborted
    } else if done == total {
        ArchiveStatus::Completed
    } else {
        ArchiveStatus::Partial
    }
}

/// Auto-archive candidate: scheduled marker reached and not archived yet.
/// Status is deliberately not consulted; the marker is the gate.
pub fn is_archive_due(item: &Item, now: DateTime<Utc>) -> bool {
    match item.task() {
        Some(task) => {
            task.archived.is_none()
                && task.auto_archive_at.map(|at| at <= now).unwrap_or(false)
        }
        None => false,
    }
}

/// Overdue cleanup candidate: never started, deadline strictly in the past,
/// never archived.
pub fn is_overdue_unstarted(item: &Item, now: DateTime<Utc>) -> bool {
    match item.task() {
        Some(task) => {
            item.status == ItemStatus::Pending
                && task.archived.is_none()
                && task.deadline.map(|d| d < now).unwrap_or(false)
        }
        None => false,
    }
}
