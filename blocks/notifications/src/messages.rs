//! Subject and body composition for each event type

use board_atoms::events::DeletionReason;
use board_atoms::items::{Item, Priority};
use board_shared::delivery::OutboundMessage;
use chrono::{DateTime, Utc};

fn format_date(at: DateTime<Utc>) -> String {
    at.format("%d %b %Y %H:%M UTC").to_string()
}

pub fn task_completed(
    recipient: &str,
    item: &Item,
    completed_by: Option<&str>,
) -> OutboundMessage {
    let mut body = format!("\"{}\" has been marked as completed.", item.title);

    if let Some(task) = item.task() {
        let (done, total) = task.subtask_progress();
        if total > 0 {
            body.push_str(&format!("\n\nSubtasks: {}/{} completed.", done, total));
        }
    }
    if let Some(by) = completed_by {
        body.push_str(&format!("\nCompleted by: {}", by));
    }
    body.push_str("\n\nIt will be archived automatically.");

    OutboundMessage {
        recipient: recipient.to_string(),
        subject: format!("Task completed: {}", item.title),
        body,
    }
}

pub fn task_assigned(
    recipient: &str,
    item: &Item,
    assigned_by: Option<&str>,
) -> OutboundMessage {
    let mut body = format!("You have been assigned \"{}\".", item.title);

    if !item.content.is_empty() {
        body.push_str(&format!("\n\n{}", item.content));
    }
    if let Some(deadline) = item.task().and_then(|t| t.deadline) {
        body.push_str(&format!("\n\nDeadline: {}", format_date(deadline)));
    }
    if let Some(by) = assigned_by {
        body.push_str(&format!("\nAssigned by: {}", by));
    }

    OutboundMessage {
        recipient: recipient.to_string(),
        subject: format!("New assignment: {}", item.title),
        body,
    }
}

/// Built from the event alone; the item no longer exists
pub fn task_deleted(
    recipient: &str,
    title: &str,
    reason: DeletionReason,
    deadline: Option<DateTime<Utc>>,
) -> OutboundMessage {
    let mut body = format!("Your task \"{}\" was removed because {}.", title, reason.describe());

    if let Some(deadline) = deadline {
        body.push_str(&format!("\n\nIts deadline was {}.", format_date(deadline)));
    }
    if reason == DeletionReason::OverdueInactive {
        body.push_str("\nCreate it again if the work is still needed.");
    }

    OutboundMessage {
        recipient: recipient.to_string(),
        subject: format!("Task removed: {}", title),
        body,
    }
}

/// Same subject and body for every recipient of a fan-out
pub fn announcement(title: &str, content: &str, priority: Priority) -> (String, String) {
    let subject = match priority {
        Priority::Normal => format!("Announcement: {}", title),
        Priority::High | Priority::Urgent => {
            format!("[{}] {}", priority.as_str().to_uppercase(), title)
        }
    };
    (subject, content.to_string())
}
