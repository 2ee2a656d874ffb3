//! Interactive item operations (pure domain logic, no HTTP).
//!
//! Every call is authorized against the caller's claims and scoped to the
//! caller's organization. Notifications are best-effort: a failed enqueue is
//! logged and never undoes the write that triggered it.

use chrono::{DateTime, Duration, Utc};

use super::model::*;
use super::store::{
    ArchiveGuard, ArchiveOutcome, DeleteGuard, DeleteOutcome, ItemPage, ItemStore, PageCursor,
};
use crate::archive::calculate_archive_status;
use crate::error::{BoardError, Result};
use crate::events::{DeletionReason, EventKind, EventQueue, NotificationEvent};
use crate::permissions::{check_permission, Action, UserClaims};

/// Default delay between completion and the scheduled archive
pub const DEFAULT_AUTO_ARCHIVE_DELAY_SECS: i64 = 24 * 60 * 60;

fn authorize(user: &UserClaims, action: Action, resource: Option<&Item>) -> Result<()> {
    if check_permission(user, action, resource) {
        Ok(())
    } else {
        tracing::warn!(user_id = %user.user_id, action = action.as_str(), "Permission denied");
        Err(BoardError::forbidden(format!(
            "{} is not allowed for {}",
            action.as_str(),
            user.user_id
        )))
    }
}

async fn load_task(store: &dyn ItemStore, user: &UserClaims, item_id: &str) -> Result<Item> {
    let item = store
        .get(&user.org_id, item_id)
        .await?
        .ok_or_else(|| BoardError::not_found(format!("item {}", item_id)))?;
    if item.task().is_none() {
        return Err(BoardError::invalid_request(format!(
            "item {} is not a task",
            item_id
        )));
    }
    Ok(item)
}

async fn notify(queue: &dyn EventQueue, event: NotificationEvent) {
    if let Err(e) = queue.enqueue(&event).await {
        tracing::error!(
            error = %e,
            event_type = event.kind.type_name(),
            user_id = %event.user_id,
            "Failed to enqueue notification"
        );
    }
}

/// Create a new task owned by the caller
pub async fn create_task(
    store: &dyn ItemStore,
    user: &UserClaims,
    payload: CreateTaskPayload,
    now: DateTime<Utc>,
) -> Result<Item> {
    authorize(user, Action::CreateTask, None)?;
    if payload.title.trim().is_empty() {
        return Err(BoardError::invalid_request("title is required"));
    }

    let item = Item {
        org_id: user.org_id.clone(),
        item_id: uuid::Uuid::new_v4().to_string(),
        owner_id: user.user_id.clone(),
        title: payload.title,
        content: payload.content,
        status: ItemStatus::Pending,
        created_at: now,
        updated_at: now,
        kind: ItemKind::Task(TaskDetails {
            deadline: payload.deadline,
            subtasks: payload
                .subtasks
                .into_iter()
                .map(|title| Subtask {
                    id: uuid::Uuid::new_v4().to_string(),
                    title,
                    completed: false,
                    completed_at: None,
                })
                .collect(),
            assignee_id: payload.assignee_id,
            archived: None,
            auto_archive_at: None,
        }),
    };

    store.put_new(&item).await?;
    Ok(item)
}

/// Create an announcement and fan it out to the organization
pub async fn create_announcement(
    store: &dyn ItemStore,
    queue: &dyn EventQueue,
    user: &UserClaims,
    payload: CreateAnnouncementPayload,
    now: DateTime<Utc>,
) -> Result<Item> {
    authorize(user, Action::CreateAnnouncement, None)?;
    if payload.title.trim().is_empty() {
        return Err(BoardError::invalid_request("title is required"));
    }

    let priority = payload.priority;
    let item = Item {
        org_id: user.org_id.clone(),
        item_id: uuid::Uuid::new_v4().to_string(),
        owner_id: user.user_id.clone(),
        title: payload.title,
        content: payload.content,
        status: ItemStatus::Active,
        created_at: now,
        updated_at: now,
        kind: ItemKind::Announcement(AnnouncementDetails {
            priority,
            expires_at: payload.expires_at,
            is_pinned: payload.is_pinned,
            pinned_until: payload.pinned_until,
        }),
    };

    store.put_new(&item).await?;

    notify(
        queue,
        NotificationEvent::new(
            EventKind::Announcement {
                content: item.content.clone(),
                priority,
            },
            &item.owner_id,
            &item.title,
        )
        .for_item(&item.org_id, &item.item_id),
    )
    .await;

    Ok(item)
}

/// Move a task to `completed` and schedule its archive
fn mark_completed(item: &mut Item, now: DateTime<Utc>, auto_archive_delay: Duration) {
    item.status = ItemStatus::Completed;
    item.updated_at = now;
    if let Some(task) = item.task_mut() {
        task.auto_archive_at = Some(now + auto_archive_delay);
    }
}

fn completed_event(item: &Item, completed_by: &str) -> NotificationEvent {
    NotificationEvent::new(
        EventKind::TaskCompleted {
            completed_by: Some(completed_by.to_string()),
        },
        &item.owner_id,
        &item.title,
    )
    .for_item(&item.org_id, &item.item_id)
}

/// Flip one subtask and derive the task status from the result
pub async fn toggle_subtask(
    store: &dyn ItemStore,
    queue: &dyn EventQueue,
    user: &UserClaims,
    item_id: &str,
    subtask_id: &str,
    now: DateTime<Utc>,
    auto_archive_delay: Duration,
) -> Result<Item> {
    let mut item = load_task(store, user, item_id).await?;
    authorize(user, Action::UpdateTask, Some(&item))?;
    if item.is_archived() {
        return Err(BoardError::conflict(format!("item {} is archived", item_id)));
    }

    let was_completed = item.status == ItemStatus::Completed;
    let (done, total) = {
        let Some(task) = item.task_mut() else {
            return Err(BoardError::invalid_request("not a task"));
        };
        let subtask = task
            .subtasks
            .iter_mut()
            .find(|s| s.id == subtask_id)
            .ok_or_else(|| BoardError::not_found(format!("subtask {}", subtask_id)))?;
        subtask.completed = !subtask.completed;
        subtask.completed_at = subtask.completed.then_some(now);
        task.subtask_progress()
    };

    let completes = done == total && !was_completed;
    if completes {
        mark_completed(&mut item, now, auto_archive_delay);
    } else if done < total {
        item.status = if done > 0 || was_completed {
            ItemStatus::Active
        } else {
            ItemStatus::Pending
        };
        item.updated_at = now;
        if let Some(task) = item.task_mut() {
            task.auto_archive_at = None;
        }
    } else {
        item.updated_at = now;
    }

    store.replace(&item).await?;
    if completes {
        notify(queue, completed_event(&item, &user.user_id)).await;
    }
    Ok(item)
}

/// Mark a task complete directly; every subtask must already be done
pub async fn complete_task(
    store: &dyn ItemStore,
    queue: &dyn EventQueue,
    user: &UserClaims,
    item_id: &str,
    now: DateTime<Utc>,
    auto_archive_delay: Duration,
) -> Result<Item> {
    let mut item = load_task(store, user, item_id).await?;
    authorize(user, Action::UpdateTask, Some(&item))?;
    if item.is_archived() {
        return Err(BoardError::conflict(format!("item {} is archived", item_id)));
    }
    if item.status == ItemStatus::Completed {
        return Ok(item);
    }
    if let Some(task) = item.task() {
        let (done, total) = task.subtask_progress();
        if done < total {
            return Err(BoardError::invalid_request(format!(
                "{} of {} subtasks are still open",
                total - done,
                total
            )));
        }
    }

    mark_completed(&mut item, now, auto_archive_delay);
    store.replace(&item).await?;
    notify(queue, completed_event(&item, &user.user_id)).await;
    Ok(item)
}

/// Assign a task and notify the assignee
pub async fn assign_task(
    store: &dyn ItemStore,
    queue: &dyn EventQueue,
    user: &UserClaims,
    item_id: &str,
    assignee_id: &str,
    now: DateTime<Utc>,
) -> Result<Item> {
    let mut item = load_task(store, user, item_id).await?;
    authorize(user, Action::UpdateTask, Some(&item))?;
    if item.is_archived() {
        return Err(BoardError::conflict(format!("item {} is archived", item_id)));
    }

    if let Some(task) = item.task_mut() {
        task.assignee_id = Some(assignee_id.to_string());
    }
    item.updated_at = now;
    store.replace(&item).await?;

    notify(
        queue,
        NotificationEvent::new(
            EventKind::TaskAssigned {
                assigned_by: Some(user.user_id.clone()),
            },
            assignee_id,
            &item.title,
        )
        .for_item(&item.org_id, &item.item_id),
    )
    .await;
    Ok(item)
}

/// Archive immediately with the calculated status
pub async fn archive_now(
    store: &dyn ItemStore,
    user: &UserClaims,
    item_id: &str,
    now: DateTime<Utc>,
) -> Result<ArchiveStatus> {
    let item = load_task(store, user, item_id).await?;
    authorize(user, Action::UpdateTask, Some(&item))?;
    archive_with(store, &item, calculate_archive_status(&item), now).await
}

/// Operator override: archive with `forced`, skipping the calculation
pub async fn force_archive(
    store: &dyn ItemStore,
    user: &UserClaims,
    item_id: &str,
    now: DateTime<Utc>,
) -> Result<ArchiveStatus> {
    let item = load_task(store, user, item_id).await?;
    authorize(user, Action::ForceArchiveTask, Some(&item))?;
    archive_with(store, &item, ArchiveStatus::Forced, now).await
}

async fn archive_with(
    store: &dyn ItemStore,
    item: &Item,
    status: ArchiveStatus,
    now: DateTime<Utc>,
) -> Result<ArchiveStatus> {
    match store
        .archive(&item.org_id, &item.item_id, status, now, ArchiveGuard::Immediate)
        .await?
    {
        ArchiveOutcome::Archived => {
            tracing::info!(org_id = %item.org_id, item_id = %item.item_id, status = status.as_str(), "Archived task");
            Ok(status)
        }
        ArchiveOutcome::AlreadyArchived => Err(BoardError::conflict(format!(
            "item {} is already archived",
            item.item_id
        ))),
    }
}

/// Delete a task that has not been archived
pub async fn delete_task(
    store: &dyn ItemStore,
    queue: &dyn EventQueue,
    user: &UserClaims,
    item_id: &str,
) -> Result<()> {
    let item = load_task(store, user, item_id).await?;
    authorize(user, Action::DeleteTask, Some(&item))?;
    if item.is_archived() {
        return Err(BoardError::conflict(format!("item {} is archived", item_id)));
    }

    match store
        .delete_unarchived(&item.org_id, &item.item_id, DeleteGuard::Unarchived)
        .await?
    {
        DeleteOutcome::Deleted => {
            // Someone else removing your task is worth an email
            if item.owner_id != user.user_id {
                notify(
                    queue,
                    NotificationEvent::new(
                        EventKind::TaskDeleted {
                            reason: DeletionReason::DeletedByUser,
                            deadline: item.task().and_then(|t| t.deadline),
                        },
                        &item.owner_id,
                        &item.title,
                    )
                    .for_item(&item.org_id, &item.item_id),
                )
                .await;
            }
            Ok(())
        }
        DeleteOutcome::Skipped => Err(BoardError::conflict(format!(
            "item {} was archived or removed concurrently",
            item_id
        ))),
    }
}

/// Items created by a user, chronological
pub async fn user_feed(
    store: &dyn ItemStore,
    user_id: &str,
    limit: i32,
    cursor: Option<PageCursor>,
) -> Result<ItemPage> {
    store.user_feed(user_id, limit, cursor).await
}

/// All items, newest first
pub async fn global_feed(
    store: &dyn ItemStore,
    limit: i32,
    cursor: Option<PageCursor>,
) -> Result<ItemPage> {
    store.global_feed(limit, cursor).await
}
