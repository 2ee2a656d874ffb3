use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use board_atoms::events::{
    DeletionReason, EventKind, EventQueue, MemoryQueue, NotificationEvent, QueueMessage,
};
use board_atoms::items::{
    Item, ItemKind, ItemStatus, MemoryItemStore, Priority, Subtask, TaskDetails,
};
use board_atoms::users::MemoryDirectory;
use board_shared::delivery::MemoryChannel;
use chrono::Utc;
use notifications_block::{DispatchSettings, NotificationDispatcher, Outcome};

struct Harness {
    items: MemoryItemStore,
    directory: MemoryDirectory,
    channel: MemoryChannel,
    dispatcher: NotificationDispatcher,
}

fn settings() -> DispatchSettings {
    DispatchSettings {
        max_receive_count: 3,
        recipient_cap: 500,
        fanout_batch_size: 10,
        fanout_delay: Duration::ZERO,
        delivery_timeout: Duration::from_secs(1),
        directory_timeout: Duration::from_secs(1),
    }
}

fn harness_with(settings: DispatchSettings) -> Harness {
    let items = MemoryItemStore::new();
    let directory = MemoryDirectory::new();
    let channel = MemoryChannel::new();
    let dispatcher = NotificationDispatcher::new(
        Arc::new(items.clone()),
        Arc::new(directory.clone()),
        Arc::new(channel.clone()),
        settings,
    );
    Harness {
        items,
        directory,
        channel,
        dispatcher,
    }
}

fn harness() -> Harness {
    harness_with(settings())
}

fn completed_task(item_id: &str) -> Item {
    let now = Utc::now();
    Item {
        org_id: "org-1".to_string(),
        item_id: item_id.to_string(),
        owner_id: "u1".to_string(),
        title: "Ship release".to_string(),
        content: String::new(),
        status: ItemStatus::Completed,
        created_at: now,
        updated_at: now,
        kind: ItemKind::Task(TaskDetails {
            subtasks: vec![
                Subtask {
                    id: "s1".into(),
                    title: "Build".into(),
                    completed: true,
                    completed_at: Some(now),
                },
                Subtask {
                    id: "s2".into(),
                    title: "Tag".into(),
                    completed: true,
                    completed_at: Some(now),
                },
            ],
            ..TaskDetails::default()
        }),
    }
}

fn deleted_event(user_id: &str) -> NotificationEvent {
    NotificationEvent::new(
        EventKind::TaskDeleted {
            reason: DeletionReason::OverdueInactive,
            deadline: None,
        },
        user_id,
        "Old task",
    )
    .for_item("org-1", "gone")
}

fn announcement_event() -> NotificationEvent {
    NotificationEvent::new(
        EventKind::Announcement {
            content: "The office is closed on Friday".to_string(),
            priority: Priority::High,
        },
        "admin-1",
        "Office closure",
    )
    .for_item("org-1", "a1")
}

fn message(id: &str, event: &NotificationEvent) -> QueueMessage {
    QueueMessage::new(id, event.to_json().unwrap())
}

#[tokio::test]
async fn test_completion_notice_carries_subtask_ratio() {
    let h = harness();
    h.directory.add_user("org-1", "u1", Some("u1@example.com"));
    h.items.insert(completed_task("t1"));

    let event = NotificationEvent::new(
        EventKind::TaskCompleted {
            completed_by: Some("u1".into()),
        },
        "u1",
        "Ship release",
    )
    .for_item("org-1", "t1");

    assert_eq!(h.dispatcher.handle_message(&message("m1", &event)).await, Outcome::Delivered);

    let delivered = h.channel.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].recipient, "u1@example.com");
    assert!(delivered[0].body.contains("2/2"));
}

#[tokio::test]
async fn test_assignment_for_missing_item_is_dropped() {
    let h = harness();
    h.directory.add_user("org-1", "u2", Some("u2@example.com"));

    let event = NotificationEvent::new(
        EventKind::TaskAssigned {
            assigned_by: Some("u1".into()),
        },
        "u2",
        "Ship release",
    )
    .for_item("org-1", "never-existed");

    assert_eq!(h.dispatcher.handle_message(&message("m1", &event)).await, Outcome::Dropped);
    assert_eq!(h.channel.attempts(), 0);
}

#[tokio::test]
async fn test_deletion_notice_needs_only_the_payload() {
    let h = harness();
    h.directory.add_user("org-1", "u1", Some("u1@example.com"));

    let outcome = h.dispatcher.handle_message(&message("m1", &deleted_event("u1"))).await;

    assert_eq!(outcome, Outcome::Delivered);
    let delivered = h.channel.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].subject, "Task removed: Old task");
}

#[tokio::test]
async fn test_unknown_recipient_is_retryable() {
    let h = harness();
    let outcome = h.dispatcher.handle_message(&message("m1", &deleted_event("nobody"))).await;
    assert_eq!(outcome, Outcome::Retry);
}

#[tokio::test]
async fn test_poison_message_does_not_block_the_batch() {
    let h = harness();
    h.directory.add_user("org-1", "u1", Some("u1@example.com"));
    let queue = MemoryQueue::new(3);
    queue.push_raw("not json at all");
    queue.push_raw(r#"{"type":"TASK_EXPLODED","userId":"u1","title":"x","enqueuedAt":"2024-01-01T00:00:00Z"}"#);
    queue.enqueue(&deleted_event("u1")).await.unwrap();

    let batch = queue.receive(10);
    assert_eq!(batch.len(), 3);
    let report = h.dispatcher.process_batch(&batch).await;

    assert_eq!(report.processed, 3);
    assert_eq!(report.successful, 3);
    assert!(report.batch_item_failures.is_empty());
    assert_eq!(h.channel.delivered().len(), 1);

    queue.settle(&report.failed_ids());
    assert_eq!(queue.pending(), 0);
    assert!(queue.dead_letters().is_empty());
}

#[tokio::test]
async fn test_failing_delivery_is_retried_then_dead_lettered() {
    let h = harness();
    h.directory.add_user("org-1", "u1", Some("u1@example.com"));
    h.directory.add_user("org-1", "u2", Some("u2@example.com"));
    h.channel.fail_for("u1@example.com");

    let queue = MemoryQueue::new(3);
    queue.enqueue(&deleted_event("u1")).await.unwrap();
    queue.enqueue(&deleted_event("u2")).await.unwrap();

    let mut rounds = 0;
    loop {
        let batch = queue.receive(10);
        if batch.is_empty() {
            break;
        }
        rounds += 1;
        let report = h.dispatcher.process_batch(&batch).await;
        queue.settle(&report.failed_ids());
    }

    assert_eq!(rounds, 3);
    // One success for u2, three attempts for u1
    assert_eq!(h.channel.attempts(), 4);
    assert_eq!(h.channel.delivered().len(), 1);

    let dead = queue.dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].receive_count, 3);
    let dead_event = NotificationEvent::from_json(&dead[0].body).unwrap();
    assert_eq!(dead_event.user_id, "u1");
}

#[tokio::test]
async fn test_only_failed_messages_are_reported() {
    let h = harness();
    h.directory.add_user("org-1", "u1", Some("u1@example.com"));

    let batch = vec![
        message("ok", &deleted_event("u1")),
        message("missing", &deleted_event("ghost")),
        QueueMessage::new("poison", "{"),
    ];
    let report = h.dispatcher.process_batch(&batch).await;

    assert_eq!(report.processed, 3);
    assert_eq!(report.successful, 2);
    assert_eq!(report.failed_ids(), vec!["missing".to_string()]);

    let wire = serde_json::to_value(&report).unwrap();
    assert_eq!(wire["batchItemFailures"][0]["itemIdentifier"], "missing");
}

#[tokio::test]
async fn test_announcement_reaches_every_recipient_once() {
    let h = harness();
    for i in 0..125 {
        h.directory.add_user("org-1", &format!("u{}", i), Some(&format!("u{}@example.com", i)));
    }

    let report = h
        .dispatcher
        .announce("org-1", "Office closure", "Closed Friday", Priority::Normal)
        .await
        .unwrap();

    assert_eq!(report.recipients, 125);
    assert_eq!(report.delivered, 125);
    assert_eq!(report.failed, 0);
    assert_eq!(report.batches, 13);

    let mut per_recipient: HashMap<String, usize> = HashMap::new();
    for delivered in h.channel.delivered() {
        *per_recipient.entry(delivered.recipient).or_default() += 1;
    }
    assert_eq!(per_recipient.len(), 125);
    assert!(per_recipient.values().all(|count| *count == 1));
}

#[tokio::test]
async fn test_announcement_respects_recipient_cap() {
    let h = harness_with(DispatchSettings {
        recipient_cap: 50,
        ..settings()
    });
    for i in 0..80 {
        h.directory.add_user("org-1", &format!("u{}", i), Some(&format!("u{}@example.com", i)));
    }

    let report = h
        .dispatcher
        .announce("org-1", "Office closure", "Closed Friday", Priority::Normal)
        .await
        .unwrap();

    assert_eq!(report.recipients, 50);
    assert_eq!(report.batches, 5);
    assert_eq!(h.channel.delivered().len(), 50);
}

#[tokio::test]
async fn test_partial_announcement_is_not_retried() {
    let h = harness();
    h.directory.add_user("org-1", "u1", Some("u1@example.com"));
    h.directory.add_user("org-1", "u2", None);
    h.channel.fail_for("u1@example.com");
    h.directory.add_user("org-1", "u3", Some("u3@example.com"));

    let outcome = h
        .dispatcher
        .handle_message(&message("m1", &announcement_event()))
        .await;

    // One of two deliveries landed; no retry so u3 is not messaged twice
    assert_eq!(outcome, Outcome::Delivered);
    assert_eq!(h.channel.delivered().len(), 1);
    assert_eq!(h.channel.delivered()[0].subject, "[HIGH] Office closure");
}

#[tokio::test]
async fn test_announcement_retries_when_directory_is_down() {
    let h = harness();
    h.directory.add_user("org-1", "u1", Some("u1@example.com"));
    h.directory.set_unavailable(true);

    let outcome = h
        .dispatcher
        .handle_message(&message("m1", &announcement_event()))
        .await;

    assert_eq!(outcome, Outcome::Retry);
    assert_eq!(h.channel.attempts(), 0);
}

#[tokio::test]
async fn test_announcement_retries_when_every_delivery_fails() {
    let h = harness();
    h.directory.add_user("org-1", "u1", Some("u1@example.com"));
    h.channel.fail_all(true);

    let outcome = h
        .dispatcher
        .handle_message(&message("m1", &announcement_event()))
        .await;

    assert_eq!(outcome, Outcome::Retry);
}

#[tokio::test]
async fn test_announcement_stays_inside_its_organization() {
    let h = harness();
    for i in 0..3 {
        h.directory.add_user("org-1", &format!("a{}", i), Some(&format!("a{}@acme.test", i)));
        h.directory.add_user("org-2", &format!("b{}", i), Some(&format!("b{}@other.test", i)));
    }

    let outcome = h
        .dispatcher
        .handle_message(&message("m1", &announcement_event()))
        .await;

    assert_eq!(outcome, Outcome::Delivered);
    let delivered = h.channel.delivered();
    assert_eq!(delivered.len(), 3);
    assert!(delivered.iter().all(|m| m.recipient.ends_with("@acme.test")));
}

#[tokio::test]
async fn test_announcement_without_organization_is_dropped() {
    let h = harness();
    h.directory.add_user("org-1", "u1", Some("u1@example.com"));
    let mut event = announcement_event();
    event.org_id = None;

    let outcome = h.dispatcher.handle_message(&message("m1", &event)).await;

    assert_eq!(outcome, Outcome::Dropped);
    assert_eq!(h.channel.attempts(), 0);
}

#[tokio::test]
async fn test_body_without_enqueued_at_is_delivered() {
    let h = harness();
    h.directory.add_user("org-1", "u1", Some("u1@example.com"));
    let body = r#"{"type":"TASK_DELETED","userId":"u1","itemId":"t1","orgId":"org-1","title":"Old","reason":"overdue_inactive"}"#;

    let outcome = h
        .dispatcher
        .handle_message(&QueueMessage::new("m1", body))
        .await;

    assert_eq!(outcome, Outcome::Delivered);
    assert_eq!(h.channel.delivered().len(), 1);
}
