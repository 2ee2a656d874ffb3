//! In-memory queue with a redrive policy, for testing
//!
//! Models the parts of the managed queue the notification pipeline relies on:
//! per-message receive counts, redelivery of only the messages reported as
//! failed, and moving a message to the dead-letter store once it has been
//! received `max_receive_count` times without success.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::model::NotificationEvent;
use super::queue::{EventQueue, QueueMessage};
use crate::error::{BoardError, Result};

#[derive(Default)]
struct QueueState {
    ready: VecDeque<QueueMessage>,
    in_flight: Vec<QueueMessage>,
    dead_letters: Vec<QueueMessage>,
    next_id: u64,
    fail_enqueue: bool,
}

#[derive(Clone)]
pub struct MemoryQueue {
    state: Arc<Mutex<QueueState>>,
    max_receive_count: u32,
}

impl std::fmt::Debug for MemoryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryQueue")
            .field("ready", &state.ready.len())
            .field("in_flight", &state.in_flight.len())
            .field("dead_letters", &state.dead_letters.len())
            .field("max_receive_count", &self.max_receive_count)
            .finish()
    }
}

impl MemoryQueue {
    pub fn new(max_receive_count: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            max_receive_count: max_receive_count.max(1),
        }
    }

    /// Enqueue a raw body, e.g. a malformed message
    pub fn push_raw(&self, body: impl Into<String>) -> String {
        let mut state = self.state.lock();
        state.next_id += 1;
        let message_id = format!("msg-{}", state.next_id);
        state.ready.push_back(QueueMessage {
            message_id: message_id.clone(),
            body: body.into(),
            receive_count: 0,
        });
        message_id
    }

    pub fn fail_enqueue(&self, fail: bool) {
        self.state.lock().fail_enqueue = fail;
    }

    /// Hand out up to `max` messages, bumping their receive count
    pub fn receive(&self, max: usize) -> Vec<QueueMessage> {
        let mut state = self.state.lock();
        let mut batch = Vec::new();
        while batch.len() < max {
            let Some(mut message) = state.ready.pop_front() else {
                break;
            };
            message.receive_count += 1;
            batch.push(message.clone());
            state.in_flight.push(message);
        }
        batch
    }

    /// Settle the in-flight batch: reported failures become visible again
    /// (or dead-letter once exhausted), everything else is deleted
    pub fn settle(&self, failed_ids: &[String]) {
        let failed: HashSet<&str> = failed_ids.iter().map(|s| s.as_str()).collect();
        let mut state = self.state.lock();
        let in_flight = std::mem::take(&mut state.in_flight);
        for message in in_flight {
            if !failed.contains(message.message_id.as_str()) {
                continue;
            }
            if message.receive_count >= self.max_receive_count {
                state.dead_letters.push(message);
            } else {
                state.ready.push_back(message);
            }
        }
    }

    pub fn pending(&self) -> usize {
        let state = self.state.lock();
        state.ready.len() + state.in_flight.len()
    }

    pub fn dead_letters(&self) -> Vec<QueueMessage> {
        self.state.lock().dead_letters.clone()
    }

    /// Every event currently waiting, decoded
    pub fn queued_events(&self) -> Vec<NotificationEvent> {
        self.state
            .lock()
            .ready
            .iter()
            .filter_map(|m| NotificationEvent::from_json(&m.body).ok())
            .collect()
    }
}

#[async_trait]
impl EventQueue for MemoryQueue {
    async fn enqueue(&self, event: &NotificationEvent) -> Result<()> {
        if self.state.lock().fail_enqueue {
            return Err(BoardError::queue("simulated send failure"));
        }
        self.push_raw(event.to_json()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_message_dead_letters_after_max_receives() {
        let queue = MemoryQueue::new(3);
        let id = queue.push_raw("{}");

        for attempt in 1..=3u32 {
            let batch = queue.receive(10);
            assert_eq!(batch.len(), 1);
            assert_eq!(batch[0].receive_count, attempt);
            assert!(queue.dead_letters().is_empty());
            queue.settle(&[id.clone()]);
        }

        assert!(queue.receive(10).is_empty());
        let dead = queue.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].message_id, id);
        assert_eq!(dead[0].receive_count, 3);
    }

    #[test]
    fn test_successful_messages_are_not_redelivered() {
        let queue = MemoryQueue::new(3);
        let ok = queue.push_raw("a");
        let bad = queue.push_raw("b");

        let batch = queue.receive(10);
        assert_eq!(batch.len(), 2);
        queue.settle(&[bad.clone()]);

        let again = queue.receive(10);
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].message_id, bad);
        assert_ne!(again[0].message_id, ok);
    }
}
