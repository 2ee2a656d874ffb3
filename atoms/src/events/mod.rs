pub mod memory;
pub mod model;
pub mod queue;

pub use memory::MemoryQueue;
pub use model::{DeletionReason, EventKind, NotificationEvent};
pub use queue::{EventQueue, QueueMessage};
