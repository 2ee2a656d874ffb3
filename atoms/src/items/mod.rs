// Re-export model types, the store seam and the item operations
pub mod codec;
pub mod keys;
pub mod memory;
pub mod model;
pub mod service;
pub mod store;

pub use memory::MemoryItemStore;
pub use model::*;
pub use store::{
    ArchiveGuard, ArchiveOutcome, DeleteGuard, DeleteOutcome, DynamoItemStore, ItemPage, ItemStore,
    PageCursor, Sweep,
};
