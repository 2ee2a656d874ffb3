pub mod memory;
pub mod model;
pub mod service;

pub use memory::MemoryDirectory;
pub use model::{DirectoryUser, UserPage};
pub use service::*;
