//! Domain atoms of the board: items and their storage seam, the archive
//! calculator, the authorization policy, notification events and the user
//! directory.

pub mod archive;
pub mod error;
pub mod events;
pub mod items;
pub mod permissions;
pub mod users;

pub use error::{BoardError, Result};
