//! Infrastructure shared by the board lambdas: configuration, AWS client
//! state, the SQS producer and the notification delivery channels.

pub mod config;
pub mod delivery;
pub mod queue;
pub mod state;

pub use config::AppConfig;
pub use state::AppState;

// ========== ATOMS ==========
pub use board_atoms::{BoardError, Result};
