//! Queue consumer turning notification events into delivered messages

pub mod dispatcher;
pub mod fanout;
pub mod messages;

pub use dispatcher::{BatchItemFailure, BatchReport, DispatchSettings, NotificationDispatcher, Outcome};
pub use fanout::FanoutReport;
