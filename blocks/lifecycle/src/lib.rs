//! Scheduled item lifecycle: auto-archive sweep and overdue-pending cleanup

pub mod reconcile;
pub mod summary;

pub use reconcile::{ReconcileSettings, Reconciler};
pub use summary::{JobResponse, SweepSummary};
