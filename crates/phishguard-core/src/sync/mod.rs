//! Periodic ingestion scheduling for the active source.

mod scheduler;
mod status;

pub use scheduler::{RefreshOutcome, SyncHandle, SyncScheduler};
pub use status::SyncStatus;
