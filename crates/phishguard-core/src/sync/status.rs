//! Observable per-source sync state.

use chrono::{DateTime, Utc};

use crate::source::FetchError;

/// Snapshot of one source's ingestion state, for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    /// Error from the most recent cycle, cleared by the next success.
    pub last_error: Option<FetchError>,
    /// Completion time of the most recent successful cycle.
    pub last_success: Option<DateTime<Utc>>,
    /// Cycles completed since activation, successful or not.
    pub cycles_completed: u64,
    /// True once an `Unauthorized` failure stopped further cycles; cleared
    /// only by re-login (which replaces the scheduler).
    pub blocked: bool,
}
