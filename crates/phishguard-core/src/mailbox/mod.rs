//! Merged email collections: domain model, merge engine, and rollups.

mod merge;
mod model;
mod stats;

pub use merge::{merge, remove};
pub use model::EmailRecord;
pub use stats::{DailyStats, daily_stats, filter_emails};
