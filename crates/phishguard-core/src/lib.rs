//! # phishguard-core
//!
//! Session and multi-source email aggregation engine for the PhishGuard
//! dashboard.
//!
//! This crate provides:
//! - Session management (login, logout, restore across restarts)
//! - Pluggable source adapters for the credential and token ingestion paths
//! - A pure merge/dedupe engine over analyzed email batches
//! - Periodic ingestion scheduling with manual refresh
//! - Persistent key/value caching that survives restarts and degrades
//!   gracefully when storage is unavailable
//!
//! The [`Engine`] facade wires these together with one documented lifecycle:
//! construct, [`restore`](Engine::restore) or [`login`](Engine::login), then
//! [`logout`](Engine::logout) on teardown.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod engine;
mod error;
pub mod mailbox;
pub mod session;
pub mod source;
pub mod store;
pub mod sync;

pub use engine::{Engine, EngineConfig, SourceFactory};
pub use error::{Error, Result};
pub use mailbox::{DailyStats, EmailRecord, daily_stats, filter_emails, merge, remove};
pub use session::{AuthError, AuthState, LoginCredentials, SessionManager, SessionRecord, SourceKind};
pub use source::{CredentialAdapter, EmailSource, FetchError, SourceAdapter, TokenAdapter};
pub use store::CacheStore;
pub use sync::{RefreshOutcome, SyncHandle, SyncScheduler, SyncStatus};
