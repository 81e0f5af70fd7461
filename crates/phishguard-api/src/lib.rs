//! # phishguard-api
//!
//! Typed HTTP clients for the two upstream services the PhishGuard engine
//! aggregates from:
//!
//! - the **classification service**, which retrieves a mailbox server-side
//!   and returns analyzed emails (`POST /emails/analyze`), and
//! - the **mail-reading service**, which reads a mailbox through an
//!   externally issued access token (`GET /emails/fetch`).
//!
//! Both clients return wire-level [`AnalyzedEmail`] records; mapping into
//! domain types is the caller's concern.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod classify;
mod error;
pub mod mail;
pub mod model;

pub use classify::ClassifyClient;
pub use error::{Error, Result};
pub use mail::MailClient;
pub use model::{AnalyzedEmail, AnalyzeResponse};
