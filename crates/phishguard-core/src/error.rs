//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Upstream service call failed.
    #[error("API error: {0}")]
    Api(#[from] phishguard_api::Error),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Login was rejected before any network call.
    #[error("Authentication error: {0}")]
    Auth(#[from] crate::session::AuthError),

    /// Operation requires an authenticated session.
    #[error("No active session")]
    NoSession,
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
