//! Error types for upstream service calls.

/// Result type alias for API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the upstream service clients.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level failure (connection refused, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success status with the service's `{message}` body.
    #[error("service error ({status}): {message}")]
    Service {
        /// HTTP status code.
        status: u16,
        /// Human-readable message from the service, if any.
        message: String,
    },

    /// Response was syntactically valid but not one of the shapes the
    /// service contract allows.
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),
}

impl Error {
    /// Creates a service error from a status code and message.
    #[must_use]
    pub fn service(status: u16, message: impl Into<String>) -> Self {
        Self::Service {
            status,
            message: message.into(),
        }
    }

    /// Returns true if the service rejected the caller's credentials.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Service { status: 401 | 403, .. })
    }
}
