//! Session model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which ingestion path a session is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Credential-based retrieval through the classification service.
    Credential,
    /// Token-based retrieval through the mail-reading service.
    Token,
}

impl SourceKind {
    /// Both ingestion paths, in a fixed order.
    pub const ALL: [Self; 2] = [Self::Credential, Self::Token];

    /// Stable name used in cache keys and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Credential => "credential",
            Self::Token => "token",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated identity and chosen ingestion source.
///
/// Exactly one record is live at a time. It is owned by the
/// [`SessionManager`](super::SessionManager); the cache store only mirrors
/// it. For the token flow, `secret` holds the externally issued access
/// token obtained once at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Mailbox address.
    pub email: String,
    /// Mailbox password (credential flow) or access token (token flow).
    pub secret: Option<String>,
    /// Which source adapter the scheduler uses.
    pub source_kind: SourceKind,
    /// When the session was established.
    pub authenticated_at: DateTime<Utc>,
}

/// Input to [`SessionManager::login`](super::SessionManager::login).
#[derive(Debug, Clone)]
pub struct LoginCredentials {
    /// Mailbox address.
    pub email: String,
    /// Password or access token, depending on `source_kind`.
    pub secret: Option<String>,
    /// Requested ingestion path.
    pub source_kind: SourceKind,
}

/// Login rejection, surfaced synchronously and never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No email address supplied.
    #[error("email address is required")]
    EmptyEmail,
    /// Email address does not look like an address.
    #[error("invalid email address format")]
    InvalidEmail,
    /// Credential flow without a password.
    #[error("password is required for credential login")]
    MissingSecret,
    /// Token flow without an access token.
    #[error("access token is required for token login")]
    MissingToken,
}

impl LoginCredentials {
    /// Validates that a usable identity was supplied for the requested
    /// source kind.
    ///
    /// # Errors
    ///
    /// Returns the first [`AuthError`] found.
    pub fn validate(&self) -> Result<(), AuthError> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err(AuthError::EmptyEmail);
        }
        if !is_plausible_email(email) {
            return Err(AuthError::InvalidEmail);
        }

        let has_secret = self.secret.as_deref().is_some_and(|s| !s.is_empty());
        match self.source_kind {
            SourceKind::Credential if !has_secret => Err(AuthError::MissingSecret),
            SourceKind::Token if !has_secret => Err(AuthError::MissingToken),
            _ => Ok(()),
        }
    }
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}
