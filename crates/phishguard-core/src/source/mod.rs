//! Source adapters: pluggable strategies for retrieving one batch of
//! analyzed emails from an external service.

mod credential;
mod token;

pub use credential::CredentialAdapter;
pub use token::TokenAdapter;

use async_trait::async_trait;
use tracing::warn;

use crate::mailbox::EmailRecord;
use crate::session::SessionRecord;

/// Typed failure of one fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Credential or token rejected mid-session. Blocks further scheduling
    /// for the source until re-login; never forces a logout.
    #[error("source rejected the session credentials")]
    Unauthorized,
    /// Transient network or service failure; retried on the next tick.
    #[error("source is unreachable")]
    Unreachable,
    /// Upstream contract violation; the cycle is treated as an empty batch.
    #[error("source returned a malformed response")]
    MalformedResponse,
}

impl FetchError {
    /// Maps an upstream client error onto the cycle taxonomy.
    pub(crate) fn from_api(err: &phishguard_api::Error) -> Self {
        use phishguard_api::Error;
        match err {
            Error::Http(_) => Self::Unreachable,
            Error::Json(_) | Error::UnexpectedShape(_) => Self::MalformedResponse,
            Error::Service { .. } if err.is_unauthorized() => Self::Unauthorized,
            Error::Service { .. } => Self::Unreachable,
        }
    }
}

/// Common contract of the two ingestion paths.
///
/// An adapter turns one external call into a batch of email records or a
/// typed failure. Implementations are side-effect free with respect to the
/// engine: merging and persistence happen in the scheduler.
#[async_trait]
pub trait EmailSource: Send + Sync {
    /// Fetches one batch for the given session.
    ///
    /// An empty batch is valid (zero work for the cycle).
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] describing how the cycle failed.
    async fn fetch_batch(&self, session: &SessionRecord) -> Result<Vec<EmailRecord>, FetchError>;
}

/// Production dispatch over the two adapter variants.
///
/// The ingestion paths are a tagged union rather than a type hierarchy so
/// the scheduler stays source-agnostic.
pub enum SourceAdapter {
    /// Credential-based retrieval through the classification service.
    Credential(CredentialAdapter),
    /// Token-based retrieval through the mail-reading service.
    Token(TokenAdapter),
}

impl SourceAdapter {
    /// Builds the credential-flow adapter.
    #[must_use]
    pub fn credential(classify_base_url: impl Into<String>) -> Self {
        Self::Credential(CredentialAdapter::new(classify_base_url))
    }

    /// Builds the token-flow adapter.
    #[must_use]
    pub fn token(
        mail_base_url: impl Into<String>,
        classify_base_url: impl Into<String>,
    ) -> Self {
        Self::Token(TokenAdapter::new(mail_base_url, classify_base_url))
    }
}

#[async_trait]
impl EmailSource for SourceAdapter {
    async fn fetch_batch(&self, session: &SessionRecord) -> Result<Vec<EmailRecord>, FetchError> {
        match self {
            Self::Credential(adapter) => adapter.fetch_batch(session).await,
            Self::Token(adapter) => adapter.fetch_batch(session).await,
        }
    }
}

/// Converts a wire batch, dropping records whose timestamps do not parse.
pub(crate) fn into_records(batch: Vec<phishguard_api::AnalyzedEmail>) -> Vec<EmailRecord> {
    batch
        .into_iter()
        .filter_map(|wire| {
            let id = wire.email_id.clone();
            let record = EmailRecord::from_wire(wire);
            if record.is_none() {
                warn!(email_id = %id, "dropping record with unparseable timestamp");
            }
            record
        })
        .collect()
}
