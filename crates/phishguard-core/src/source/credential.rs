//! Credential-flow source adapter.

use async_trait::async_trait;
use phishguard_api::ClassifyClient;
use tracing::{error, warn};

use super::{EmailSource, FetchError, into_records};
use crate::mailbox::EmailRecord;
use crate::session::SessionRecord;

/// Fetches through the classification service, which retrieves and
/// classifies the mailbox server-side in one call.
pub struct CredentialAdapter {
    client: ClassifyClient,
}

impl CredentialAdapter {
    /// Creates an adapter against the classification service base URL.
    #[must_use]
    pub fn new(classify_base_url: impl Into<String>) -> Self {
        Self {
            client: ClassifyClient::new(classify_base_url),
        }
    }
}

#[async_trait]
impl EmailSource for CredentialAdapter {
    async fn fetch_batch(&self, session: &SessionRecord) -> Result<Vec<EmailRecord>, FetchError> {
        // A credential session without a secret is a caller bug, not a
        // retryable condition; it still must not panic mid-cycle.
        let Some(secret) = session.secret.as_deref().filter(|s| !s.is_empty()) else {
            error!(email = %session.email, "credential session has no secret");
            return Err(FetchError::Unauthorized);
        };

        match self.client.analyze(&session.email, secret).await {
            Ok(batch) => Ok(into_records(batch)),
            Err(err) => {
                warn!(email = %session.email, %err, "credential fetch failed");
                Err(FetchError::from_api(&err))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::session::SourceKind;
    use chrono::Utc;

    #[tokio::test]
    async fn missing_secret_fails_without_network() {
        let adapter = CredentialAdapter::new("http://localhost:1");
        let session = SessionRecord {
            email: "a@x.com".to_string(),
            secret: None,
            source_kind: SourceKind::Credential,
            authenticated_at: Utc::now(),
        };

        let err = adapter.fetch_batch(&session).await.unwrap_err();
        assert_eq!(err, FetchError::Unauthorized);
    }
}
