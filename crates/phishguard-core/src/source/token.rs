//! Token-flow source adapter.

use async_trait::async_trait;
use phishguard_api::{ClassifyClient, MailClient};
use tracing::{debug, warn};

use super::{EmailSource, FetchError, into_records};
use crate::mailbox::EmailRecord;
use crate::session::SessionRecord;

/// Fetches through the mail-reading service with an externally issued
/// access token, then requests classification separately.
pub struct TokenAdapter {
    mail: MailClient,
    classify: ClassifyClient,
}

impl TokenAdapter {
    /// Creates an adapter against the two service base URLs.
    #[must_use]
    pub fn new(mail_base_url: impl Into<String>, classify_base_url: impl Into<String>) -> Self {
        Self {
            mail: MailClient::new(mail_base_url),
            classify: ClassifyClient::new(classify_base_url),
        }
    }
}

#[async_trait]
impl EmailSource for TokenAdapter {
    async fn fetch_batch(&self, session: &SessionRecord) -> Result<Vec<EmailRecord>, FetchError> {
        let Some(token) = session.secret.as_deref().filter(|t| !t.is_empty()) else {
            warn!(email = %session.email, "token session has no access token");
            return Err(FetchError::Unauthorized);
        };

        let raw = self.mail.fetch(token).await.map_err(|err| {
            warn!(email = %session.email, %err, "mailbox fetch failed");
            FetchError::from_api(&err)
        })?;

        // Zero work for the cycle; skip the classification round-trip.
        if raw.is_empty() {
            debug!(email = %session.email, "mailbox batch empty");
            return Ok(Vec::new());
        }

        let classified = self
            .classify
            .analyze_with_token(&session.email, token)
            .await
            .map_err(|err| {
                warn!(email = %session.email, %err, "token classification failed");
                FetchError::from_api(&err)
            })?;

        Ok(into_records(classified))
    }
}
