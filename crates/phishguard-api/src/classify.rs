//! Client for the phishing-classification service.

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{AnalyzeResponse, AnalyzedEmail, ErrorBody};

/// Credentials forwarded to the classification service.
///
/// The service retrieves the mailbox server-side, so the credential flow
/// must include the mailbox secret; the token flow authorizes through a
/// bearer header instead and sends only the address.
#[derive(Debug, Clone, Serialize)]
struct AnalyzeRequest<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret: Option<&'a str>,
}

/// Client for `POST /emails/analyze`.
#[derive(Debug, Clone)]
pub struct ClassifyClient {
    http: reqwest::Client,
    base_url: String,
}

impl ClassifyClient {
    /// Creates a client against the given service base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: trim_base(base_url.into()),
        }
    }

    /// Analyzes a mailbox using the credential flow.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-200 status, or a
    /// response that does not match the service contract.
    pub async fn analyze(&self, email: &str, secret: &str) -> Result<Vec<AnalyzedEmail>> {
        debug!(email, "requesting credential analysis");
        let request = self
            .http
            .post(format!("{}/emails/analyze", self.base_url))
            .json(&AnalyzeRequest {
                email,
                secret: Some(secret),
            });
        Self::send(request).await
    }

    /// Analyzes a mailbox using the token flow.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-200 status, or a
    /// response that does not match the service contract.
    pub async fn analyze_with_token(&self, email: &str, token: &str) -> Result<Vec<AnalyzedEmail>> {
        debug!(email, "requesting token analysis");
        let request = self
            .http
            .post(format!("{}/emails/analyze", self.base_url))
            .bearer_auth(token)
            .json(&AnalyzeRequest { email, secret: None });
        Self::send(request).await
    }

    async fn send(request: reqwest::RequestBuilder) -> Result<Vec<AnalyzedEmail>> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.message)
                .unwrap_or_default();
            return Err(Error::service(status.as_u16(), message));
        }

        let body: AnalyzeResponse = serde_json::from_slice(&response.bytes().await?)?;
        debug!(count = body.emails.len(), "analysis batch received");
        Ok(body.emails)
    }
}

fn trim_base(mut base: String) -> String {
    while base.ends_with('/') {
        base.pop();
    }
    base
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slashes_trimmed() {
        let client = ClassifyClient::new("http://localhost:5000//");
        assert_eq!(client.base_url, "http://localhost:5000");
    }

    #[test]
    fn analyze_request_omits_missing_secret() {
        let with_secret = serde_json::to_value(AnalyzeRequest {
            email: "a@x.com",
            secret: Some("p"),
        })
        .unwrap();
        assert_eq!(with_secret["secret"], "p");

        let without = serde_json::to_value(AnalyzeRequest {
            email: "a@x.com",
            secret: None,
        })
        .unwrap();
        assert!(without.get("secret").is_none());
    }
}
