//! Client for the token-flow mail-reading service.

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{AnalyzedEmail, ErrorBody};

/// Client for `GET /emails/fetch`.
#[derive(Debug, Clone)]
pub struct MailClient {
    http: reqwest::Client,
    base_url: String,
}

impl MailClient {
    /// Creates a client against the given service base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base = base_url.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self {
            http: reqwest::Client::new(),
            base_url: base,
        }
    }

    /// Fetches the mailbox batch for an access token.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-200 status, or a
    /// response that is neither an `{emails: […]}` envelope nor a bare
    /// array.
    pub async fn fetch(&self, token: &str) -> Result<Vec<AnalyzedEmail>> {
        let response = self
            .http
            .get(format!("{}/emails/fetch", self.base_url))
            .query(&[("token", token)])
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.message)
                .unwrap_or_default();
            return Err(Error::service(status.as_u16(), message));
        }

        let value: Value = serde_json::from_slice(&response.bytes().await?)?;
        let emails = parse_fetch_payload(value)?;
        debug!(count = emails.len(), "mailbox batch received");
        Ok(emails)
    }
}

/// Normalizes the two payload shapes the service is known to emit.
///
/// Historically the endpoint returned a bare array; newer builds wrap it in
/// an `{emails: […]}` envelope. Anything else violates the contract.
///
/// # Errors
///
/// Returns [`Error::UnexpectedShape`] for any other shape, and a JSON error
/// when the array elements cannot be decoded as emails.
pub fn parse_fetch_payload(value: Value) -> Result<Vec<AnalyzedEmail>> {
    let array = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("emails") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(Error::UnexpectedShape(format!(
                    "\"emails\" is not an array: {other}"
                )));
            }
            None => {
                return Err(Error::UnexpectedShape(
                    "object without an \"emails\" field".to_string(),
                ));
            }
        },
        other => {
            return Err(Error::UnexpectedShape(format!(
                "expected object or array, got {other}"
            )));
        }
    };

    array
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(Error::from))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "email_id": "e1",
            "subject": "hi",
            "sender": "a@x.com",
            "body": "",
            "timestamp": "2024-01-01T00:00:00Z",
            "is_phishing": false,
            "urls": []
        })
    }

    #[test]
    fn wrapped_envelope() {
        let emails = parse_fetch_payload(json!({ "emails": [sample()] })).unwrap();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].email_id, "e1");
    }

    #[test]
    fn bare_array() {
        let emails = parse_fetch_payload(json!([sample(), sample()])).unwrap();
        assert_eq!(emails.len(), 2);
    }

    #[test]
    fn empty_envelope_is_zero_work() {
        let emails = parse_fetch_payload(json!({ "emails": [] })).unwrap();
        assert!(emails.is_empty());
    }

    #[test]
    fn object_without_emails_rejected() {
        let err = parse_fetch_payload(json!({ "messages": [] })).unwrap_err();
        assert!(matches!(err, Error::UnexpectedShape(_)));
    }

    #[test]
    fn scalar_rejected() {
        let err = parse_fetch_payload(json!(42)).unwrap_err();
        assert!(matches!(err, Error::UnexpectedShape(_)));
    }

    #[test]
    fn emails_not_an_array_rejected() {
        let err = parse_fetch_payload(json!({ "emails": "nope" })).unwrap_err();
        assert!(matches!(err, Error::UnexpectedShape(_)));
    }

    #[test]
    fn malformed_element_is_json_error() {
        let err = parse_fetch_payload(json!([{ "email_id": "e1" }])).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }
}
