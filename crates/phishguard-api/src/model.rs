//! Wire models shared by the upstream services.

use serde::{Deserialize, Serialize};

/// A single analyzed email as both services serialize it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzedEmail {
    /// Upstream identifier, unique within one source.
    pub email_id: String,
    /// Message subject.
    #[serde(default)]
    pub subject: String,
    /// Sender address.
    #[serde(default)]
    pub sender: String,
    /// Plain-text body.
    #[serde(default)]
    pub body: String,
    /// ISO-8601 timestamp string.
    pub timestamp: String,
    /// Classifier verdict.
    pub is_phishing: bool,
    /// URLs the classifier extracted from the body.
    #[serde(default)]
    pub urls: Vec<String>,
}

/// Success envelope returned by the classification service.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeResponse {
    /// Analyzed emails for the requested mailbox.
    pub emails: Vec<AnalyzedEmail>,
}

/// Error body carried by non-200 responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}
