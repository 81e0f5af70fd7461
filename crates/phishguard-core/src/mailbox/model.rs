//! Email record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One analyzed email in a merged collection.
///
/// Identity is [`id`](Self::id): two records with the same id are the same
/// logical email regardless of which fetch cycle produced them. Records are
/// immutable once merged; the engine only adds or removes whole records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecord {
    /// Upstream identifier, unique within one source.
    pub id: String,
    /// Message subject.
    pub subject: String,
    /// Sender address.
    pub sender: String,
    /// Plain-text body.
    pub body: String,
    /// When the email was received.
    pub timestamp: DateTime<Utc>,
    /// Classifier verdict.
    pub is_phishing: bool,
    /// URLs the classifier flagged in the body.
    pub suspicious_urls: Vec<String>,
}

impl EmailRecord {
    /// Converts a wire-level record, parsing its timestamp.
    ///
    /// Returns `None` when the timestamp is not valid RFC 3339; callers log
    /// and drop such records rather than failing the whole batch.
    #[must_use]
    pub fn from_wire(wire: phishguard_api::AnalyzedEmail) -> Option<Self> {
        let timestamp = DateTime::parse_from_rfc3339(&wire.timestamp)
            .ok()?
            .with_timezone(&Utc);

        Some(Self {
            id: wire.email_id,
            subject: wire.subject,
            sender: wire.sender,
            body: wire.body,
            timestamp,
            is_phishing: wire.is_phishing,
            suspicious_urls: wire.urls,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use phishguard_api::AnalyzedEmail;

    fn wire(id: &str, timestamp: &str) -> AnalyzedEmail {
        AnalyzedEmail {
            email_id: id.to_string(),
            subject: "subject".to_string(),
            sender: "sender@example.com".to_string(),
            body: "body".to_string(),
            timestamp: timestamp.to_string(),
            is_phishing: false,
            urls: vec![],
        }
    }

    #[test]
    fn from_wire_parses_rfc3339() {
        let record = EmailRecord::from_wire(wire("e1", "2024-01-01T00:00:00Z")).unwrap();
        assert_eq!(record.id, "e1");
        assert_eq!(record.timestamp.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn from_wire_accepts_offsets() {
        let record = EmailRecord::from_wire(wire("e1", "2024-01-01T02:00:00+02:00")).unwrap();
        assert_eq!(record.timestamp.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn from_wire_rejects_garbage_timestamp() {
        assert!(EmailRecord::from_wire(wire("e1", "yesterday")).is_none());
    }

    #[test]
    fn serde_round_trip() {
        let record = EmailRecord::from_wire(wire("e1", "2024-01-01T00:00:00Z")).unwrap();
        let json = serde_json::to_string(&record).unwrap();
        let back: EmailRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
