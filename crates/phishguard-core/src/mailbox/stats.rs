//! Dashboard rollups over a merged collection.

use chrono::NaiveDate;

use super::model::EmailRecord;

/// Per-day verdict counts for the analytics chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyStats {
    /// Calendar day (UTC).
    pub date: NaiveDate,
    /// Total emails received that day.
    pub total: u32,
    /// Emails classified as phishing.
    pub phishing: u32,
    /// Emails classified as safe.
    pub safe: u32,
}

/// Groups a collection by UTC calendar day, oldest day first.
#[must_use]
pub fn daily_stats(emails: &[EmailRecord]) -> Vec<DailyStats> {
    let mut days: Vec<DailyStats> = Vec::new();

    for email in emails {
        let date = email.timestamp.date_naive();
        let idx = days.iter().position(|d| d.date == date).unwrap_or_else(|| {
            days.push(DailyStats {
                date,
                total: 0,
                phishing: 0,
                safe: 0,
            });
            days.len() - 1
        });

        let entry = &mut days[idx];
        entry.total += 1;
        if email.is_phishing {
            entry.phishing += 1;
        } else {
            entry.safe += 1;
        }
    }

    days.sort_by_key(|d| d.date);
    days
}

/// Case-insensitive subject/sender substring filter.
///
/// An empty term matches everything, mirroring the dashboard search box.
#[must_use]
pub fn filter_emails<'a>(emails: &'a [EmailRecord], term: &str) -> Vec<&'a EmailRecord> {
    let term = term.to_lowercase();
    emails
        .iter()
        .filter(|email| {
            email.subject.to_lowercase().contains(&term)
                || email.sender.to_lowercase().contains(&term)
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn record(id: &str, timestamp: &str, is_phishing: bool) -> EmailRecord {
        EmailRecord {
            id: id.to_string(),
            subject: format!("Invoice {id}"),
            sender: "billing@example.com".to_string(),
            body: String::new(),
            timestamp: DateTime::parse_from_rfc3339(timestamp)
                .unwrap()
                .with_timezone(&Utc),
            is_phishing,
            suspicious_urls: vec![],
        }
    }

    #[test]
    fn groups_by_day_ascending() {
        let emails = vec![
            record("e3", "2024-01-02T09:00:00Z", true),
            record("e2", "2024-01-01T18:00:00Z", false),
            record("e1", "2024-01-01T06:00:00Z", true),
        ];

        let stats = daily_stats(&emails);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].date.to_string(), "2024-01-01");
        assert_eq!(stats[0].total, 2);
        assert_eq!(stats[0].phishing, 1);
        assert_eq!(stats[0].safe, 1);
        assert_eq!(stats[1].date.to_string(), "2024-01-02");
        assert_eq!(stats[1].phishing, 1);
        assert_eq!(stats[1].safe, 0);
    }

    #[test]
    fn empty_collection_has_no_days() {
        assert!(daily_stats(&[]).is_empty());
    }

    #[test]
    fn filter_matches_subject_and_sender() {
        let emails = vec![
            record("e1", "2024-01-01T00:00:00Z", false),
            record("e2", "2024-01-01T00:00:00Z", false),
        ];

        assert_eq!(filter_emails(&emails, "invoice e1").len(), 1);
        assert_eq!(filter_emails(&emails, "BILLING").len(), 2);
        assert_eq!(filter_emails(&emails, "").len(), 2);
        assert!(filter_emails(&emails, "lottery").is_empty());
    }
}
