//! Persistent key/value cache for session and merged-collection state.

mod cache;
mod repository;

pub use cache::CacheStore;
pub use repository::KvRepository;

use crate::session::SourceKind;

/// Key under which the session record is mirrored.
pub(crate) const SESSION_KEY: &str = "session";

/// Key under which one source's merged collection is persisted.
pub(crate) fn emails_key(kind: SourceKind) -> String {
    format!("emails:{kind}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_keys_are_source_scoped() {
        assert_eq!(emails_key(SourceKind::Credential), "emails:credential");
        assert_eq!(emails_key(SourceKind::Token), "emails:token");
    }
}
