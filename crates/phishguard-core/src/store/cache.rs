//! Cache store with graceful degradation.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::repository::KvRepository;
use super::{SESSION_KEY, emails_key};
use crate::session::SourceKind;
use crate::{EmailRecord, Result};

/// JSON key/value persistence for the engine.
///
/// Values are written through an in-memory mirror to SQLite. Any storage
/// failure flips the store into memory-only operation for the rest of the
/// session: reads and writes keep working, nothing is propagated to the
/// caller as a fetch error, and the condition is logged once.
pub struct CacheStore {
    repo: Option<KvRepository>,
    memory: Mutex<HashMap<String, String>>,
    degraded: AtomicBool,
}

impl CacheStore {
    /// Opens a store backed by the given database path.
    ///
    /// When the database cannot be opened the store starts degraded rather
    /// than failing: state will not survive a restart, but the engine stays
    /// usable.
    pub async fn open(database_path: &str) -> Self {
        match KvRepository::new(database_path).await {
            Ok(repo) => Self::with_repository(repo),
            Err(err) => {
                warn!(%err, "cache database unavailable, running memory-only");
                Self::memory_only()
            }
        }
    }

    /// Creates a store backed by an in-memory SQLite database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails.
    pub async fn in_memory() -> Result<Self> {
        Ok(Self::with_repository(KvRepository::in_memory().await?))
    }

    /// Creates a store with no persistence at all.
    #[must_use]
    pub fn memory_only() -> Self {
        Self {
            repo: None,
            memory: Mutex::new(HashMap::new()),
            degraded: AtomicBool::new(true),
        }
    }

    pub(crate) fn with_repository(repo: KvRepository) -> Self {
        Self {
            repo: Some(repo),
            memory: Mutex::new(HashMap::new()),
            degraded: AtomicBool::new(false),
        }
    }

    /// True once a storage failure forced memory-only operation.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Reads and deserializes the value for a key.
    ///
    /// # Errors
    ///
    /// Returns an error only when a stored value cannot be deserialized;
    /// storage failures degrade the store and read as `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let cached = {
            let memory = self.lock_memory();
            memory.get(key).cloned()
        };

        let raw = match cached {
            Some(raw) => Some(raw),
            None => match self.repo_get(key).await {
                Some(raw) => {
                    self.lock_memory().insert(key.to_string(), raw.clone());
                    Some(raw)
                }
                None => None,
            },
        };

        raw.map(|raw| serde_json::from_str(&raw)).transpose().map_err(Into::into)
    }

    /// Serializes and writes the value for a key.
    ///
    /// # Errors
    ///
    /// Returns an error only when the value cannot be serialized; storage
    /// failures degrade the store and keep the in-memory copy.
    pub async fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.lock_memory().insert(key.to_string(), raw.clone());

        if let Some(repo) = self.active_repo()
            && let Err(err) = repo.put(key, &raw).await
        {
            self.degrade("write", key, &err);
        }
        Ok(())
    }

    /// Removes the entry for a key.
    pub async fn remove(&self, key: &str) {
        self.lock_memory().remove(key);

        if let Some(repo) = self.active_repo()
            && let Err(err) = repo.delete(key).await
        {
            self.degrade("delete", key, &err);
        }
    }

    /// Reads the mirrored session record.
    ///
    /// # Errors
    ///
    /// Returns an error when a stored record cannot be deserialized.
    pub async fn session(&self) -> Result<Option<crate::SessionRecord>> {
        self.get(SESSION_KEY).await
    }

    /// Mirrors the session record.
    ///
    /// # Errors
    ///
    /// Returns an error when the record cannot be serialized.
    pub async fn put_session(&self, record: &crate::SessionRecord) -> Result<()> {
        self.put(SESSION_KEY, record).await
    }

    /// Reads one source's merged collection, defaulting to empty.
    ///
    /// # Errors
    ///
    /// Returns an error when a stored collection cannot be deserialized.
    pub async fn emails(&self, kind: SourceKind) -> Result<Vec<EmailRecord>> {
        Ok(self.get(&emails_key(kind)).await?.unwrap_or_default())
    }

    /// Persists one source's merged collection.
    ///
    /// # Errors
    ///
    /// Returns an error when the collection cannot be serialized.
    pub async fn put_emails(&self, kind: SourceKind, emails: &[EmailRecord]) -> Result<()> {
        self.put(&emails_key(kind), &emails).await
    }

    /// Clears the session and every merged collection.
    ///
    /// Intentionally total: logout must not leak a stale collection to a
    /// subsequent different user in the same browser context.
    pub async fn clear_all(&self) {
        self.remove(SESSION_KEY).await;
        for kind in SourceKind::ALL {
            self.remove(&emails_key(kind)).await;
        }
        debug!("cache cleared");
    }

    async fn repo_get(&self, key: &str) -> Option<String> {
        let repo = self.active_repo()?;
        match repo.get(key).await {
            Ok(value) => value,
            Err(err) => {
                self.degrade("read", key, &err);
                None
            }
        }
    }

    fn active_repo(&self) -> Option<&KvRepository> {
        if self.degraded.load(Ordering::Relaxed) {
            return None;
        }
        self.repo.as_ref()
    }

    fn degrade(&self, operation: &str, key: &str, err: &crate::Error) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            warn!(operation, key, %err, "cache storage failed, degrading to memory-only");
        }
    }

    fn lock_memory(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // The mirror is never held across an await; a poisoned lock can only
        // come from a panic in this module.
        match self.memory.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
