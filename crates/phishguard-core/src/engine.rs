//! The engine facade.
//!
//! Wires the session manager, the active source adapter, the ingestion
//! scheduler, and the cache store behind one lifecycle: construct, then
//! [`restore`](Engine::restore) or [`login`](Engine::login), then
//! [`logout`](Engine::logout) on teardown. At most one scheduler runs at a
//! time; every identity change replaces it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use crate::mailbox::{self, DailyStats, EmailRecord};
use crate::session::{
    AuthError, AuthState, LoginCredentials, SessionManager, SessionRecord, SourceKind,
};
use crate::source::{EmailSource, SourceAdapter};
use crate::store::CacheStore;
use crate::sync::{RefreshOutcome, SyncHandle, SyncScheduler, SyncStatus};
use crate::{Error, Result};

/// Service endpoints and polling cadence.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the classification service.
    pub classify_base_url: String,
    /// Base URL of the mail-reading service used by the token flow.
    pub mail_base_url: String,
    /// Tick interval for a credential-flow session.
    pub credential_poll_interval: Duration,
    /// Tick interval for a token-flow session.
    pub token_poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            classify_base_url: "http://localhost:5000".to_string(),
            mail_base_url: "http://localhost:5000".to_string(),
            credential_poll_interval: Duration::from_secs(60),
            token_poll_interval: Duration::from_secs(60),
        }
    }
}

impl EngineConfig {
    fn poll_interval(&self, kind: SourceKind) -> Duration {
        match kind {
            SourceKind::Credential => self.credential_poll_interval,
            SourceKind::Token => self.token_poll_interval,
        }
    }
}

/// Builds the source adapter for a freshly established session.
///
/// The production factory maps the session's source kind onto
/// [`SourceAdapter`]; tests inject stub sources through
/// [`Engine::with_sources`].
pub type SourceFactory = Box<dyn Fn(&SessionRecord) -> Arc<dyn EmailSource> + Send + Sync>;

/// Facade over session, sources, scheduling, and the cache.
pub struct Engine {
    store: Arc<CacheStore>,
    session: Arc<SessionManager>,
    factory: SourceFactory,
    config: EngineConfig,
    handle: Mutex<Option<SyncHandle>>,
}

impl Engine {
    /// Creates an engine over the given store with production adapters.
    #[must_use]
    pub fn new(store: CacheStore, config: EngineConfig) -> Self {
        let factory = Self::production_factory(&config);
        Self::with_sources(store, config, factory)
    }

    /// Creates an engine with a caller-supplied source factory.
    #[must_use]
    pub fn with_sources(store: CacheStore, config: EngineConfig, factory: SourceFactory) -> Self {
        let store = Arc::new(store);
        let session = Arc::new(SessionManager::new(Arc::clone(&store)));
        Self {
            store,
            session,
            factory,
            config,
            handle: Mutex::new(None),
        }
    }

    fn production_factory(config: &EngineConfig) -> SourceFactory {
        let classify = config.classify_base_url.clone();
        let mail = config.mail_base_url.clone();
        Box::new(move |record| {
            let adapter = match record.source_kind {
                SourceKind::Credential => SourceAdapter::credential(classify.clone()),
                SourceKind::Token => SourceAdapter::token(mail.clone(), classify.clone()),
            };
            Arc::new(adapter)
        })
    }

    /// Reconstructs state from the cache store at startup.
    ///
    /// When a stored session is found, ingestion is activated for it
    /// immediately. Never contacts a network service before that.
    pub async fn restore(&self) -> Option<SessionRecord> {
        let record = self.session.restore().await?;
        self.activate(&record).await;
        Some(record)
    }

    /// Establishes a new session and activates ingestion for it.
    ///
    /// Any scheduler from a previous session is stopped first, so its late
    /// results cannot land in the new session's collections.
    ///
    /// # Errors
    ///
    /// Returns the validation failure; no scheduler is started and the
    /// previous one stays stopped.
    pub async fn login(&self, credentials: LoginCredentials) -> Result<SessionRecord> {
        self.deactivate().await;
        let record = self.session.login(credentials).await?;
        self.activate(&record).await;
        Ok(record)
    }

    /// Ends the session, stops ingestion, and clears all cached state.
    pub async fn logout(&self) {
        self.deactivate().await;
        self.session.logout().await;
    }

    /// Requests an immediate fetch cycle for the active source.
    ///
    /// Skipped while a cycle is in flight, while the source is blocked, or
    /// when no session is active.
    pub async fn refresh(&self) -> RefreshOutcome {
        match &*self.handle.lock().await {
            Some(handle) => handle.refresh(),
            None => RefreshOutcome::Skipped,
        }
    }

    /// The active source's merged collection, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSession`] without a live session, or a
    /// deserialization error for an unreadable stored collection.
    pub async fn emails(&self) -> Result<Vec<EmailRecord>> {
        let record = self.active_record()?;
        self.store.emails(record.source_kind).await
    }

    /// The merged collection filtered by the dashboard search term.
    ///
    /// # Errors
    ///
    /// Same conditions as [`emails`](Self::emails).
    pub async fn search(&self, term: &str) -> Result<Vec<EmailRecord>> {
        let emails = self.emails().await?;
        Ok(mailbox::filter_emails(&emails, term).into_iter().cloned().collect())
    }

    /// Removes one record from the active collection and persists the rest.
    ///
    /// Removing an unknown id is a no-op, not an error.
    ///
    /// # Errors
    ///
    /// Same conditions as [`emails`](Self::emails).
    pub async fn delete_email(&self, id: &str) -> Result<()> {
        let record = self.active_record()?;
        let existing = self.store.emails(record.source_kind).await?;
        let remaining = mailbox::remove(&existing, id);
        self.store.put_emails(record.source_kind, &remaining).await
    }

    /// Per-day verdict counts over the active collection, oldest day first.
    ///
    /// # Errors
    ///
    /// Same conditions as [`emails`](Self::emails).
    pub async fn stats(&self) -> Result<Vec<DailyStats>> {
        Ok(mailbox::daily_stats(&self.emails().await?))
    }

    /// Snapshot of the active source's ingestion state, if one is running.
    pub async fn sync_status(&self) -> Option<SyncStatus> {
        self.handle.lock().await.as_ref().map(SyncHandle::status)
    }

    /// Current state of the session machine.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.session.state()
    }

    /// True while a session is live.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Takes the pending login failure, if any.
    #[must_use]
    pub fn take_login_error(&self) -> Option<AuthError> {
        self.session.take_error()
    }

    /// True once the cache lost its persistent backing.
    #[must_use]
    pub fn cache_degraded(&self) -> bool {
        self.store.is_degraded()
    }

    fn active_record(&self) -> Result<SessionRecord> {
        self.session.current().ok_or(Error::NoSession)
    }

    async fn activate(&self, record: &SessionRecord) {
        let source = (self.factory)(record);
        let handle = SyncScheduler::start(
            source,
            Arc::clone(&self.session),
            Arc::clone(&self.store),
            record.clone(),
            self.config.poll_interval(record.source_kind),
        );
        *self.handle.lock().await = Some(handle);
    }

    async fn deactivate(&self) {
        if let Some(handle) = self.handle.lock().await.take() {
            debug!("stopping previous ingestion");
            handle.shutdown().await;
        }
    }
}
