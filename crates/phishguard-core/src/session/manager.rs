//! Session state machine and lifecycle.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::model::{AuthError, LoginCredentials, SessionRecord};
use crate::store::CacheStore;

/// Authentication state machine.
///
/// `Anonymous → Authenticating → {Authenticated, Failed}`; `Authenticated`
/// leaves only via [`SessionManager::logout`]. `Failed` returns to
/// `Anonymous` once the caller observes the error, so there is no stuck
/// failed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// No session.
    Anonymous,
    /// Login in progress.
    Authenticating,
    /// Live session.
    Authenticated(SessionRecord),
    /// Last login was rejected; cleared on observation.
    Failed(AuthError),
}

/// Owns the session record and its state machine.
///
/// The cache store only mirrors the record; every transition goes through
/// this type. The **session epoch** increases on every login and logout and
/// lets late fetch results detect that the session that started them is
/// gone.
pub struct SessionManager {
    store: Arc<CacheStore>,
    state: Mutex<AuthState>,
    epoch: AtomicU64,
}

impl SessionManager {
    /// Creates a manager over the given store, in the anonymous state.
    #[must_use]
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self {
            store,
            state: Mutex::new(AuthState::Anonymous),
            epoch: AtomicU64::new(0),
        }
    }

    /// Reconstructs session state from the cache store at startup.
    ///
    /// Never contacts a network service, and succeeds on an empty store by
    /// returning `None`. A record that fails to deserialize is discarded
    /// with a warning rather than propagated.
    pub async fn restore(&self) -> Option<SessionRecord> {
        match self.store.session().await {
            Ok(Some(record)) => {
                info!(email = %record.email, source = %record.source_kind, "session restored");
                *self.lock_state() = AuthState::Authenticated(record.clone());
                Some(record)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(%err, "stored session unreadable, discarding");
                self.store.remove(crate::store::SESSION_KEY).await;
                None
            }
        }
    }

    /// Establishes a new session identity.
    ///
    /// Validates the supplied credentials for the requested source kind,
    /// mirrors the new record to the cache store, and transitions to
    /// `Authenticated`. Never contacts a source adapter: login establishes
    /// identity, not mail content. Logging in over a live session routes
    /// through [`logout`](Self::logout) first, so the previous identity's
    /// cached collections never leak into the new one.
    ///
    /// # Errors
    ///
    /// Returns the validation failure. From anonymous, the machine parks in
    /// `Failed` until observed through [`take_error`](Self::take_error); a
    /// rejected re-login leaves the live session untouched.
    pub async fn login(&self, credentials: LoginCredentials) -> Result<SessionRecord, AuthError> {
        if let Err(err) = credentials.validate() {
            warn!(%err, "login rejected");
            if !self.is_authenticated() {
                *self.lock_state() = AuthState::Failed(err.clone());
            }
            return Err(err);
        }

        if self.is_authenticated() {
            self.logout().await;
        }
        *self.lock_state() = AuthState::Authenticating;

        let record = SessionRecord {
            email: credentials.email.trim().to_string(),
            secret: credentials.secret,
            source_kind: credentials.source_kind,
            authenticated_at: Utc::now(),
        };

        if let Err(err) = self.store.put_session(&record).await {
            // The store degrades on storage failure, so this is only
            // reachable for an unserializable record.
            warn!(%err, "session record not mirrored");
        }

        self.epoch.fetch_add(1, Ordering::SeqCst);
        *self.lock_state() = AuthState::Authenticated(record.clone());
        info!(email = %record.email, source = %record.source_kind, "session established");
        Ok(record)
    }

    /// Destroys the session and clears every cached merged collection.
    pub async fn logout(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.store.clear_all().await;
        *self.lock_state() = AuthState::Anonymous;
        info!("session ended");
    }

    /// Current state of the machine.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.lock_state().clone()
    }

    /// The live session record, if authenticated.
    #[must_use]
    pub fn current(&self) -> Option<SessionRecord> {
        match &*self.lock_state() {
            AuthState::Authenticated(record) => Some(record.clone()),
            _ => None,
        }
    }

    /// True while a session is live.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(&*self.lock_state(), AuthState::Authenticated(_))
    }

    /// Takes the pending login failure, returning the machine to anonymous.
    #[must_use]
    pub fn take_error(&self) -> Option<AuthError> {
        let mut state = self.lock_state();
        if let AuthState::Failed(err) = &*state {
            let err = err.clone();
            *state = AuthState::Anonymous;
            return Some(err);
        }
        None
    }

    /// Monotonic counter identifying the current session generation.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, AuthState> {
        // State is never held across an await.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
