//! The ingestion scheduler actor.
//!
//! One actor task drives fetch cycles for the active source: an immediate
//! first cycle, then a fixed interval, with a command channel for manual
//! refresh and shutdown. Each cycle runs in a detached task so shutdown is
//! never held up by a slow upstream; the in-flight flag is claimed in the
//! actor before spawning, so overlapping triggers are skipped, never
//! queued.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::status::SyncStatus;
use crate::mailbox::merge;
use crate::session::{SessionManager, SessionRecord};
use crate::source::{EmailSource, FetchError};
use crate::store::CacheStore;

/// Result of asking for a manual refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A cycle was queued to run immediately.
    Requested,
    /// A cycle is already in flight or the source is blocked; nothing was
    /// queued.
    Skipped,
}

enum Command {
    Refresh,
    Shutdown,
}

struct Shared {
    in_flight: AtomicBool,
    blocked: AtomicBool,
    status: Mutex<SyncStatus>,
}

/// Spawns and owns ingestion actors.
pub struct SyncScheduler;

impl SyncScheduler {
    /// Activates ingestion for an authenticated session.
    ///
    /// Performs one immediate fetch cycle, then repeats every `interval`
    /// until [`SyncHandle::shutdown`]. The session epoch is captured here;
    /// a cycle whose result arrives after the epoch has moved (logout or
    /// re-login) is discarded unpersisted.
    #[must_use]
    pub fn start(
        source: Arc<dyn EmailSource>,
        session: Arc<SessionManager>,
        store: Arc<CacheStore>,
        record: SessionRecord,
        interval: Duration,
    ) -> SyncHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let shared = Arc::new(Shared {
            in_flight: AtomicBool::new(false),
            blocked: AtomicBool::new(false),
            status: Mutex::new(SyncStatus::default()),
        });

        let worker = Arc::new(Worker {
            source,
            store,
            epoch: session.epoch(),
            session,
            record,
            shared: Arc::clone(&shared),
        });
        let task = tokio::spawn(worker.run(cmd_rx, interval));

        SyncHandle {
            cmd_tx,
            shared,
            task,
        }
    }
}

/// Control handle for one running ingestion actor.
///
/// Dropping the handle closes the command channel and stops the actor; use
/// [`shutdown`](Self::shutdown) to also wait for it to finish.
pub struct SyncHandle {
    cmd_tx: mpsc::Sender<Command>,
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Requests an immediate fetch cycle, bypassing the interval.
    ///
    /// Obeys the same mutual-exclusion rule as scheduled ticks: ignored
    /// while a cycle is in flight or the source is blocked.
    pub fn refresh(&self) -> RefreshOutcome {
        if self.shared.in_flight.load(Ordering::SeqCst)
            || self.shared.blocked.load(Ordering::SeqCst)
        {
            return RefreshOutcome::Skipped;
        }
        match self.cmd_tx.try_send(Command::Refresh) {
            Ok(()) => RefreshOutcome::Requested,
            Err(_) => RefreshOutcome::Skipped,
        }
    }

    /// Cancels the periodic tick and stops the actor.
    ///
    /// Returns without waiting on the upstream: an in-flight request keeps
    /// running in its detached task, and its result is discarded by the
    /// epoch check if the session has changed.
    pub async fn shutdown(self) {
        let _ = self.cmd_tx.send(Command::Shutdown).await;
        let _ = self.task.await;
    }

    /// Snapshot of the source's sync state.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        let mut status = match self.shared.status.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        status.blocked = self.shared.blocked.load(Ordering::SeqCst);
        status
    }

    /// True while a fetch cycle is outstanding.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.shared.in_flight.load(Ordering::SeqCst)
    }
}

struct Worker {
    source: Arc<dyn EmailSource>,
    session: Arc<SessionManager>,
    store: Arc<CacheStore>,
    record: SessionRecord,
    epoch: u64,
    shared: Arc<Shared>,
}

impl Worker {
    async fn run(self: Arc<Self>, mut cmd_rx: mpsc::Receiver<Command>, interval: Duration) {
        let kind = self.record.source_kind;
        info!(source = %kind, ?interval, "ingestion activated");

        let mut ticker = tokio::time::interval(interval);
        // A tick that fires while a cycle is outstanding is skipped, not
        // queued.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.spawn_cycle(),
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Refresh) => self.spawn_cycle(),
                    Some(Command::Shutdown) | None => break,
                },
            }
        }

        info!(source = %kind, "ingestion deactivated");
    }

    /// Claims the in-flight flag and runs one cycle in a detached task.
    ///
    /// The claim happens here, in the actor, so overlapping triggers are
    /// skipped, never queued. The detached task keeps the actor free to
    /// process `Shutdown` while the upstream call is outstanding.
    fn spawn_cycle(self: &Arc<Self>) {
        let kind = self.record.source_kind;

        if self.shared.blocked.load(Ordering::SeqCst) {
            debug!(source = %kind, "cycle skipped, source blocked until re-login");
            return;
        }
        if self.shared.in_flight.swap(true, Ordering::SeqCst) {
            debug!(source = %kind, "cycle skipped, previous cycle still outstanding");
            return;
        }

        let worker = Arc::clone(self);
        tokio::spawn(async move {
            worker.cycle().await;
            worker.shared.in_flight.store(false, Ordering::SeqCst);
        });
    }

    async fn cycle(&self) {
        let kind = self.record.source_kind;

        let outcome = self.source.fetch_batch(&self.record).await;

        // Stale-response guard: the session that started this cycle may be
        // gone by the time the response arrives.
        if self.session.epoch() != self.epoch {
            debug!(source = %kind, "discarding fetch result from ended session");
            return;
        }

        match outcome {
            Ok(batch) => self.apply(batch).await,
            Err(err) => self.report(err),
        }
    }

    async fn apply(&self, batch: Vec<crate::EmailRecord>) {
        let kind = self.record.source_kind;

        let existing = match self.store.emails(kind).await {
            Ok(existing) => existing,
            Err(err) => {
                warn!(source = %kind, %err, "cached collection unreadable, rebuilding");
                Vec::new()
            }
        };

        let merged = merge(&existing, &batch);
        let added = merged.len() - existing.len();

        // The read above can suspend; re-check so a logout that landed in
        // the meantime is not overwritten.
        if self.session.epoch() != self.epoch {
            debug!(source = %kind, "discarding fetch result from ended session");
            return;
        }

        if let Err(err) = self.store.put_emails(kind, &merged).await {
            warn!(source = %kind, %err, "merged collection not persisted");
        }

        let mut status = self.lock_status();
        status.last_error = None;
        status.last_success = Some(Utc::now());
        status.cycles_completed += 1;
        drop(status);

        info!(source = %kind, fetched = batch.len(), added, total = merged.len(), "fetch cycle merged");
    }

    fn report(&self, err: FetchError) {
        let kind = self.record.source_kind;
        warn!(source = %kind, %err, "fetch cycle failed");

        if err == FetchError::Unauthorized {
            self.shared.blocked.store(true, Ordering::SeqCst);
        }

        let mut status = self.lock_status();
        status.last_error = Some(err);
        status.cycles_completed += 1;
    }

    fn lock_status(&self) -> std::sync::MutexGuard<'_, SyncStatus> {
        match self.shared.status.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
