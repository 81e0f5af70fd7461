//! End-to-end tests for the engine facade.
//!
//! These tests drive the full lifecycle (login, polling, refresh, logout,
//! restore) against scripted source adapters, so no network service is
//! required.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;

use phishguard_core::{
    AuthState, CacheStore, EmailRecord, EmailSource, Engine, EngineConfig, Error, FetchError,
    LoginCredentials, RefreshOutcome, SessionRecord, SourceFactory, SourceKind,
};

/// Scripted source: pops one result per fetch, defaulting to an empty
/// batch, optionally gated so tests can hold a fetch in flight.
struct ScriptedSource {
    calls: AtomicU32,
    gate: Option<Arc<Semaphore>>,
    script: Mutex<VecDeque<Result<Vec<EmailRecord>, FetchError>>>,
}

impl ScriptedSource {
    fn new(script: Vec<Result<Vec<EmailRecord>, FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            gate: None,
            script: Mutex::new(script.into()),
        })
    }

    fn gated(script: Vec<Result<Vec<EmailRecord>, FetchError>>) -> (Arc<Self>, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let stub = Arc::new(Self {
            calls: AtomicU32::new(0),
            gate: Some(Arc::clone(&gate)),
            script: Mutex::new(script.into()),
        });
        (stub, gate)
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmailSource for ScriptedSource {
    async fn fetch_batch(&self, _session: &SessionRecord) -> Result<Vec<EmailRecord>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(Vec::new()))
    }
}

fn factory_for(stub: &Arc<ScriptedSource>) -> SourceFactory {
    let source: Arc<dyn EmailSource> = Arc::clone(stub) as Arc<dyn EmailSource>;
    Box::new(move |_| Arc::clone(&source))
}

/// Factory that hands out one source per login, in order.
fn factory_queue(sources: Vec<Arc<dyn EmailSource>>) -> SourceFactory {
    let queue = Mutex::new(VecDeque::from(sources));
    Box::new(move |_| queue.lock().unwrap().pop_front().unwrap())
}

async fn engine_with(
    script: Vec<Result<Vec<EmailRecord>, FetchError>>,
) -> (Engine, Arc<ScriptedSource>) {
    let stub = ScriptedSource::new(script);
    let engine = Engine::with_sources(
        CacheStore::in_memory().await.unwrap(),
        EngineConfig::default(),
        factory_for(&stub),
    );
    (engine, stub)
}

fn credentials(kind: SourceKind) -> LoginCredentials {
    LoginCredentials {
        email: "analyst@example.com".to_string(),
        secret: Some("secret".to_string()),
        source_kind: kind,
    }
}

fn email(id: &str, timestamp: &str, subject: &str, is_phishing: bool) -> EmailRecord {
    EmailRecord {
        id: id.to_string(),
        subject: subject.to_string(),
        sender: "billing@example.com".to_string(),
        body: String::new(),
        timestamp: DateTime::parse_from_rfc3339(timestamp)
            .unwrap()
            .with_timezone(&Utc),
        is_phishing,
        suspicious_urls: vec![],
    }
}

/// Polls until the active collection reaches the expected size.
///
/// Paused-clock sleeps auto-advance while the scheduler finishes real work
/// on blocking threads; the bound stays well below the tick interval.
async fn wait_for_len(engine: &Engine, expected: usize) -> Vec<EmailRecord> {
    for _ in 0..1000 {
        if let Ok(emails) = engine.emails().await
            && emails.len() == expected
        {
            return emails;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("collection did not reach {expected} records");
}

/// Polls until the condition holds, like [`wait_for_len`] but for state the
/// stubs expose directly.
async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("engine did not reach expected state");
}

async fn grace() {
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

const TICK: Duration = Duration::from_secs(60);

// The clock is paused manually after each test's store setup rather than
// with `start_paused`: opening the SQLite pool does blocking work, and a
// paused clock auto-advances past sqlx's acquire timeout before the
// connection comes up.

#[tokio::test]
async fn login_runs_an_immediate_cycle_and_persists() {
    let (engine, stub) = engine_with(vec![Ok(vec![
        email("e1", "2024-01-01T00:00:00Z", "Invoice", false),
        email("e2", "2024-01-02T00:00:00Z", "Reset your password", true),
    ])])
    .await;
    tokio::time::pause();

    engine.login(credentials(SourceKind::Credential)).await.unwrap();
    assert!(engine.is_authenticated());

    let emails = wait_for_len(&engine, 2).await;
    let ids: Vec<&str> = emails.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["e2", "e1"]);
    assert_eq!(stub.calls(), 1);

    let status = engine.sync_status().await.unwrap();
    assert!(status.last_error.is_none());
    assert!(status.last_success.is_some());
    engine.logout().await;
}

#[tokio::test]
async fn periodic_cycles_merge_without_rewriting_existing_records() {
    let (engine, stub) = engine_with(vec![
        Ok(vec![email("e1", "2024-01-01T00:00:00Z", "Original subject", false)]),
        Ok(vec![
            // Same id fetched again with different content must not replace
            // the record already in the collection.
            email("e1", "2024-01-01T00:00:00Z", "Rewritten subject", true),
            email("e3", "2024-01-03T00:00:00Z", "New arrival", false),
        ]),
    ])
    .await;
    tokio::time::pause();

    engine.login(credentials(SourceKind::Credential)).await.unwrap();
    wait_for_len(&engine, 1).await;

    tokio::time::advance(TICK).await;
    let emails = wait_for_len(&engine, 2).await;
    assert_eq!(stub.calls(), 2);

    let ids: Vec<&str> = emails.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["e3", "e1"]);
    let e1 = emails.iter().find(|e| e.id == "e1").unwrap();
    assert_eq!(e1.subject, "Original subject");
    assert!(!e1.is_phishing);
    engine.logout().await;
}

#[tokio::test]
async fn manual_refresh_bypasses_the_interval() {
    let (engine, stub) = engine_with(vec![
        Ok(vec![email("e1", "2024-01-01T00:00:00Z", "First", false)]),
        Ok(vec![email("e2", "2024-01-02T00:00:00Z", "Second", false)]),
    ])
    .await;
    tokio::time::pause();

    engine.login(credentials(SourceKind::Credential)).await.unwrap();
    wait_for_len(&engine, 1).await;

    assert_eq!(engine.refresh().await, RefreshOutcome::Requested);
    wait_for_len(&engine, 2).await;
    assert_eq!(stub.calls(), 2);
    engine.logout().await;
}

#[tokio::test]
async fn search_stats_and_delete_operate_on_the_active_collection() {
    let (engine, _stub) = engine_with(vec![Ok(vec![
        email("e1", "2024-01-01T06:00:00Z", "Quarterly invoice", false),
        email("e2", "2024-01-01T18:00:00Z", "Your account is locked", true),
        email("e3", "2024-01-02T09:00:00Z", "Team lunch", false),
    ])])
    .await;
    tokio::time::pause();

    engine.login(credentials(SourceKind::Credential)).await.unwrap();
    wait_for_len(&engine, 3).await;

    let hits = engine.search("invoice").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "e1");
    assert_eq!(engine.search("").await.unwrap().len(), 3);

    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].total, 2);
    assert_eq!(stats[0].phishing, 1);
    assert_eq!(stats[1].total, 1);

    engine.delete_email("e2").await.unwrap();
    let emails = engine.emails().await.unwrap();
    assert_eq!(emails.len(), 2);
    assert!(emails.iter().all(|e| e.id != "e2"));

    // Unknown id is a no-op.
    engine.delete_email("nope").await.unwrap();
    assert_eq!(engine.emails().await.unwrap().len(), 2);
    engine.logout().await;
}

#[tokio::test]
async fn logout_clears_state_and_stops_polling() {
    let (engine, stub) = engine_with(vec![
        Ok(vec![email("e1", "2024-01-01T00:00:00Z", "First session", false)]),
        Ok(vec![email("e2", "2024-01-02T00:00:00Z", "Second session", false)]),
    ])
    .await;
    tokio::time::pause();

    engine.login(credentials(SourceKind::Credential)).await.unwrap();
    wait_for_len(&engine, 1).await;

    engine.logout().await;
    assert_eq!(engine.state(), AuthState::Anonymous);
    assert!(matches!(engine.emails().await, Err(Error::NoSession)));
    assert!(engine.sync_status().await.is_none());
    assert_eq!(engine.refresh().await, RefreshOutcome::Skipped);

    // No further cycles after logout.
    tokio::time::advance(TICK * 3).await;
    grace().await;
    assert_eq!(stub.calls(), 1);

    // A fresh login starts from a cleared collection; nothing from the
    // first session leaks in.
    engine.login(credentials(SourceKind::Credential)).await.unwrap();
    let emails = wait_for_len(&engine, 1).await;
    assert_eq!(emails[0].id, "e2");
    engine.logout().await;
}

#[tokio::test]
async fn logout_completes_while_a_fetch_is_in_flight() {
    let (stub, gate) = ScriptedSource::gated(vec![Ok(vec![email(
        "e1",
        "2024-01-01T00:00:00Z",
        "Slow upstream",
        false,
    )])]);
    let engine = Engine::with_sources(
        CacheStore::in_memory().await.unwrap(),
        EngineConfig::default(),
        factory_queue(vec![Arc::clone(&stub) as Arc<dyn EmailSource>]),
    );
    tokio::time::pause();

    engine.login(credentials(SourceKind::Credential)).await.unwrap();
    wait_for(|| stub.calls() == 1).await;

    // The upstream never answers; logout must still return promptly and
    // leave the request to resolve in the background.
    tokio::time::timeout(Duration::from_secs(2), engine.logout())
        .await
        .unwrap();
    assert_eq!(engine.state(), AuthState::Anonymous);
    assert!(matches!(engine.emails().await, Err(Error::NoSession)));

    // Letting it resolve afterwards changes nothing.
    gate.add_permits(1);
    grace().await;
    assert!(matches!(engine.emails().await, Err(Error::NoSession)));
}

#[tokio::test]
async fn stale_fetch_never_lands_in_the_next_sessions_collection() {
    let (first, gate) = ScriptedSource::gated(vec![Ok(vec![email(
        "e1",
        "2024-01-01T00:00:00Z",
        "From the first session",
        true,
    )])]);
    let second = ScriptedSource::new(vec![Ok(vec![email(
        "e2",
        "2024-01-02T00:00:00Z",
        "From the second session",
        false,
    )])]);
    let engine = Engine::with_sources(
        CacheStore::in_memory().await.unwrap(),
        EngineConfig::default(),
        factory_queue(vec![
            Arc::clone(&first) as Arc<dyn EmailSource>,
            Arc::clone(&second) as Arc<dyn EmailSource>,
        ]),
    );
    tokio::time::pause();

    engine.login(credentials(SourceKind::Credential)).await.unwrap();
    wait_for(|| first.calls() == 1).await;

    // Log out and establish a new session of the same kind while the first
    // session's request is still outstanding.
    engine.logout().await;
    engine.login(credentials(SourceKind::Credential)).await.unwrap();
    wait_for_len(&engine, 1).await;

    // The first session's request resolves only now; its batch must not
    // reach the new session's collection.
    gate.add_permits(1);
    grace().await;

    let emails = engine.emails().await.unwrap();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].id, "e2");
    engine.logout().await;
}

#[tokio::test]
async fn source_kinds_keep_separate_collections() {
    let (engine, _stub) = engine_with(vec![
        Ok(vec![email("c1", "2024-01-01T00:00:00Z", "Credential mail", false)]),
        Ok(vec![email("t1", "2024-01-02T00:00:00Z", "Token mail", false)]),
    ])
    .await;
    tokio::time::pause();

    engine.login(credentials(SourceKind::Credential)).await.unwrap();
    wait_for_len(&engine, 1).await;
    engine.logout().await;

    engine.login(credentials(SourceKind::Token)).await.unwrap();
    let emails = wait_for_len(&engine, 1).await;
    assert_eq!(emails[0].id, "t1");
    engine.logout().await;
}

#[tokio::test]
async fn rejected_login_starts_no_ingestion() {
    let (engine, stub) = engine_with(vec![]).await;
    tokio::time::pause();

    let err = engine
        .login(LoginCredentials {
            email: "not-an-address".to_string(),
            secret: Some("secret".to_string()),
            source_kind: SourceKind::Credential,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    assert!(engine.take_login_error().is_some());

    grace().await;
    assert_eq!(stub.calls(), 0);
    assert!(engine.sync_status().await.is_none());
}

#[tokio::test]
async fn restore_resumes_a_persisted_session() {
    let path = std::env::temp_dir().join(format!("phishguard-engine-{}.db", std::process::id()));
    let path = path.to_string_lossy().into_owned();
    let _ = std::fs::remove_file(&path);

    {
        let stub = ScriptedSource::new(vec![Ok(vec![email(
            "e1",
            "2024-01-01T00:00:00Z",
            "Persisted",
            true,
        )])]);
        let engine = Engine::with_sources(
            CacheStore::open(&path).await,
            EngineConfig::default(),
            factory_for(&stub),
        );
        assert!(!engine.cache_degraded());
        engine.login(credentials(SourceKind::Credential)).await.unwrap();
        wait_for_len(&engine, 1).await;
    }

    // A new engine over the same database models a restart.
    let stub = ScriptedSource::new(vec![]);
    let engine = Engine::with_sources(
        CacheStore::open(&path).await,
        EngineConfig::default(),
        factory_for(&stub),
    );
    let record = engine.restore().await.unwrap();
    assert_eq!(record.email, "analyst@example.com");
    assert!(engine.is_authenticated());

    let emails = wait_for_len(&engine, 1).await;
    assert_eq!(emails[0].id, "e1");
    assert!(emails[0].is_phishing);

    engine.logout().await;
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn restore_with_nothing_stored_stays_anonymous() {
    let (engine, stub) = engine_with(vec![]).await;

    assert!(engine.restore().await.is_none());
    assert_eq!(engine.state(), AuthState::Anonymous);
    assert_eq!(stub.calls(), 0);
}
