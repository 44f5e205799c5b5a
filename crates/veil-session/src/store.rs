//! The session store service.
//!
//! [`SessionStore`] layers the relay's retention policy over a
//! [`SessionBackend`]: logical expiry on every read, a cancellable
//! background sweep, and push-based completion waiting.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{MemoryBackend, SessionBackend};
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::session::{ProxySession, SessionState, short_id};

/// Snapshot of store statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Physically stored sessions, including expired ones awaiting a sweep.
    pub sessions: usize,
    /// Retention window.
    pub max_age: Duration,
    /// Whether the background sweep task is running.
    pub sweep_running: bool,
}

struct StoreInner {
    backend: Arc<dyn SessionBackend>,
    config: StoreConfig,
    /// Bumped on every mutation so waiters re-check their session.
    changed: watch::Sender<u64>,
    sweep: Mutex<Option<CancellationToken>>,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        if let Some(token) = self.sweep.get_mut().take() {
            token.cancel();
        }
    }
}

/// Expiring store of relay sessions.
///
/// Cheap to clone; clones share the same backend and sweep task.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("backend", &self.inner.backend)
            .field("config", &self.inner.config)
            .field("sweep_running", &self.is_running())
            .finish()
    }
}

impl SessionStore {
    /// Create a store over an arbitrary backend.
    pub fn new(backend: Arc<dyn SessionBackend>, config: StoreConfig) -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            inner: Arc::new(StoreInner {
                backend,
                config,
                changed,
                sweep: Mutex::new(None),
            }),
        }
    }

    /// Create a store over a fresh [`MemoryBackend`].
    pub fn in_memory(config: StoreConfig) -> Self {
        Self::new(Arc::new(MemoryBackend::new()), config)
    }

    /// Store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create and store a pending session.
    ///
    /// A missing or blank `callback_url` falls back to the configured default.
    pub async fn create(
        &self,
        provider: impl Into<String>,
        callback_url: Option<&str>,
    ) -> Result<ProxySession> {
        let callback_url = callback_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(&self.inner.config.default_callback_url);

        let session = ProxySession::new(provider, callback_url);
        self.inner.backend.set(session.clone()).await?;

        debug!(
            session_id = %short_id(&session.session_id),
            provider = %session.provider,
            "Created relay session"
        );
        Ok(session)
    }

    /// Store a pre-built session as is.
    pub async fn insert(&self, session: ProxySession) -> Result<()> {
        self.inner.backend.set(session).await?;
        self.notify();
        Ok(())
    }

    /// Fetch a live session.
    ///
    /// Returns `Error::Expired` for a session past the retention window and
    /// removes it eagerly; `Error::NotFound` if the id is unknown.
    pub async fn get(&self, session_id: &str) -> Result<ProxySession> {
        let session = self
            .inner
            .backend
            .get(session_id)
            .await?
            .ok_or_else(|| Error::NotFound(short_id(session_id).to_string()))?;

        if session.is_expired_at(Utc::now(), self.inner.config.max_age) {
            self.inner.backend.delete(session_id).await?;
            self.notify();
            return Err(Error::Expired(short_id(session_id).to_string()));
        }

        Ok(session)
    }

    /// Derived state of a session, `Expired` when it is gone or too old.
    pub async fn state(&self, session_id: &str) -> Result<SessionState> {
        match self.get(session_id).await {
            Ok(session) => Ok(session.state_at(Utc::now(), self.inner.config.max_age)),
            Err(Error::Expired(_)) => Ok(SessionState::Expired),
            Err(e) => Err(e),
        }
    }

    /// Attach credentials to a live session, marking it complete.
    ///
    /// A repeated callback replaces the payload. The write never re-creates
    /// a session that was consumed or swept since it was read.
    pub async fn complete(
        &self,
        session_id: &str,
        session_data: serde_json::Value,
    ) -> Result<ProxySession> {
        let repeated = self.get(session_id).await?.callback_received;
        let session = self
            .inner
            .backend
            .update(session_id, Box::new(move |s| s.complete(session_data)))
            .await?
            .ok_or_else(|| Error::NotFound(short_id(session_id).to_string()))?;
        self.notify();

        if repeated {
            warn!(session_id = %short_id(session_id), "Relay session completed again");
        } else {
            info!(
                session_id = %short_id(session_id),
                provider = %session.provider,
                "Relay session completed"
            );
        }
        Ok(session)
    }

    /// Read the credentials of a completed session.
    ///
    /// Returns `Ok(None)` while the session is still pending. With
    /// single-use tokens enabled, a successful read deletes the session and
    /// only the caller that removed it gets the credentials.
    pub async fn consume(&self, session_id: &str) -> Result<Option<serde_json::Value>> {
        let session = self.get(session_id).await?;
        if session.session_data.is_none() {
            return Ok(None);
        }
        if !self.inner.config.single_use_tokens {
            return Ok(session.session_data);
        }

        let removed = self
            .inner
            .backend
            .delete(session_id)
            .await?
            .ok_or_else(|| Error::NotFound(short_id(session_id).to_string()))?;
        self.notify();
        debug!(session_id = %short_id(session_id), "Consumed single-use relay token");
        Ok(removed.session_data)
    }

    /// Delete a session. Returns whether it existed.
    pub async fn delete(&self, session_id: &str) -> Result<bool> {
        let removed = self.inner.backend.delete(session_id).await?.is_some();
        if removed {
            self.notify();
        }
        Ok(removed)
    }

    /// Remove every expired session now. Returns the number removed.
    pub async fn sweep(&self) -> Result<usize> {
        self.sweep_at(Utc::now()).await
    }

    /// Remove every session expired at `now`.
    pub async fn sweep_at(&self, now: chrono::DateTime<Utc>) -> Result<usize> {
        let removed = self
            .inner
            .backend
            .sweep(now, self.inner.config.max_age)
            .await?;
        if !removed.is_empty() {
            self.notify();
            debug!(count = removed.len(), "Swept expired relay sessions");
        }
        Ok(removed.len())
    }

    /// Current statistics.
    pub async fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            sessions: self.inner.backend.len().await?,
            max_age: self.inner.config.max_age,
            sweep_running: self.is_running(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sweep lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Spawn the periodic sweep task. Must be called inside a Tokio runtime.
    ///
    /// No-op if the task is already running or disabled in the config.
    pub fn start(&self) {
        if !self.inner.config.enable_sweep_task {
            debug!("Relay session sweep disabled");
            return;
        }

        let mut slot = self.inner.sweep.lock();
        if slot.is_some() {
            return;
        }

        let token = CancellationToken::new();
        let interval = self.inner.config.sweep_interval;
        tokio::spawn(sweep_loop(
            Arc::downgrade(&self.inner),
            interval,
            token.clone(),
        ));
        *slot = Some(token);

        info!(interval_secs = interval.as_secs(), "Started relay session sweep");
    }

    /// Stop the periodic sweep task.
    pub fn stop(&self) {
        if let Some(token) = self.inner.sweep.lock().take() {
            token.cancel();
            info!("Stopped relay session sweep");
        }
    }

    /// Whether the sweep task is running.
    pub fn is_running(&self) -> bool {
        self.inner.sweep.lock().is_some()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Completion waiting
    // ─────────────────────────────────────────────────────────────────────────

    /// Wait until the session is complete and return its credentials.
    ///
    /// Fails with `NotFound`/`Expired` once the session disappears and with
    /// `Timeout` when `timeout` elapses first.
    pub async fn await_completion(
        &self,
        session_id: &str,
        timeout: Duration,
    ) -> Result<serde_json::Value> {
        tokio::time::timeout(timeout, self.wait_for_data(session_id))
            .await
            .map_err(|_| Error::Timeout(short_id(session_id).to_string()))?
    }

    async fn wait_for_data(&self, session_id: &str) -> Result<serde_json::Value> {
        // Subscribe before the first read so a completion in between is seen.
        let mut changed = self.inner.changed.subscribe();

        loop {
            let session = self.get(session_id).await?;
            if let Some(data) = session.session_data {
                return Ok(data);
            }

            let age = (Utc::now() - session.created_at).to_std().unwrap_or_default();
            let until_expiry = self.inner.config.max_age.saturating_sub(age);

            // Wake at the expiry boundary too, so an unswept session still fails.
            match tokio::time::timeout(until_expiry + Duration::from_millis(1), changed.changed())
                .await
            {
                Ok(Ok(())) | Err(_) => continue,
                Ok(Err(_)) => return Err(Error::Backend("session store dropped".to_string())),
            }
        }
    }

    fn notify(&self) {
        self.inner.changed.send_modify(|generation| *generation += 1);
    }
}

async fn sweep_loop(inner: Weak<StoreInner>, interval: Duration, token: CancellationToken) {
    let start = tokio::time::Instant::now() + interval;
    let mut ticker = tokio::time::interval_at(start, interval);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let Some(inner) = inner.upgrade() else { break };
                let store = SessionStore { inner };
                if let Err(e) = store.sweep().await {
                    warn!(error = %e, "Relay session sweep failed");
                }
            }
        }
    }

    debug!("Relay session sweep task exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> SessionStore {
        SessionStore::in_memory(StoreConfig::default())
    }

    fn backdated(minutes: i64) -> ProxySession {
        ProxySession::new("google", "myapp://callback")
            .with_created_at(Utc::now() - chrono::Duration::minutes(minutes))
    }

    #[tokio::test]
    async fn test_create_defaults_callback_url() {
        let store = store();
        let session = store.create("google", None).await.unwrap();
        assert_eq!(session.callback_url, "myapp://callback");

        let custom = store.create("github", Some("veil://done")).await.unwrap();
        assert_eq!(custom.callback_url, "veil://done");

        let blank = store.create("github", Some("  ")).await.unwrap();
        assert_eq!(blank.callback_url, "myapp://callback");
    }

    #[tokio::test]
    async fn test_create_then_get_is_pending() {
        let store = store();
        let session = store.create("google", None).await.unwrap();

        let fetched = store.get(&session.session_id).await.unwrap();
        assert_eq!(fetched, session);
        assert_eq!(
            store.state(&session.session_id).await.unwrap(),
            SessionState::Pending
        );
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let err = store().get("does-not-exist").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(err.is_gone());
    }

    #[tokio::test]
    async fn test_get_expired_removes_session() {
        let store = store();
        let session = backdated(11);
        let id = session.session_id.clone();
        store.insert(session).await.unwrap();

        let err = store.get(&id).await.unwrap_err();
        assert!(matches!(err, Error::Expired(_)));
        assert_eq!(store.stats().await.unwrap().sessions, 0);
        assert!(matches!(
            store.get(&id).await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_complete_then_consume() {
        let store = store();
        let session = store.create("google", None).await.unwrap();
        let payload = json!({"user": {"email": "x@y.com", "name": "X"}});

        store
            .complete(&session.session_id, payload.clone())
            .await
            .unwrap();
        assert_eq!(
            store.state(&session.session_id).await.unwrap(),
            SessionState::Complete
        );

        // Multi-use by default.
        assert_eq!(
            store.consume(&session.session_id).await.unwrap(),
            Some(payload.clone())
        );
        assert_eq!(
            store.consume(&session.session_id).await.unwrap(),
            Some(payload)
        );
    }

    #[tokio::test]
    async fn test_consume_pending_is_none() {
        let store = store();
        let session = store.create("google", None).await.unwrap();
        assert_eq!(store.consume(&session.session_id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_single_use_tokens() {
        let store = SessionStore::in_memory(StoreConfig::new().with_single_use_tokens(true));
        let session = store.create("google", None).await.unwrap();
        store
            .complete(&session.session_id, json!({"ok": true}))
            .await
            .unwrap();

        assert!(store.consume(&session.session_id).await.unwrap().is_some());
        assert!(matches!(
            store.consume(&session.session_id).await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_complete_expired_fails() {
        let store = store();
        let session = backdated(15);
        let id = session.session_id.clone();
        store.insert(session).await.unwrap();

        let err = store.complete(&id, json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Expired(_)));
    }

    #[tokio::test]
    async fn test_repeated_complete_replaces_payload() {
        let store = store();
        let session = store.create("google", None).await.unwrap();
        store
            .complete(&session.session_id, json!({"n": 1}))
            .await
            .unwrap();
        store
            .complete(&session.session_id, json!({"n": 2}))
            .await
            .unwrap();

        assert_eq!(
            store.consume(&session.session_id).await.unwrap(),
            Some(json!({"n": 2}))
        );
    }

    /// Backend where another caller removes each session right after it is read.
    #[derive(Debug, Default)]
    struct VanishingBackend {
        inner: MemoryBackend,
    }

    #[async_trait::async_trait]
    impl SessionBackend for VanishingBackend {
        async fn get(&self, session_id: &str) -> Result<Option<ProxySession>> {
            let session = self.inner.get(session_id).await?;
            self.inner.delete(session_id).await?;
            Ok(session)
        }
        async fn set(&self, session: ProxySession) -> Result<()> {
            self.inner.set(session).await
        }
        async fn update(
            &self,
            session_id: &str,
            apply: crate::backend::SessionUpdate,
        ) -> Result<Option<ProxySession>> {
            self.inner.update(session_id, apply).await
        }
        async fn delete(&self, session_id: &str) -> Result<Option<ProxySession>> {
            self.inner.delete(session_id).await
        }
        async fn sweep(
            &self,
            now: chrono::DateTime<Utc>,
            max_age: Duration,
        ) -> Result<Vec<String>> {
            self.inner.sweep(now, max_age).await
        }
        async fn len(&self) -> Result<usize> {
            self.inner.len().await
        }
    }

    #[tokio::test]
    async fn test_complete_does_not_resurrect_removed_session() {
        let store = SessionStore::new(
            Arc::new(VanishingBackend::default()),
            StoreConfig::default().with_single_use_tokens(true),
        );
        let session = store.create("google", None).await.unwrap();

        let err = store
            .complete(&session.session_id, json!({"n": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(store.stats().await.unwrap().sessions, 0);
    }

    #[tokio::test]
    async fn test_single_use_consume_after_removal_is_not_found() {
        let store = SessionStore::new(
            Arc::new(VanishingBackend::default()),
            StoreConfig::default().with_single_use_tokens(true),
        );
        let mut session = ProxySession::new("google", "cb");
        session.complete(json!({"token": "t"}));
        let id = session.session_id.clone();
        store.insert(session).await.unwrap();

        // The read succeeds but someone else already removed the entry.
        assert!(matches!(
            store.consume(&id).await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_sweep_deletes_regardless_of_state() {
        let store = store();
        let mut done = backdated(12);
        done.complete(json!({}));
        store.insert(done).await.unwrap();
        store.insert(backdated(12)).await.unwrap();
        let fresh = store.create("google", None).await.unwrap();

        assert_eq!(store.sweep().await.unwrap(), 2);
        assert_eq!(store.stats().await.unwrap().sessions, 1);
        assert!(store.get(&fresh.session_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = store();
        let session = store.create("google", None).await.unwrap();
        assert!(store.delete(&session.session_id).await.unwrap());
        assert!(!store.delete(&session.session_id).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_task_lifecycle() {
        let config = StoreConfig::new().with_sweep_interval(Duration::from_secs(300));
        let store = SessionStore::in_memory(config);
        store.insert(backdated(11)).await.unwrap();

        store.start();
        assert!(store.is_running());
        store.start(); // idempotent

        tokio::time::sleep(Duration::from_secs(301)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(store.stats().await.unwrap().sessions, 0);

        store.stop();
        assert!(!store.is_running());

        store.insert(backdated(11)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(601)).await;
        assert_eq!(store.stats().await.unwrap().sessions, 1);
    }

    #[tokio::test]
    async fn test_start_respects_disabled_sweep() {
        let store = SessionStore::in_memory(StoreConfig::new().with_sweep_task(false));
        store.start();
        assert!(!store.is_running());
    }

    #[tokio::test]
    async fn test_await_completion_wakes_on_complete() {
        let store = store();
        let session = store.create("google", None).await.unwrap();
        let id = session.session_id.clone();

        let waiter = {
            let store = store.clone();
            let id = id.clone();
            tokio::spawn(async move { store.await_completion(&id, Duration::from_secs(5)).await })
        };

        tokio::task::yield_now().await;
        store.complete(&id, json!({"token": "t"})).await.unwrap();

        let data = waiter.await.unwrap().unwrap();
        assert_eq!(data, json!({"token": "t"}));
    }

    #[tokio::test]
    async fn test_await_completion_already_complete() {
        let store = store();
        let session = store.create("google", None).await.unwrap();
        store
            .complete(&session.session_id, json!({"a": 1}))
            .await
            .unwrap();

        let data = store
            .await_completion(&session.session_id, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(data, json!({"a": 1}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_completion_timeout() {
        let store = store();
        let session = store.create("google", None).await.unwrap();

        let err = store
            .await_completion(&session.session_id, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn test_await_completion_deleted_session() {
        let store = store();
        let session = store.create("google", None).await.unwrap();
        let id = session.session_id.clone();

        let waiter = {
            let store = store.clone();
            let id = id.clone();
            tokio::spawn(async move { store.await_completion(&id, Duration::from_secs(5)).await })
        };

        tokio::task::yield_now().await;
        store.delete(&id).await.unwrap();

        let err = waiter.await.unwrap().unwrap_err();
        assert!(err.is_gone());
    }
}
