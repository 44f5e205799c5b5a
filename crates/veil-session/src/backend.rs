//! Storage backends for relay sessions.
//!
//! The store is written against [`SessionBackend`] so a multi-instance
//! deployment can swap the process-local [`MemoryBackend`] for a shared
//! key-value service without touching the HTTP handlers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::session::{ProxySession, short_id};

/// In-place mutation applied by [`SessionBackend::update`].
pub type SessionUpdate = Box<dyn FnOnce(&mut ProxySession) + Send>;

/// Trait for session storage backends.
///
/// Backends store sessions physically; logical expiry is applied by the
/// [`SessionStore`](crate::SessionStore) on top, so a backend may return a
/// session that is already past its retention window.
#[async_trait]
pub trait SessionBackend: Send + Sync + std::fmt::Debug {
    /// Fetch a session by id.
    async fn get(&self, session_id: &str) -> Result<Option<ProxySession>>;

    /// Insert or replace a session.
    async fn set(&self, session: ProxySession) -> Result<()>;

    /// Mutate a stored session atomically.
    ///
    /// Returns the updated session, or `None` without inserting anything
    /// if the id is absent.
    async fn update(&self, session_id: &str, apply: SessionUpdate)
    -> Result<Option<ProxySession>>;

    /// Remove a session, returning it if it existed.
    async fn delete(&self, session_id: &str) -> Result<Option<ProxySession>>;

    /// Remove every session older than `max_age` at `now`.
    ///
    /// Returns the ids that were removed.
    async fn sweep(&self, now: DateTime<Utc>, max_age: Duration) -> Result<Vec<String>>;

    /// Number of physically stored sessions.
    async fn len(&self) -> Result<usize>;
}

/// Process-local backend.
///
/// Sessions live in a `HashMap` behind a `RwLock`; a second relay process
/// will not see them.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    sessions: Arc<RwLock<HashMap<String, ProxySession>>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionBackend for MemoryBackend {
    async fn get(&self, session_id: &str) -> Result<Option<ProxySession>> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn set(&self, session: ProxySession) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session.session_id.clone(), session);
        Ok(())
    }

    async fn update(
        &self,
        session_id: &str,
        apply: SessionUpdate,
    ) -> Result<Option<ProxySession>> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.get_mut(session_id).map(|session| {
            apply(session);
            session.clone()
        }))
    }

    async fn delete(&self, session_id: &str) -> Result<Option<ProxySession>> {
        Ok(self.sessions.write().await.remove(session_id))
    }

    async fn sweep(&self, now: DateTime<Utc>, max_age: Duration) -> Result<Vec<String>> {
        let mut sessions = self.sessions.write().await;
        let expired: Vec<String> = sessions
            .values()
            .filter(|s| s.is_expired_at(now, max_age))
            .map(|s| s.session_id.clone())
            .collect();

        for id in &expired {
            sessions.remove(id);
            debug!(session_id = %short_id(id), "Removed expired relay session");
        }

        Ok(expired)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.sessions.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let backend = MemoryBackend::new();
        let session = ProxySession::new("google", "cb").with_id("abc123");

        backend.set(session.clone()).await.unwrap();
        assert_eq!(backend.get("abc123").await.unwrap(), Some(session.clone()));
        assert_eq!(backend.len().await.unwrap(), 1);

        let removed = backend.delete("abc123").await.unwrap();
        assert_eq!(removed, Some(session));
        assert!(backend.get("abc123").await.unwrap().is_none());
        assert!(backend.delete("abc123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_replaces_existing() {
        let backend = MemoryBackend::new();
        let mut session = ProxySession::new("google", "cb").with_id("abc123");
        backend.set(session.clone()).await.unwrap();

        session.complete(serde_json::json!({"email": "x@y.com"}));
        backend.set(session).await.unwrap();

        let stored = backend.get("abc123").await.unwrap().unwrap();
        assert!(stored.callback_received);
        assert_eq!(backend.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_in_place() {
        let backend = MemoryBackend::new();
        backend
            .set(ProxySession::new("google", "cb").with_id("abc123"))
            .await
            .unwrap();

        let updated = backend
            .update(
                "abc123",
                Box::new(|s| s.complete(serde_json::json!({"n": 1}))),
            )
            .await
            .unwrap()
            .unwrap();
        assert!(updated.callback_received);
        assert_eq!(backend.get("abc123").await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn test_update_missing_does_not_insert() {
        let backend = MemoryBackend::new();
        let result = backend
            .update("gone", Box::new(|s| s.complete(serde_json::json!({}))))
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(backend.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_old_sessions() {
        let backend = MemoryBackend::new();
        let now = Utc::now();

        let old = ProxySession::new("google", "cb")
            .with_id("old")
            .with_created_at(now - chrono::Duration::minutes(11));
        let mut old_complete = ProxySession::new("google", "cb")
            .with_id("old-complete")
            .with_created_at(now - chrono::Duration::minutes(20));
        old_complete.complete(serde_json::json!({}));
        let fresh = ProxySession::new("google", "cb").with_id("fresh");

        backend.set(old).await.unwrap();
        backend.set(old_complete).await.unwrap();
        backend.set(fresh).await.unwrap();

        let mut removed = backend
            .sweep(now, Duration::from_secs(600))
            .await
            .unwrap();
        removed.sort();

        assert_eq!(removed, vec!["old".to_string(), "old-complete".to_string()]);
        assert_eq!(backend.len().await.unwrap(), 1);
        assert!(backend.get("fresh").await.unwrap().is_some());
    }
}
