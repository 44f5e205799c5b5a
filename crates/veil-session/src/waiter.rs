//! Transport-agnostic "pending authorization" resource.
//!
//! The desktop side only needs to know when an out-of-band browser login
//! finished. [`AuthorizationWaiter`] hides whether that answer comes from
//! polling a remote relay or from waiting on an in-process store.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Error;
use crate::store::SessionStore;

/// Result of a completed authorization.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Relay session id.
    pub session_id: String,
    /// Token to present to the session endpoint. Equal to the session id.
    pub token: String,
}

/// Waits for an out-of-band authorization to finish.
#[async_trait]
pub trait AuthorizationWaiter: Send + Sync {
    /// Error type of the underlying transport.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Block until `session_id` completes, fails, or `timeout` elapses.
    async fn await_completion(
        &self,
        session_id: &str,
        timeout: Duration,
    ) -> std::result::Result<Completion, Self::Error>;
}

#[async_trait]
impl AuthorizationWaiter for SessionStore {
    type Error = Error;

    async fn await_completion(
        &self,
        session_id: &str,
        timeout: Duration,
    ) -> std::result::Result<Completion, Self::Error> {
        SessionStore::await_completion(self, session_id, timeout).await?;
        Ok(Completion {
            session_id: session_id.to_string(),
            token: session_id.to_string(),
        })
    }
}
