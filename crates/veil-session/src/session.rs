//! The relay session record.

use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created by `init`, provider has not redirected back yet.
    Pending,
    /// Provider callback received, credentials attached.
    Complete,
    /// Older than the retention window.
    Expired,
}

/// Server-held record bridging one OAuth attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxySession {
    /// Opaque random identifier, also used as the client's token.
    pub session_id: String,

    /// Identity provider requested by the client.
    pub provider: String,

    /// Where the desktop client wants to land after login.
    pub callback_url: String,

    /// When `init` created the session.
    pub created_at: DateTime<Utc>,

    /// Set once the provider redirected back.
    pub callback_received: bool,

    /// When the callback arrived.
    #[serde(default)]
    pub callback_received_at: Option<DateTime<Utc>>,

    /// Authenticated session payload, present iff `callback_received`.
    #[serde(default)]
    pub session_data: Option<serde_json::Value>,
}

impl ProxySession {
    /// Create a pending session with a fresh id.
    pub fn new(provider: impl Into<String>, callback_url: impl Into<String>) -> Self {
        Self {
            session_id: generate_session_id(),
            provider: provider.into(),
            callback_url: callback_url.into(),
            created_at: Utc::now(),
            callback_received: false,
            callback_received_at: None,
            session_data: None,
        }
    }

    /// Override the id (imports, tests).
    pub fn with_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Override the creation time.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Mark the callback as received and attach the credentials.
    ///
    /// Both fields change together so a completed session always carries data.
    pub fn complete(&mut self, session_data: serde_json::Value) {
        self.callback_received = true;
        self.callback_received_at = Some(Utc::now());
        self.session_data = Some(session_data);
    }

    /// Whether the session is older than `max_age` at `now`.
    ///
    /// A creation time in the future never counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        (now - self.created_at)
            .to_std()
            .map(|age| age > max_age)
            .unwrap_or(false)
    }

    /// Derived lifecycle state at `now`.
    pub fn state_at(&self, now: DateTime<Utc>, max_age: Duration) -> SessionState {
        if self.is_expired_at(now, max_age) {
            SessionState::Expired
        } else if self.callback_received && self.session_data.is_some() {
            SessionState::Complete
        } else {
            SessionState::Pending
        }
    }
}

/// Generate an opaque session id (32 random bytes, URL-safe base64).
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Shorten an id for log output.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}
