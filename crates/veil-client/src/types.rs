//! Request and response types for the relay API.
//!
//! These types mirror the relay's wire contract (camelCase fields).

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Auth
// ─────────────────────────────────────────────────────────────────────────────

/// Request to open a relay session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitRequest {
    /// Identity provider to sign in with.
    pub provider: String,
    /// Deep link to land on after login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

/// Response of a successful init.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitResponse {
    /// URL to open in the system browser.
    pub auth_url: String,
    /// Relay session to poll.
    pub session_id: String,
}

/// Relay session status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AuthStatus {
    /// Waiting for the provider redirect.
    Pending,
    /// Login finished.
    Complete {
        /// Token for the session endpoint.
        token: String,
        /// Relay session id.
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

/// Request to exchange a token for the session payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    /// Token from a complete status.
    pub token: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Health
// ─────────────────────────────────────────────────────────────────────────────

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
}
