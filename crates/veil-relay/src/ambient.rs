//! Ambient session resolution.
//!
//! The provider redirect lands in the same browser context that holds the
//! identity layer's session cookie. An [`AmbientSessionResolver`] turns that
//! cookie into the authenticated session payload.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, header::COOKIE};
use serde_json::Value;
use tracing::debug;

use crate::error::{RelayError, Result};

/// Cookie names carrying the identity layer's session token.
pub const SESSION_COOKIE_NAMES: [&str; 2] = [
    "__Secure-next-auth.session-token",
    "next-auth.session-token",
];

/// Resolves the authenticated session attached to a request, if any.
#[async_trait]
pub trait AmbientSessionResolver: Send + Sync {
    /// Return the session payload, `None` when the request is anonymous.
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Value>>;
}

/// Resolver for deployments without a cookie-based identity layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAmbientSession;

#[async_trait]
impl AmbientSessionResolver for NoAmbientSession {
    async fn resolve(&self, _headers: &HeaderMap) -> Result<Option<Value>> {
        Ok(None)
    }
}

/// Resolves sessions by asking the identity layer's session endpoint.
#[derive(Debug, Clone)]
pub struct UpstreamSessionResolver {
    client: reqwest::Client,
    session_url: String,
}

impl UpstreamSessionResolver {
    /// Create a resolver for the identity layer at `auth_base_url`.
    pub fn new(auth_base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RelayError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            session_url: format!("{}/api/auth/session", auth_base_url.trim_end_matches('/')),
        })
    }

    /// URL the resolver queries.
    pub fn session_url(&self) -> &str {
        &self.session_url
    }
}

#[async_trait]
impl AmbientSessionResolver for UpstreamSessionResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Value>> {
        let Some(cookie) = headers.get(COOKIE).and_then(|v| v.to_str().ok()) else {
            return Ok(None);
        };
        if !has_session_cookie(cookie) {
            debug!("Request carries no identity session cookie");
            return Ok(None);
        }

        let response = self
            .client
            .get(&self.session_url)
            .header(COOKIE, cookie)
            .send()
            .await
            .map_err(|e| RelayError::Upstream(format!("Session lookup failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = %status.as_u16(), "Identity layer rejected session lookup");
            return Ok(None);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RelayError::Upstream(format!("Invalid session response: {}", e)))?;

        Ok(is_authenticated(&body).then_some(body))
    }
}

/// Whether a `Cookie` header carries one of [`SESSION_COOKIE_NAMES`].
pub fn has_session_cookie(cookie_header: &str) -> bool {
    cookie_header.split(';').any(|pair| {
        let name = pair.split('=').next().unwrap_or_default().trim();
        SESSION_COOKIE_NAMES.contains(&name)
    })
}

/// A session payload counts only if it names a user.
pub fn is_authenticated(session: &Value) -> bool {
    session.get("user").is_some_and(|user| !user.is_null())
}
