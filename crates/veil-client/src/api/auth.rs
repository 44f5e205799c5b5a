//! Login relay API.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use veil_session::{AuthorizationWaiter, Completion, short_id};

use crate::client::RelayClient;
use crate::error::{Error, Result};
use crate::types::{AuthStatus, InitRequest, InitResponse, SessionRequest};

/// Login relay API client.
pub struct AuthApi {
    client: RelayClient,
}

impl AuthApi {
    pub(crate) fn new(client: RelayClient) -> Self {
        Self { client }
    }

    /// Open a relay session for `provider`.
    pub async fn init(&self, provider: &str, callback_url: Option<&str>) -> Result<InitResponse> {
        let request = InitRequest {
            provider: provider.to_string(),
            callback_url: callback_url.map(str::to_string),
        };
        self.client.post("auth/init", &request).await
    }

    /// Poll a relay session once.
    pub async fn status(&self, session_id: &str) -> Result<AuthStatus> {
        self.client
            .get(&format!("auth/status/{}", urlencode_segment(session_id)))
            .await
    }

    /// Exchange a token for the authenticated session payload.
    pub async fn session(&self, token: &str) -> Result<Value> {
        let request = SessionRequest {
            token: token.to_string(),
        };
        self.client.post("api/session", &request).await
    }

    /// Poll until the session completes.
    ///
    /// Pending answers and transient failures keep polling, with the delay
    /// doubling up to the configured maximum. A 404 after at least one
    /// pending answer means the session expired and maps to
    /// [`Error::Expired`].
    pub async fn await_completion(&self, session_id: &str, timeout: Duration) -> Result<Completion> {
        tokio::time::timeout(timeout, self.poll(session_id))
            .await
            .map_err(|_| Error::Timeout(short_id(session_id).to_string()))?
    }

    async fn poll(&self, session_id: &str) -> Result<Completion> {
        let inner = self.client.inner();
        let mut delay = inner.poll_interval;
        let mut seen_pending = false;

        loop {
            match self.status(session_id).await {
                Ok(AuthStatus::Complete { token, session_id }) => {
                    debug!(session_id = %short_id(&session_id), "Relay login complete");
                    return Ok(Completion { session_id, token });
                }
                Ok(AuthStatus::Pending) => seen_pending = true,
                Err(e) if e.is_not_found() && seen_pending => {
                    return Err(Error::Expired(short_id(session_id).to_string()));
                }
                Err(e) if e.is_transient() => {
                    warn!(error = %e, "Relay status poll failed, retrying");
                }
                Err(e) => return Err(e),
            }

            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(inner.max_poll_interval);
        }
    }
}

#[async_trait]
impl AuthorizationWaiter for RelayClient {
    type Error = Error;

    async fn await_completion(
        &self,
        session_id: &str,
        timeout: Duration,
    ) -> std::result::Result<Completion, Self::Error> {
        self.auth().await_completion(session_id, timeout).await
    }
}

/// Percent-encode one path segment. Spaces become `%20`, never `+`.
fn urlencode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urlencode_segment() {
        assert_eq!(urlencode_segment("abc-_DEF"), "abc-_DEF");
        assert_eq!(urlencode_segment("a/b"), "a%2Fb");
        assert_eq!(urlencode_segment("a b"), "a%20b");
        assert_eq!(urlencode_segment("a+b"), "a%2Bb");
        assert_eq!(urlencode_segment("a?b#c"), "a%3Fb%23c");
    }
}
