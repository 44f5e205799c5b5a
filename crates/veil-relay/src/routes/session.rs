//! Credential hand-off endpoint.

use axum::{Json, extract::State, http::HeaderMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use veil_session::short_id;

use crate::error::{RelayError, Result};
use crate::state::AppState;

/// Body of `POST /proxy/api/session`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionRequest {
    /// Token from a completed status poll.
    #[serde(default)]
    pub token: Option<String>,
}

/// `POST /proxy/api/session`: exchange a relay token for the session payload.
///
/// A completed relay session wins; otherwise the caller's own cookie session
/// is tried. With single-use tokens the relay session is deleted on success.
pub async fn session_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>> {
    let request: SessionRequest = serde_json::from_str(&body)
        .map_err(|e| RelayError::InvalidRequest(format!("Invalid JSON: {}", e)))?;

    let token = request
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| RelayError::Unauthorized("No token provided".to_string()))?;

    match state.store.consume(&token).await {
        Ok(Some(data)) => {
            debug!(session_id = %short_id(&token), "Handed off relay credentials");
            return Ok(Json(data));
        }
        Ok(None) => {
            debug!(session_id = %short_id(&token), "Relay session still pending");
        }
        Err(e) if e.is_gone() => {}
        Err(e) => return Err(e.into()),
    }

    state
        .ambient
        .resolve(&headers)
        .await?
        .map(Json)
        .ok_or_else(|| RelayError::Unauthorized("Invalid session".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RelayConfig, RelayServer};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::json;
    use tower::ServiceExt;
    use veil_session::StoreConfig;

    fn state(single_use: bool) -> AppState {
        AppState::new(
            RelayConfig::new()
                .with_rate_limiting(false)
                .with_request_logging(false)
                .with_store_config(StoreConfig::new().with_single_use_tokens(single_use)),
        )
    }

    async fn post_session(state: &AppState, body: &str) -> (StatusCode, Value) {
        let app = RelayServer::from_state(state.clone()).router();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/proxy/api/session")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_completed_token_returns_payload() {
        let state = state(false);
        let session = state.store.create("google", None).await.unwrap();
        let payload = json!({"user": {"email": "x@y.com"}, "expires": "2030-01-01"});
        state
            .store
            .complete(&session.session_id, payload.clone())
            .await
            .unwrap();

        let body = json!({"token": session.session_id}).to_string();
        let (status, value) = post_session(&state, &body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value, payload);

        // Multi-use by default.
        let (status, _) = post_session(&state, &body).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_single_use_token() {
        let state = state(true);
        let session = state.store.create("google", None).await.unwrap();
        state
            .store
            .complete(&session.session_id, json!({"user": {}}))
            .await
            .unwrap();

        let body = json!({"token": session.session_id}).to_string();
        let (status, _) = post_session(&state, &body).await;
        assert_eq!(status, StatusCode::OK);

        let (status, value) = post_session(&state, &body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(value, json!({"error": "Invalid session"}));
    }

    #[tokio::test]
    async fn test_missing_token() {
        let (status, value) = post_session(&state(false), "{}").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(value, json!({"error": "No token provided"}));
    }

    #[tokio::test]
    async fn test_pending_token_without_ambient() {
        let state = state(false);
        let session = state.store.create("google", None).await.unwrap();
        let body = json!({"token": session.session_id}).to_string();

        let (status, _) = post_session(&state, &body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let (status, _) = post_session(&state(false), "token=abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
