//! OAuth relay endpoints: init, provider callback, status polling.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use veil_session::short_id;

use crate::error::{RelayError, Result};
use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Body of `POST /proxy/auth/init`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitRequest {
    /// Identity provider to sign in with.
    #[serde(default)]
    pub provider: Option<String>,
    /// Deep link the desktop client wants to land on.
    #[serde(default)]
    pub callback_url: Option<String>,
}

/// Response of `POST /proxy/auth/init`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitResponse {
    /// URL to open in the system browser.
    pub auth_url: String,
    /// Relay session id to poll.
    pub session_id: String,
}

/// Query of `GET /proxy/auth/callback`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    /// Relay session id.
    #[serde(default)]
    pub session: Option<String>,
}

/// Response of `GET /proxy/auth/status/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StatusResponse {
    /// Provider has not redirected back yet.
    Pending,
    /// Credentials are ready; present `token` to the session endpoint.
    Complete {
        /// Token for `POST /proxy/api/session`.
        token: String,
        /// Relay session id.
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// `POST /proxy/auth/init`: open a pending relay session.
pub async fn init_handler(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<InitResponse>> {
    let request: InitRequest = serde_json::from_str(&body)
        .map_err(|e| RelayError::InvalidRequest(format!("Invalid JSON: {}", e)))?;

    let provider = request
        .provider
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| RelayError::InvalidRequest("Provider is required".to_string()))?;

    let session = state
        .store
        .create(provider, request.callback_url.as_deref())
        .await?;

    info!(
        session_id = %short_id(&session.session_id),
        provider = %provider,
        "Relay login started"
    );

    Ok(Json(InitResponse {
        auth_url: state.config.auth_url_for(provider, &session.session_id),
        session_id: session.session_id,
    }))
}

/// `GET /proxy/auth/callback?session=`: the provider's redirect target.
///
/// Attaches the browser's authenticated session to the relay session and
/// hands the user back to the desktop app via its deep link.
pub async fn callback_handler(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Result<Response> {
    let session_id = params
        .session
        .filter(|id| !id.is_empty())
        .ok_or_else(|| RelayError::InvalidRequest("No session ID provided".to_string()))?;

    let session = state.store.get(&session_id).await?;

    let ambient = state
        .ambient
        .resolve(&headers)
        .await?
        .ok_or_else(|| RelayError::Unauthorized("Authentication failed".to_string()))?;

    let session = state.store.complete(&session_id, ambient).await?;
    let user = session.session_data.as_ref().and_then(|data| data.get("user"));
    let link = deep_link(&session.callback_url, &session_id, user);

    debug!(session_id = %short_id(&session_id), "Serving deep link page");

    Ok((
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        render_callback_page(&link),
    )
        .into_response())
}

/// `GET /proxy/auth/status/{id}`: poll a relay session.
pub async fn status_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<StatusResponse>> {
    let session = state.store.get(&session_id).await?;

    let status = if session.callback_received && session.session_data.is_some() {
        StatusResponse::Complete {
            token: session.session_id.clone(),
            session_id: session.session_id,
        }
    } else {
        StatusResponse::Pending
    };

    Ok(Json(status))
}

// ─────────────────────────────────────────────────────────────────────────────
// Deep link page
// ─────────────────────────────────────────────────────────────────────────────

/// Build the desktop deep link carrying the token and basic user fields.
pub fn deep_link(callback_url: &str, session_id: &str, user: Option<&Value>) -> String {
    let field = |name: &str| {
        user.and_then(|u| u.get(name))
            .and_then(Value::as_str)
            .unwrap_or_default()
    };
    let separator = if callback_url.contains('?') { '&' } else { '?' };

    format!(
        "{}{}token={}&sessionId={}&email={}&name={}",
        callback_url,
        separator,
        urlencoding::encode(session_id),
        urlencoding::encode(session_id),
        urlencoding::encode(field("email")),
        urlencoding::encode(field("name")),
    )
}

const CALLBACK_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Authentication Complete</title>
    <style>
      body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
             display: flex; justify-content: center; align-items: center;
             min-height: 100vh; margin: 0; background: #1f2937; }
      .card { background: white; padding: 2rem; border-radius: 8px;
              text-align: center; max-width: 400px; }
    </style>
  </head>
  <body>
    <div class="card">
      <h2>Authentication Successful</h2>
      <p id="status">Redirecting to the app...</p>
    </div>
    <script>
      const deepLink = __DEEP_LINK__;
      window.location.href = deepLink;
      setTimeout(function () {
        document.getElementById('status').textContent =
          'You can return to the application and close this window.';
      }, 2000);
    </script>
  </body>
</html>
"#;

/// Render the page that forwards the browser to `link`.
pub fn render_callback_page(link: &str) -> String {
    // A JSON string literal is a valid JS literal; "</" must not close the script.
    let literal = serde_json::to_string(link)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace("</", "<\\/");
    CALLBACK_PAGE.replace("__DEEP_LINK__", &literal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ambient::AmbientSessionResolver;
    use crate::{RelayConfig, RelayServer};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::json;
    use tower::ServiceExt;

    /// Resolver that always returns a fixed user.
    struct FixedUser(Value);

    #[async_trait]
    impl AmbientSessionResolver for FixedUser {
        async fn resolve(&self, _headers: &HeaderMap) -> crate::Result<Option<Value>> {
            Ok(Some(self.0.clone()))
        }
    }

    fn config() -> RelayConfig {
        RelayConfig::new()
            .with_public_base_url("https://relay.example.com")
            .with_auth_base_url("https://relay.example.com")
            .with_rate_limiting(false)
            .with_request_logging(false)
    }

    fn state_with_user() -> AppState {
        AppState::new(config()).with_ambient_resolver(FixedUser(json!({
            "user": {"email": "ada@example.com", "name": "Ada L"}
        })))
    }

    async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, String) {
        let app = RelayServer::from_state(state.clone()).router();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_init_returns_auth_url() {
        let state = state_with_user();
        let (status, body) = send(
            &state,
            post_json("/proxy/auth/init", r#"{"provider":"google"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let init: InitResponse = serde_json::from_str(&body).unwrap();
        assert!(!init.session_id.is_empty());
        assert_eq!(
            init.auth_url,
            format!(
                "https://relay.example.com/api/auth/signin/google?callbackUrl=\
                 https%3A%2F%2Frelay.example.com%2Fproxy%2Fauth%2Fcallback%3Fsession%3D{}",
                init.session_id
            )
        );

        let stored = state.store.get(&init.session_id).await.unwrap();
        assert_eq!(stored.callback_url, "myapp://callback");
    }

    #[tokio::test]
    async fn test_init_keeps_callback_url() {
        let state = state_with_user();
        let (_, body) = send(
            &state,
            post_json(
                "/proxy/auth/init",
                r#"{"provider":"github","callbackUrl":"veil://auth"}"#,
            ),
        )
        .await;

        let init: InitResponse = serde_json::from_str(&body).unwrap();
        let stored = state.store.get(&init.session_id).await.unwrap();
        assert_eq!(stored.callback_url, "veil://auth");
        assert_eq!(stored.provider, "github");
    }

    #[tokio::test]
    async fn test_init_requires_provider() {
        let state = state_with_user();
        let (status, body) = send(&state, post_json("/proxy/auth/init", "{}")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            serde_json::from_str::<Value>(&body).unwrap(),
            json!({"error": "Provider is required"})
        );
        assert_eq!(state.store.stats().await.unwrap().sessions, 0);
    }

    #[tokio::test]
    async fn test_init_rejects_malformed_body() {
        let state = state_with_user();
        let (status, _) = send(&state, post_json("/proxy/auth/init", "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_status_unknown_is_404() {
        let state = state_with_user();
        let (status, body) = send(&state, get("/proxy/auth/status/does-not-exist")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            serde_json::from_str::<Value>(&body).unwrap(),
            json!({"error": "Session not found or expired"})
        );
    }

    #[tokio::test]
    async fn test_status_pending_then_complete() {
        let state = state_with_user();
        let session = state.store.create("google", None).await.unwrap();
        let uri = format!("/proxy/auth/status/{}", session.session_id);

        let (status, body) = send(&state, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            serde_json::from_str::<Value>(&body).unwrap(),
            json!({"status": "pending"})
        );

        state
            .store
            .complete(&session.session_id, json!({"user": {}}))
            .await
            .unwrap();

        let (_, body) = send(&state, get(&uri)).await;
        assert_eq!(
            serde_json::from_str::<Value>(&body).unwrap(),
            json!({
                "status": "complete",
                "token": session.session_id,
                "sessionId": session.session_id,
            })
        );
    }

    #[tokio::test]
    async fn test_callback_completes_session() {
        let state = state_with_user();
        let session = state.store.create("google", None).await.unwrap();

        let (status, body) = send(
            &state,
            get(&format!("/proxy/auth/callback?session={}", session.session_id)),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("myapp://callback?token="));
        assert!(body.contains("email=ada%40example.com"));
        assert!(body.contains("name=Ada%20L"));

        let stored = state.store.get(&session.session_id).await.unwrap();
        assert!(stored.callback_received);
        assert_eq!(stored.session_data.unwrap()["user"]["name"], "Ada L");
    }

    #[tokio::test]
    async fn test_callback_without_session_param() {
        let state = state_with_user();
        let (status, body) = send(&state, get("/proxy/auth/callback")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("No session ID provided"));
    }

    #[tokio::test]
    async fn test_callback_unknown_session() {
        let state = state_with_user();
        let (status, _) = send(&state, get("/proxy/auth/callback?session=nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_callback_without_ambient_session() {
        let state = AppState::new(config());
        let session = state.store.create("google", None).await.unwrap();

        let (status, body) = send(
            &state,
            get(&format!("/proxy/auth/callback?session={}", session.session_id)),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Authentication failed"));
        let stored = state.store.get(&session.session_id).await.unwrap();
        assert!(!stored.callback_received);
    }

    #[test]
    fn test_deep_link() {
        let user = json!({"email": "a+b@example.com", "name": "A B"});
        assert_eq!(
            deep_link("myapp://callback", "id1", Some(&user)),
            "myapp://callback?token=id1&sessionId=id1&email=a%2Bb%40example.com&name=A%20B"
        );
        assert_eq!(
            deep_link("myapp://cb?x=1", "id1", None),
            "myapp://cb?x=1&token=id1&sessionId=id1&email=&name="
        );
    }

    #[test]
    fn test_callback_page_escapes_script_close() {
        let page = render_callback_page("myapp://x?name=</script><b>");
        assert!(!page.contains("</script><b>"));
        assert!(page.contains(r#""myapp://x?name=<\/script><b>""#));
    }
}
