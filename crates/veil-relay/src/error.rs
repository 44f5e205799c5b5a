//! Error types for the relay.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message returned for unknown or expired relay sessions.
pub const SESSION_GONE: &str = "Session not found or expired";

const INTERNAL_MESSAGE: &str = "Internal server error";

/// Relay error type.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Missing or malformed request fields.
    #[error("{0}")]
    InvalidRequest(String),

    /// Unknown or expired session.
    #[error("{0}")]
    NotFound(String),

    /// No valid authenticated session could be resolved.
    #[error("{0}")]
    Unauthorized(String),

    /// `init` quota exhausted.
    #[error("Rate limit exceeded")]
    RateLimited {
        /// Seconds until a request would be admitted.
        retry_after_secs: u64,
    },

    /// Unexpected failure. The message is logged, never returned.
    #[error("Internal error: {0}")]
    Internal(String),

    /// The identity layer could not be reached or answered garbage.
    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl From<veil_session::Error> for RelayError {
    fn from(e: veil_session::Error) -> Self {
        if e.is_gone() {
            RelayError::NotFound(SESSION_GONE.to_string())
        } else {
            RelayError::Internal(e.to_string())
        }
    }
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}

impl RelayError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::NotFound(_) => StatusCode::NOT_FOUND,
            RelayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            RelayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            RelayError::Internal(_) | RelayError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show a caller.
    pub fn public_message(&self) -> String {
        match self {
            RelayError::Internal(_) | RelayError::Upstream(_) => INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.to_string();

        match &self {
            RelayError::Internal(_) | RelayError::Upstream(_) => {
                tracing::error!(status = %status, error = %detail, "Relay error");
            }
            _ => {
                tracing::warn!(status = %status, error = %detail, "Client error");
            }
        }

        let body = Json(ErrorResponse {
            error: self.public_message(),
        });

        match self {
            RelayError::RateLimited { retry_after_secs } => {
                let mut response = (status, body).into_response();
                if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                    response.headers_mut().insert(RETRY_AFTER, value);
                }
                response
            }
            _ => (status, body).into_response(),
        }
    }
}
