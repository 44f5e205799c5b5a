//! OAuth relay for desktop clients.
//!
//! A desktop shell cannot receive a browser redirect, so it asks the relay
//! to open a short-lived session, sends the user to the provider, and polls
//! until the provider's redirect has landed here.
//!
//! # Endpoints
//!
//! - `POST /proxy/auth/init` opens a relay session and returns the sign-in URL
//! - `GET /proxy/auth/callback?session=` is the provider's redirect target
//! - `GET /proxy/auth/status/{id}` reports `pending` or `complete`
//! - `POST /proxy/api/session` exchanges the token for the session payload
//! - `OPTIONS /proxy/*` answers CORS preflights
//! - `GET /health`
//!
//! # Example
//!
//! ```ignore
//! use veil_relay::{RelayConfig, RelayServer};
//!
//! let config = RelayConfig::new()
//!     .with_bind_address("127.0.0.1:3001".parse()?)
//!     .with_public_base_url("https://relay.example.com");
//!
//! RelayServer::new(config).run().await?;
//! ```

pub mod ambient;
pub mod config;
pub mod cors;
pub mod error;
pub mod ratelimit;
pub mod routes;
pub mod state;

pub use ambient::{AmbientSessionResolver, NoAmbientSession, UpstreamSessionResolver};
pub use config::RelayConfig;
pub use error::{ErrorResponse, RelayError, Result};
pub use ratelimit::{init_rate_limit_middleware, request_logging_middleware};
pub use routes::{InitResponse, StatusResponse};
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;

use axum::{Router, middleware};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The relay HTTP server.
pub struct RelayServer {
    state: AppState,
}

impl RelayServer {
    /// Create a server with an in-memory store and no ambient sessions.
    pub fn new(config: RelayConfig) -> Self {
        Self {
            state: AppState::new(config),
        }
    }

    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Shared application state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(routes::health_routes())
            .nest("/proxy", self.proxy_routes())
            // Request logging (inner layer, runs first)
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                ratelimit::request_logging_middleware,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Routes under `/proxy`, all wrapped in CORS.
    fn proxy_routes(&self) -> Router<AppState> {
        use axum::routing::{get, post};

        Router::new()
            .route(
                "/auth/init",
                post(routes::init_handler).layer(middleware::from_fn_with_state(
                    self.state.clone(),
                    ratelimit::init_rate_limit_middleware,
                )),
            )
            .route("/auth/callback", get(routes::callback_handler))
            .route("/auth/status/{session_id}", get(routes::status_handler))
            .route("/api/session", post(routes::session_handler))
            .layer(middleware::from_fn(cors::cors_middleware))
    }

    /// Run the server on the configured address.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        self.run_on(addr).await
    }

    /// Run the server on a specific address (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        self.run_with_shutdown(addr, std::future::pending()).await
    }

    /// Run until `shutdown` resolves, then stop the sweep task.
    pub async fn run_with_shutdown(
        self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| RelayError::Internal(format!("Failed to bind: {}", e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| RelayError::Internal(format!("Failed to read address: {}", e)))?;

        let store = self.state.store.clone();
        store.start();
        info!(addr = %local_addr, "Starting relay server");

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| RelayError::Internal(format!("Server error: {}", e)));

        store.stop();
        info!("Relay server stopped");
        result
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }
}
