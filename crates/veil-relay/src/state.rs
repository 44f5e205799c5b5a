//! Application state shared across handlers.

use std::sync::Arc;

use veil_session::SessionStore;

use crate::ambient::{AmbientSessionResolver, NoAmbientSession};
use crate::config::RelayConfig;
use crate::ratelimit::{SharedRateLimiter, create_rate_limiter};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Relay configuration.
    pub config: Arc<RelayConfig>,

    /// Relay session store.
    pub store: SessionStore,

    /// Resolves the browser's authenticated session on callback.
    pub ambient: Arc<dyn AmbientSessionResolver>,

    /// Relay-wide limiter for `init`.
    pub init_limiter: SharedRateLimiter,
}

impl AppState {
    /// Create state with an in-memory store and no ambient sessions.
    pub fn new(config: RelayConfig) -> Self {
        let store = SessionStore::in_memory(config.store.clone());
        let init_limiter = create_rate_limiter(config.init_rpm);
        Self {
            config: Arc::new(config),
            store,
            ambient: Arc::new(NoAmbientSession),
            init_limiter,
        }
    }

    /// Use a specific session store.
    pub fn with_store(mut self, store: SessionStore) -> Self {
        self.store = store;
        self
    }

    /// Use a specific ambient session resolver.
    pub fn with_ambient_resolver(mut self, resolver: impl AmbientSessionResolver + 'static) -> Self {
        self.ambient = Arc::new(resolver);
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
