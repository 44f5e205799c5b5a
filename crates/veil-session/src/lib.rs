//! Expiring session store for the OAuth relay.
//!
//! A desktop shell cannot receive an OAuth redirect, so the relay keeps a
//! short-lived [`ProxySession`] per login attempt and the shell polls it.
//! This crate provides:
//! - The [`ProxySession`] record and its derived [`SessionState`]
//! - A [`SessionBackend`] trait so the map can live outside the process
//! - [`MemoryBackend`], the default process-local backend
//! - [`SessionStore`], which applies logical expiry on every read, runs the
//!   periodic sweep, and lets callers wait for completion without polling
//!
//! # Example
//!
//! ```rust,ignore
//! use veil_session::{SessionStore, StoreConfig};
//!
//! let store = SessionStore::in_memory(StoreConfig::default());
//! store.start();
//!
//! let session = store.create("google", None).await?;
//! store.complete(&session.session_id, serde_json::json!({"email": "x@y.com"})).await?;
//! ```

mod backend;
mod config;
mod error;
mod session;
mod store;
mod waiter;

pub use backend::{MemoryBackend, SessionBackend, SessionUpdate};
pub use config::{
    DEFAULT_CALLBACK_URL, DEFAULT_MAX_AGE, DEFAULT_SWEEP_INTERVAL, StoreConfig,
};
pub use error::{Error, Result};
pub use session::{ProxySession, SessionState, generate_session_id, short_id};
pub use store::{SessionStore, StoreStats};
pub use waiter::{AuthorizationWaiter, Completion};
