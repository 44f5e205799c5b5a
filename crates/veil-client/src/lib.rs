//! HTTP client for the Veil OAuth relay.
//!
//! Drives the desktop side of the relay login: open a relay session, send
//! the user to the returned URL, poll until the provider's redirect has
//! landed, then fetch the authenticated session.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use veil_client::{RelayClient, Result};
//!
//! # async fn example() -> Result<()> {
//! let client = RelayClient::builder()
//!     .base_url("http://localhost:3001")
//!     .poll_interval(Duration::from_millis(500))
//!     .build()?;
//!
//! if client.health().is_healthy().await {
//!     let init = client.auth().init("google", Some("myapp://callback")).await?;
//!     println!("Sign in at {}", init.auth_url);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`RelayClient`] also implements [`veil_session::AuthorizationWaiter`],
//! so callers can wait on a remote relay or an in-process store alike.

pub mod api;
pub mod client;
pub mod error;
pub mod types;

pub use client::{ClientBuilder, DEFAULT_MAX_POLL_INTERVAL, DEFAULT_POLL_INTERVAL, RelayClient};
pub use error::{Error, Result};
pub use types::*;
pub use veil_session::{AuthorizationWaiter, Completion};
