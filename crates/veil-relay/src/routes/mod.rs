//! Relay routes.

pub mod auth;
pub mod health;
pub mod session;

pub use auth::{
    CallbackParams, InitRequest, InitResponse, StatusResponse, callback_handler, init_handler,
    status_handler,
};
pub use health::{HealthResponse, health_routes};
pub use session::{SessionRequest, session_handler};
