//! API endpoint implementations.

mod auth;
mod health;

pub use auth::AuthApi;
pub use health::HealthApi;
