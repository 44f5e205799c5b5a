//! Overlay errors.

/// Result type alias for overlay operations.
pub type Result<T> = std::result::Result<T, OverlayError>;

/// Errors raised by the host window bridge.
///
/// These are logged by the arbiter and never surface to the pointer
/// handlers.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    /// The host window could not apply a click-through change.
    #[error("host bridge unavailable: {0}")]
    HostBridgeUnavailable(String),
}
