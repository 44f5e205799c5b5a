//! Error types for session store operations.

/// Error type for session store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No session exists under this id.
    #[error("Session not found: {0}")]
    NotFound(String),

    /// The session exists but is older than the retention window.
    #[error("Session expired: {0}")]
    Expired(String),

    /// Error from the storage backend.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Waiting for completion took longer than allowed.
    #[error("Timed out waiting for session: {0}")]
    Timeout(String),
}

impl Error {
    /// True for errors a client should treat as "restart the flow".
    pub fn is_gone(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::Expired(_))
    }
}

/// Result type for session store operations.
pub type Result<T> = std::result::Result<T, Error>;
