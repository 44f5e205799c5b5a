//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [relay]      # OAuth relay server
//! [overlay]    # click-through arbiter
//! [client]     # desktop login via the relay
//! [logging]    # log files
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VeilConfig {
    /// Relay server configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay: Option<RelaySection>,

    /// Overlay window configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay: Option<OverlaySection>,

    /// Relay client configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientSection>,

    /// Log file configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingSection>,
}

impl VeilConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced whole, matching how a project file shadows the
    /// user file.
    pub fn merge(&mut self, other: VeilConfig) {
        if other.relay.is_some() {
            self.relay = other.relay;
        }
        if other.overlay.is_some() {
            self.overlay = other.overlay;
        }
        if other.client.is_some() {
            self.client = other.client;
        }
        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Relay section, or defaults.
    pub fn relay(&self) -> RelaySection {
        self.relay.clone().unwrap_or_default()
    }

    /// Overlay section, or defaults.
    pub fn overlay(&self) -> OverlaySection {
        self.overlay.clone().unwrap_or_default()
    }

    /// Client section, or defaults.
    pub fn client(&self) -> ClientSection {
        self.client.clone().unwrap_or_default()
    }

    /// Logging section, or defaults.
    pub fn logging(&self) -> LoggingSection {
        self.logging.clone().unwrap_or_default()
    }

    /// Check every present section.
    pub fn validate(&self) -> Result<()> {
        if let Some(relay) = &self.relay {
            relay.validate()?;
        }
        if let Some(overlay) = &self.overlay {
            overlay.validate()?;
        }
        if let Some(client) = &self.client {
            client.validate()?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Relay
// ─────────────────────────────────────────────────────────────────────────────

/// `[relay]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySection {
    /// Address to bind to.
    pub bind: String,
    /// Externally reachable URL of the relay.
    pub public_base_url: String,
    /// Base URL of the identity layer (`/api/auth/*`).
    pub auth_base_url: String,
    /// Deep link used when `init` omits one.
    pub default_callback_url: String,
    /// Relay session lifetime in seconds.
    pub session_max_age_secs: u64,
    /// Interval between expiry sweeps in seconds.
    pub sweep_interval_secs: u64,
    /// Delete a relay session once its credentials were read.
    pub single_use_tokens: bool,
    /// `init` requests per minute, relay-wide.
    pub init_rpm: u32,
    /// Enable `init` rate limiting.
    pub rate_limiting: bool,
    /// Enable request logging.
    pub request_logging: bool,
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3001".to_string(),
            public_base_url: "http://localhost:3001".to_string(),
            auth_base_url: "http://localhost:3001".to_string(),
            default_callback_url: "myapp://callback".to_string(),
            session_max_age_secs: 600,
            sweep_interval_secs: 300,
            single_use_tokens: false,
            init_rpm: 60,
            rate_limiting: true,
            request_logging: true,
        }
    }
}

impl RelaySection {
    /// Parsed bind address.
    pub fn bind_address(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .map_err(|e| ConfigError::invalid("relay.bind", format!("{}", e)))
    }

    /// Session lifetime.
    pub fn session_max_age(&self) -> Duration {
        Duration::from_secs(self.session_max_age_secs)
    }

    /// Sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    fn validate(&self) -> Result<()> {
        self.bind_address()?;
        check_http_url("relay.public_base_url", &self.public_base_url)?;
        check_http_url("relay.auth_base_url", &self.auth_base_url)?;
        if self.default_callback_url.trim().is_empty() {
            return Err(ConfigError::invalid(
                "relay.default_callback_url",
                "must not be empty",
            ));
        }
        if self.session_max_age_secs == 0 {
            return Err(ConfigError::invalid(
                "relay.session_max_age_secs",
                "must be positive",
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "relay.sweep_interval_secs",
                "must be positive",
            ));
        }
        if self.rate_limiting && self.init_rpm == 0 {
            return Err(ConfigError::invalid(
                "relay.init_rpm",
                "must be positive when rate limiting is on",
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Overlay
// ─────────────────────────────────────────────────────────────────────────────

/// `[overlay]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySection {
    /// Coalescing window for click-through toggles, in milliseconds.
    pub debounce_ms: u64,
}

impl Default for OverlaySection {
    fn default() -> Self {
        Self { debounce_ms: 10 }
    }
}

impl OverlaySection {
    /// Debounce window.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.debounce_ms > 1000 {
            return Err(ConfigError::invalid(
                "overlay.debounce_ms",
                "must be at most 1000",
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// `[client]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSection {
    /// Relay to log in through.
    pub relay_url: String,
    /// First delay between status polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Upper bound of the poll delay, in milliseconds.
    pub max_poll_interval_ms: u64,
    /// Give up waiting for the browser after this many seconds.
    pub login_timeout_secs: u64,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            relay_url: "http://localhost:3001".to_string(),
            poll_interval_ms: 1000,
            max_poll_interval_ms: 5000,
            login_timeout_secs: 300,
        }
    }
}

impl ClientSection {
    /// First poll delay.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Maximum poll delay.
    pub fn max_poll_interval(&self) -> Duration {
        Duration::from_millis(self.max_poll_interval_ms)
    }

    /// Login timeout.
    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        check_http_url("client.relay_url", &self.relay_url)?;
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "client.poll_interval_ms",
                "must be positive",
            ));
        }
        if self.max_poll_interval_ms < self.poll_interval_ms {
            return Err(ConfigError::invalid(
                "client.max_poll_interval_ms",
                "must not be below poll_interval_ms",
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Write JSON logs to a daily rolling file.
    pub file: bool,
    /// Log directory. Defaults to `<config dir>/logs`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            file: true,
            directory: None,
        }
    }
}

fn check_http_url(field: &str, value: &str) -> Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, "must be an http(s) URL"))
    }
}
