//! Configuration for the session store.

use std::time::Duration;

/// Default maximum session age (10 minutes).
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(10 * 60);

/// Default sweep interval (5 minutes).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Callback URL used when the client does not supply one.
pub const DEFAULT_CALLBACK_URL: &str = "myapp://callback";

/// Configuration for the session store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Sessions older than this are logically expired, complete or not.
    pub max_age: Duration,

    /// Interval between background sweeps.
    pub sweep_interval: Duration,

    /// Whether [`SessionStore::start`](crate::SessionStore::start) spawns the
    /// sweep task. If false, expired sessions are only hidden on read and
    /// removed by explicit `sweep` calls.
    pub enable_sweep_task: bool,

    /// Delete a relay session after its credentials are read once.
    pub single_use_tokens: bool,

    /// Callback URL stored when `init` omits one.
    pub default_callback_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_MAX_AGE,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            enable_sweep_task: true,
            single_use_tokens: false,
            default_callback_url: DEFAULT_CALLBACK_URL.to_string(),
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum session age.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Set the sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Enable or disable the background sweep task.
    pub fn with_sweep_task(mut self, enabled: bool) -> Self {
        self.enable_sweep_task = enabled;
        self
    }

    /// Enable or disable single-use relay tokens.
    pub fn with_single_use_tokens(mut self, enabled: bool) -> Self {
        self.single_use_tokens = enabled;
        self
    }

    /// Set the default callback URL.
    pub fn with_default_callback_url(mut self, url: impl Into<String>) -> Self {
        self.default_callback_url = url.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_retention_policy() {
        let config = StoreConfig::default();
        assert_eq!(config.max_age, Duration::from_secs(600));
        assert_eq!(config.sweep_interval, Duration::from_secs(300));
        assert!(config.enable_sweep_task);
        assert!(!config.single_use_tokens);
        assert_eq!(config.default_callback_url, "myapp://callback");
    }

    #[test]
    fn test_builder() {
        let config = StoreConfig::new()
            .with_max_age(Duration::from_secs(5))
            .with_sweep_interval(Duration::from_secs(1))
            .with_sweep_task(false)
            .with_single_use_tokens(true)
            .with_default_callback_url("veil://auth");

        assert_eq!(config.max_age, Duration::from_secs(5));
        assert_eq!(config.sweep_interval, Duration::from_secs(1));
        assert!(!config.enable_sweep_task);
        assert!(config.single_use_tokens);
        assert_eq!(config.default_callback_url, "veil://auth");
    }
}
