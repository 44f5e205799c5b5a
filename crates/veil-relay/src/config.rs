//! Relay server configuration.

use std::net::{Ipv4Addr, SocketAddr};

use veil_session::StoreConfig;

/// Default bind address (localhost:3001).
pub const DEFAULT_BIND_ADDRESS: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::LOCALHOST), 3001);

/// Default base URL for both the relay and the identity layer.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";

/// Default `init` quota per minute.
pub const DEFAULT_INIT_RPM: u32 = 60;

/// Relay server configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Externally reachable base URL of this relay. The provider redirects
    /// the browser to `{public_base_url}/proxy/auth/callback`.
    pub public_base_url: String,

    /// Base URL of the identity layer serving `/api/auth/*`.
    pub auth_base_url: String,

    /// Enable rate limiting of `init`.
    pub rate_limiting: bool,

    /// Rate limit: `init` requests per minute, relay-wide.
    pub init_rpm: u32,

    /// Enable request logging.
    pub request_logging: bool,

    /// Session retention and token policy.
    pub store: StoreConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS,
            public_base_url: DEFAULT_BASE_URL.to_string(),
            auth_base_url: DEFAULT_BASE_URL.to_string(),
            rate_limiting: true,
            init_rpm: DEFAULT_INIT_RPM,
            request_logging: true,
            store: StoreConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Set the public base URL. A trailing slash is dropped.
    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = trim_base(url.into());
        self
    }

    /// Set the identity layer base URL. A trailing slash is dropped.
    pub fn with_auth_base_url(mut self, url: impl Into<String>) -> Self {
        self.auth_base_url = trim_base(url.into());
        self
    }

    /// Enable or disable rate limiting.
    pub fn with_rate_limiting(mut self, enabled: bool) -> Self {
        self.rate_limiting = enabled;
        self
    }

    /// Set the `init` quota per minute.
    pub fn with_init_rpm(mut self, rpm: u32) -> Self {
        self.init_rpm = rpm;
        self
    }

    /// Enable or disable request logging.
    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }

    /// Set the session store configuration.
    pub fn with_store_config(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// URL the provider redirects back to for `session_id`.
    pub fn callback_url_for(&self, session_id: &str) -> String {
        format!(
            "{}/proxy/auth/callback?session={}",
            self.public_base_url,
            urlencoding::encode(session_id)
        )
    }

    /// Provider sign-in URL that returns to the relay callback.
    pub fn auth_url_for(&self, provider: &str, session_id: &str) -> String {
        format!(
            "{}/api/auth/signin/{}?callbackUrl={}",
            self.auth_base_url,
            urlencoding::encode(provider),
            urlencoding::encode(&self.callback_url_for(session_id))
        )
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
