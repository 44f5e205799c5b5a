//! Environment variable overrides.
//!
//! Applied after the file layers, before CLI flags.

use crate::types::VeilConfig;

/// Overrides `[relay] bind`.
pub const RELAY_BIND_ENV: &str = "VEIL_RELAY_BIND";

/// Overrides `[relay] public_base_url`.
pub const PUBLIC_BASE_URL_ENV: &str = "VEIL_PUBLIC_BASE_URL";

/// Overrides `[relay] auth_base_url`.
pub const AUTH_BASE_URL_ENV: &str = "VEIL_AUTH_BASE_URL";

/// Overrides `[client] relay_url`.
pub const RELAY_URL_ENV: &str = "VEIL_RELAY_URL";

/// Apply overrides from the process environment.
///
/// Returns the names of the variables that were applied.
pub fn apply_env_overrides(config: &mut VeilConfig) -> Vec<&'static str> {
    apply_overrides_from(config, |key| std::env::var(key).ok())
}

/// Apply overrides using a custom lookup.
///
/// Empty values are ignored.
pub fn apply_overrides_from<F>(config: &mut VeilConfig, lookup: F) -> Vec<&'static str>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let mut applied = Vec::new();

    let relay_keys = [RELAY_BIND_ENV, PUBLIC_BASE_URL_ENV, AUTH_BASE_URL_ENV];
    if relay_keys.iter().any(|k| get(k).is_some()) {
        let mut relay = config.relay();
        if let Some(v) = get(RELAY_BIND_ENV) {
            relay.bind = v;
            applied.push(RELAY_BIND_ENV);
        }
        if let Some(v) = get(PUBLIC_BASE_URL_ENV) {
            relay.public_base_url = v;
            applied.push(PUBLIC_BASE_URL_ENV);
        }
        if let Some(v) = get(AUTH_BASE_URL_ENV) {
            relay.auth_base_url = v;
            applied.push(AUTH_BASE_URL_ENV);
        }
        config.relay = Some(relay);
    }

    if let Some(v) = get(RELAY_URL_ENV) {
        let mut client = config.client();
        client.relay_url = v;
        config.client = Some(client);
        applied.push(RELAY_URL_ENV);
    }

    applied
}
