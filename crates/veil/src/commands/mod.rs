//! CLI command handlers.

pub mod config;
pub mod health;
pub mod login;
pub mod serve;

use std::path::Path;

use anyhow::Result;
use veil_client::RelayClient;
use veil_config::{ConfigSource, LoadedConfig, VeilConfig};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration and where it came from.
    pub loaded: LoadedConfig,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    pub fn config(&self) -> &VeilConfig {
        &self.loaded.config
    }

    /// Client for `relay`, or the configured relay.
    pub fn client(&self, relay: Option<&str>) -> Result<RelayClient> {
        let section = self.config().client();
        let base_url = relay.unwrap_or(&section.relay_url);
        let client = RelayClient::builder()
            .base_url(base_url)
            .poll_interval(section.poll_interval())
            .max_poll_interval(section.max_poll_interval())
            .build()?;
        Ok(client)
    }
}

/// Load an explicit config file, or discover the layered config.
pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let Some(path) = explicit else {
        return Ok(veil_config::load_config(None)?);
    };

    let mut config = veil_config::load_config_file(path)?;
    let env_overrides = veil_config::apply_env_overrides(&mut config);
    let source = ConfigSource {
        path: path.to_path_buf(),
        loaded: true,
    };
    Ok(LoadedConfig {
        config,
        sources: vec![source.clone()],
        source: Some(source),
        env_overrides,
        warnings: Vec::new(),
    })
}
