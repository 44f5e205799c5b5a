//! Configuration for Veil.
//!
//! Layered TOML: the user config directory, then a project `veil.toml`,
//! then `VEIL_*` environment variables. Command-line flags sit on top and
//! are applied by the binary.

mod discovery;
mod env;
mod error;
mod types;

pub use discovery::{
    CONFIG_DIR_ENV, ConfigSource, LoadOptions, LoadedConfig, config_dir, config_path,
    load_config, load_config_file, load_config_with_options, log_dir, save_config,
};
pub use env::{
    AUTH_BASE_URL_ENV, PUBLIC_BASE_URL_ENV, RELAY_BIND_ENV, RELAY_URL_ENV, apply_env_overrides,
    apply_overrides_from,
};
pub use error::{ConfigError, Result};
pub use types::{ClientSection, LoggingSection, OverlaySection, RelaySection, VeilConfig};
