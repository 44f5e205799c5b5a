//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/veil/config.toml` (user config)
//! 2. `./veil.toml` (project-local)
//! 3. `VEIL_*` environment variables
//! 4. CLI arguments (handled externally)

use std::path::{Path, PathBuf};

use crate::env::apply_overrides_from;
use crate::{ConfigError, Result, VeilConfig};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "veil.toml";

/// Default config filename within the user config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for directory resolution.
const APP_NAME: &str = "veil";

/// Environment variable to override the config directory.
pub const CONFIG_DIR_ENV: &str = "VEIL_CONFIG_DIR";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file.
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: VeilConfig,
    /// Sources that were checked, in order of precedence (lowest first).
    pub sources: Vec<ConfigSource>,
    /// Primary source file (first successfully loaded), for save operations.
    pub source: Option<ConfigSource>,
    /// Environment variables that overrode file values.
    pub env_overrides: Vec<&'static str>,
    /// Warnings generated during loading.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Get paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Options for [`load_config_with_options`].
pub struct LoadOptions<'a> {
    /// Directory holding `veil.toml`. Defaults to the working directory.
    pub project_dir: Option<&'a Path>,
    /// User config directory. Overrides `VEIL_CONFIG_DIR` and the platform default.
    pub config_dir: Option<&'a Path>,
    /// Environment lookup.
    pub env: &'a dyn Fn(&str) -> Option<String>,
}

impl Default for LoadOptions<'_> {
    fn default() -> Self {
        Self {
            project_dir: None,
            config_dir: None,
            env: &process_env,
        }
    }
}

/// Load configuration by discovering and merging all config layers.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(LoadOptions {
        project_dir,
        ..Default::default()
    })
}

/// Load configuration with explicit control over directories and environment.
pub fn load_config_with_options(options: LoadOptions<'_>) -> Result<LoadedConfig> {
    let mut config = VeilConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    // 1. User config: explicit dir, then env var, then platform default
    let user_dir = match options.config_dir {
        Some(dir) => Some(dir.to_path_buf()),
        None => resolve_config_dir(options.env),
    };
    if let Some(dir) = user_dir {
        let source = load_layer(&mut config, &dir.join(USER_CONFIG_FILE), &mut warnings);
        sources.push(source);
    }

    // 2. Project-local config
    let project_path = options
        .project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    let source = load_layer(&mut config, &project_path, &mut warnings);
    sources.push(source);

    // 3. Environment
    let env_overrides = apply_overrides_from(&mut config, options.env);

    check_insecure_urls(&config, &mut warnings);

    let source = sources.iter().find(|s| s.loaded).cloned();

    Ok(LoadedConfig {
        config,
        sources,
        source,
        env_overrides,
        warnings,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<VeilConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    VeilConfig::from_toml(&contents)
}

/// Save configuration to a file.
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &VeilConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = config.to_toml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

/// User config directory.
///
/// `VEIL_CONFIG_DIR` first, then the platform default
/// (`~/.config/veil` on Linux, `~/Library/Application Support/veil` on macOS).
pub fn config_dir() -> Option<PathBuf> {
    resolve_config_dir(&process_env)
}

/// Path of the user config file.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Log directory: `[logging] directory`, else `<config dir>/logs`.
pub fn log_dir(config: &VeilConfig) -> Option<PathBuf> {
    config
        .logging()
        .directory
        .or_else(|| config_dir().map(|d| d.join("logs")))
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn resolve_config_dir(env: &dyn Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(dir) = env(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Try to load a config file and merge it into the existing config.
///
/// A file that fails to parse is skipped with a warning.
fn load_layer(config: &mut VeilConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    match load_config_file(path) {
        Ok(layer) => {
            config.merge(layer);
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            ConfigSource {
                path: path.to_path_buf(),
                loaded: false,
            }
        }
    }
}

/// Warn when session tokens would cross the network in the clear.
fn check_insecure_urls(config: &VeilConfig, warnings: &mut Vec<String>) {
    let Some(relay) = &config.relay else {
        return;
    };
    for (field, url) in [
        ("public_base_url", &relay.public_base_url),
        ("auth_base_url", &relay.auth_base_url),
    ] {
        if url.starts_with("http://") && !is_loopback_url(url) {
            warnings.push(format!(
                "[relay] {} uses plain http for a non-local host ({}). \
                 Session tokens will travel unencrypted.",
                field, url
            ));
        }
    }
}

fn is_loopback_url(url: &str) -> bool {
    let host = url
        .trim_start_matches("http://")
        .split(['/', ':'])
        .next()
        .unwrap_or_default();
    matches!(host, "localhost" | "127.0.0.1")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
