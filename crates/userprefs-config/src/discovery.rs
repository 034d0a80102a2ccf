//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/userprefs/config.toml` (user config)
//! 2. `./userprefs.toml` (project-local)

use std::path::{Path, PathBuf};

use crate::{ConfigError, PreferencesConfig, Result};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "userprefs.toml";

/// Default config filename within the user config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for config directory resolution.
const APP_NAME: &str = "userprefs";

/// Environment variable to override the user config directory.
const CONFIG_DIR_ENV: &str = "USERPREFS_CONFIG_DIR";

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
    pub config: PreferencesConfig,
    /// Sources that were checked, in order of precedence (lowest first).
    pub sources: Vec<ConfigSource>,
    /// Warnings generated during loading (e.g., unreadable layers).
    pub warnings: Vec<String>,
}

/// Load configuration by discovering and merging all config layers.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Load configuration with explicit control over the user config directory.
///
/// `config_dir` overrides both `USERPREFS_CONFIG_DIR` and the platform default.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut config = PreferencesConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    let user_config_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => user_config_path(),
    };
    if let Some(path) = user_config_path {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    // Layers validate individually; the merged result must too.
    config.validate()?;
    check_key_collisions(&config, &mut warnings);

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<PreferencesConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    PreferencesConfig::from_toml(&contents)
}

/// Path of the user-level config file.
///
/// `USERPREFS_CONFIG_DIR` wins over the platform config directory.
pub fn user_config_path() -> Option<PathBuf> {
    let dir = match std::env::var(CONFIG_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::config_dir()?.join(APP_NAME),
    };
    Some(dir.join(USER_CONFIG_FILE))
}

/// Merge the file at `path` over `config` when it exists and parses.
///
/// A broken layer is skipped with a warning so the remaining layers still
/// apply.
fn load_layer(config: &mut PreferencesConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    let loaded = path.is_file()
        && match load_config_file(path) {
            Ok(layer) => {
                config.merge(layer);
                true
            }
            Err(e) => {
                warnings.push(format!("Failed to load {}: {e}", path.display()));
                false
            }
        };

    ConfigSource {
        path: path.to_path_buf(),
        loaded,
    }
}

/// Warn about defaults that cannot be exploded without colliding.
///
/// With `a = 1` and `a.b = 2`, `a` cannot be both a scalar and an object;
/// the longer key is stored flat instead.
fn check_key_collisions(config: &PreferencesConfig, warnings: &mut Vec<String>) {
    let serialization = config.serialization();
    let Some(delimiter) = serialization.explode_delimiter() else {
        return;
    };

    for key in config.defaults.keys() {
        let mut prefix = String::new();
        for (i, segment) in key.split(delimiter).enumerate() {
            if i > 0 {
                if config.defaults.contains_key(&prefix) {
                    warnings.push(format!(
                        "default '{key}' collides with default '{prefix}' when exploded; it will be stored flat"
                    ));
                    break;
                }
                prefix.push_str(delimiter);
            }
            prefix.push_str(segment);
        }
    }
}
