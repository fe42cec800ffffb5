//! TOML configuration file loading
//!
//! Supports `~/.config/homelink/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// Store configuration
    #[serde(default)]
    pub database: DatabaseFileConfig,

    /// Identity and binding cache configuration
    #[serde(default)]
    pub cache: CacheFileConfig,

    /// Tenant used when a command names none
    #[serde(default)]
    pub domain: Option<String>,
}

/// Store configuration
#[derive(Debug, Default, Deserialize)]
pub struct DatabaseFileConfig {
    /// Path to the `SQLite` database file
    pub path: Option<String>,

    /// Maximum pooled connections
    pub pool_size: Option<u32>,
}

/// Cache configuration
#[derive(Debug, Default, Deserialize)]
pub struct CacheFileConfig {
    pub enabled: Option<bool>,
    pub warehouse_capacity: Option<usize>,
    pub binding_capacity: Option<usize>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ConfigFile {
    config_file_path().map_or_else(ConfigFile::default, |path| load_from(&path))
}

/// Load a config file from an explicit path, falling back to defaults
pub fn load_from(path: &Path) -> ConfigFile {
    if !path.exists() {
        return ConfigFile::default();
    }

    match read_config_file(path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            ConfigFile::default()
        }
    }
}

/// Read and parse a config file
///
/// # Errors
///
/// Returns `Io` if the file cannot be read, `Toml` if it does not parse
pub fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Return the config file path: `~/.config/homelink/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("homelink").join("config.toml"))
}
