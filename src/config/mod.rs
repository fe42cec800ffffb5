//! Configuration management for homelink

pub mod file;

use std::path::PathBuf;

use crate::{Error, Result};

/// Default pooled connections for a file-backed store
pub const DEFAULT_POOL_SIZE: u32 = 8;

/// Default identities kept in the warehouse cache
pub const DEFAULT_WAREHOUSE_CACHE: usize = 100_000;

/// Default bindings kept in the binding cache
pub const DEFAULT_BINDING_CACHE: usize = 10_000;

/// Homelink configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the `SQLite` database file
    pub database_path: PathBuf,

    /// Maximum pooled connections
    pub pool_size: u32,

    /// Warehouse cache capacity
    pub warehouse_cache_capacity: usize,

    /// Binding cache capacity
    pub binding_cache_capacity: usize,

    /// Serve identity and binding reads through the caches
    pub cache_enabled: bool,

    /// Tenant used when a command names none
    pub default_domain: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_data_dir().join("homelink.db"),
            pool_size: DEFAULT_POOL_SIZE,
            warehouse_cache_capacity: DEFAULT_WAREHOUSE_CACHE,
            binding_cache_capacity: DEFAULT_BINDING_CACHE,
            cache_enabled: true,
            default_domain: None,
        }
    }
}

/// Data directory (`~/.local/share/homelink` on Linux)
fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("homelink"))
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if an environment override cannot be parsed
    pub fn load() -> Result<Self> {
        Self::from_file(file::load_config_file())
    }

    /// Load configuration with an explicit TOML file (env > file > default)
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or an
    /// environment override is invalid
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        Self::from_file(file::read_config_file(path)?)
    }

    /// Resolve configuration from a parsed file plus the environment
    ///
    /// # Errors
    ///
    /// Returns error if an environment override cannot be parsed or a
    /// capacity is zero
    pub fn from_file(fc: file::ConfigFile) -> Result<Self> {
        let defaults = Self::default();

        let database_path = std::env::var("HOMELINK_DATABASE")
            .ok()
            .or(fc.database.path)
            .map_or(defaults.database_path, PathBuf::from);

        let pool_size = env_parse::<u32>("HOMELINK_POOL_SIZE")?
            .or(fc.database.pool_size)
            .unwrap_or(defaults.pool_size);

        let warehouse_cache_capacity = env_parse::<usize>("HOMELINK_WAREHOUSE_CACHE")?
            .or(fc.cache.warehouse_capacity)
            .unwrap_or(defaults.warehouse_cache_capacity);

        let binding_cache_capacity = env_parse::<usize>("HOMELINK_BINDING_CACHE")?
            .or(fc.cache.binding_capacity)
            .unwrap_or(defaults.binding_cache_capacity);

        let cache_enabled = std::env::var("HOMELINK_CACHE_ENABLED")
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .or(fc.cache.enabled)
            .unwrap_or(defaults.cache_enabled);

        let default_domain = std::env::var("HOMELINK_DOMAIN").ok().or(fc.domain);

        let config = Self {
            database_path,
            pool_size,
            warehouse_cache_capacity,
            binding_cache_capacity,
            cache_enabled,
            default_domain,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `Config` error for a zero pool size or cache capacity
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::Config("pool size must be positive".to_string()));
        }
        if self.warehouse_cache_capacity == 0 || self.binding_cache_capacity == 0 {
            return Err(Error::Config("cache capacity must be positive".to_string()));
        }
        Ok(())
    }

    /// Ensure the database directory exists
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn ensure_data_dir(&self) -> Result<()> {
        if let Some(parent) = self.database_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{key} has invalid value {raw:?}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert!(config.cache_enabled);
        assert!(config.database_path.ends_with("homelink.db"));
    }

    #[test]
    fn zero_capacity_rejected() {
        let config = Config {
            binding_cache_capacity: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
