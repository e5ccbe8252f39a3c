//! Configuration types for ObjDir
//!
//! This module defines configuration structures used across components.
//! Every section deserializes from TOML with per-field defaults, so a
//! config file only needs to name the options it overrides.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration for ObjDir
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory existence cache
    pub cache: DirCacheConfig,
    /// Object metadata cache
    pub meta_cache: MetaCacheConfig,
    /// Insert coalescing
    pub coalesce: CoalesceConfig,
    /// Background worker
    pub worker: WorkerConfig,
    /// Backing store
    pub store: StoreConfig,
    /// Logging
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| Error::configuration(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject values that would make a component unusable
    pub fn validate(&self) -> Result<()> {
        if self.coalesce.max_batch_size == 0 {
            return Err(Error::configuration("coalesce.max_batch_size must be > 0"));
        }
        if self.cache.hot_max_entries == 0 || self.cache.warm_max_entries == 0 {
            return Err(Error::configuration("cache tier sizes must be > 0"));
        }
        if self.cache.promotion_threshold == 0 {
            return Err(Error::configuration(
                "cache.promotion_threshold must be > 0",
            ));
        }
        if self.meta_cache.max_entries == 0 {
            return Err(Error::configuration("meta_cache.max_entries must be > 0"));
        }
        Ok(())
    }
}

/// Directory existence cache (two-tier warm/hot LRU)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DirCacheConfig {
    /// Cache enabled
    pub enabled: bool,
    /// Maximum entries in the hot tier
    pub hot_max_entries: usize,
    /// Hot entry time-to-live in seconds (0 = never expire)
    pub hot_ttl_secs: u64,
    /// Promotion counter distance before a hot hit re-touches its LRU slot.
    /// Defaults to half the hot tier size when unset.
    pub hot_touch_window: Option<u64>,
    /// Maximum entries in the warm tier
    pub warm_max_entries: usize,
    /// Observations needed before a warm entry is promoted to hot
    pub promotion_threshold: u64,
}

impl Default for DirCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hot_max_entries: 10_000,
            hot_ttl_secs: 3600,
            hot_touch_window: None,
            warm_max_entries: 50_000,
            promotion_threshold: 5,
        }
    }
}

impl DirCacheConfig {
    /// Hot entry time-to-live
    pub const fn hot_ttl(&self) -> Duration {
        Duration::from_secs(self.hot_ttl_secs)
    }

    /// Effective re-touch window for hot hits
    pub fn touch_window(&self) -> u64 {
        self.hot_touch_window
            .unwrap_or(self.hot_max_entries as u64 / 2)
    }
}

/// Object metadata cache (single-tier LRU with expiry)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaCacheConfig {
    /// Cache enabled
    pub enabled: bool,
    /// Maximum cached objects
    pub max_entries: usize,
    /// Entry time-to-live in seconds (0 = never expire)
    pub ttl_secs: u64,
}

impl Default for MetaCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10_000,
            ttl_secs: 600,
        }
    }
}

impl MetaCacheConfig {
    /// Entry time-to-live
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Insert coalescing scheduler
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CoalesceConfig {
    /// Quiescence window in milliseconds
    pub window_ms: u64,
    /// Batch size that forces an immediate flush
    pub max_batch_size: usize,
}

impl Default for CoalesceConfig {
    fn default() -> Self {
        Self {
            window_ms: 100,
            max_batch_size: 128,
        }
    }
}

impl CoalesceConfig {
    /// Coalescing window
    pub const fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Background worker
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Worker thread name
    pub thread_name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            thread_name: "objdir-worker".to_string(),
        }
    }
}

/// Backing store
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file for the persistent store
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./objdir.redb"),
        }
    }
}

/// Logging
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.cache.enabled);
        assert_eq!(config.cache.promotion_threshold, 5);
        assert_eq!(config.cache.touch_window(), 5_000);
        assert_eq!(config.coalesce.window(), Duration::from_millis(100));
        assert_eq!(config.coalesce.max_batch_size, 128);
        assert_eq!(config.worker.thread_name, "objdir-worker");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [coalesce]
            window_ms = 25

            [cache]
            hot_touch_window = 3
            promotion_threshold = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.coalesce.window_ms, 25);
        assert_eq!(config.coalesce.max_batch_size, 128);
        assert_eq!(config.cache.promotion_threshold, 2);
        assert_eq!(config.cache.touch_window(), 3);
        assert_eq!(config.cache.hot_max_entries, 10_000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let err = Config::from_toml_str("[coalesce]\nmax_batch_size = 0\n").unwrap_err();
        assert!(err.is_caller_error());

        let err = Config::from_toml_str("[cache]\npromotion_threshold = 0\n").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(Config::from_toml_str("[cache\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[store]\npath = \"/tmp/dirs.redb\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.store.path, PathBuf::from("/tmp/dirs.redb"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/objdir.toml").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
