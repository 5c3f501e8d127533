//! Store configuration.
//!
//! [`StoreConfig`] carries the data directory, cache and flush bounds, and the
//! flush schedule. It can be built programmatically or loaded by layering
//! defaults, an optional TOML file, and `PHS_*` environment variables.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use phs_core::constants::{
    DEFAULT_FLUSH_INITIAL_DELAY_SECS, DEFAULT_FLUSH_INTERVAL_SECS, DEFAULT_MAX_CACHE_BYTES,
    DEFAULT_MAX_SINGLE_FLUSH_SIZE,
};

/// Prefix of environment variables that override file settings.
pub const ENV_PREFIX: &str = "PHS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config: {0}")] Load(#[from] config::ConfigError),
    #[error("invalid config: {0}")] Invalid(String),
}

/// Configuration for a proven header store instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory for persistent data.
    pub data_dir: PathBuf,
    /// Memory budget of the header cache, in bytes.
    pub max_cache_bytes: usize,
    /// Maximum number of pending headers persisted by one flush.
    pub max_single_flush_size: usize,
    /// Seconds between background flushes.
    pub flush_interval_secs: u64,
    /// Seconds before the first background flush.
    pub flush_initial_delay_secs: u64,
    /// Log level filter string (e.g. "info", "phs_store=debug").
    pub log_level: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("phs");

        Self {
            data_dir,
            max_cache_bytes: DEFAULT_MAX_CACHE_BYTES,
            max_single_flush_size: DEFAULT_MAX_SINGLE_FLUSH_SIZE,
            flush_interval_secs: DEFAULT_FLUSH_INTERVAL_SECS,
            flush_initial_delay_secs: DEFAULT_FLUSH_INITIAL_DELAY_SECS,
            log_level: "info".to_string(),
        }
    }
}

impl StoreConfig {
    /// Load defaults, then `path` (if given), then `PHS_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// Like [`load`](Self::load), reading overrides from `env` instead of the
    /// process environment when it is `Some`.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let defaults = config::Config::try_from(&StoreConfig::default())?;
        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(env),
        );

        let cfg: StoreConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject bounds the store cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_single_flush_size == 0 {
            return Err(ConfigError::Invalid(
                "max_single_flush_size must be at least 1".into(),
            ));
        }
        if self.flush_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "flush_interval_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Path to the RocksDB proven header database.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("provenheaders")
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn flush_initial_delay(&self) -> Duration {
        Duration::from_secs(self.flush_initial_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn no_env() -> Option<HashMap<String, String>> {
        Some(HashMap::new())
    }

    #[test]
    fn defaults() {
        let cfg = StoreConfig::default();
        assert_eq!(cfg.max_cache_bytes, DEFAULT_MAX_CACHE_BYTES);
        assert_eq!(cfg.max_single_flush_size, DEFAULT_MAX_SINGLE_FLUSH_SIZE);
        assert_eq!(cfg.flush_interval(), Duration::from_secs(DEFAULT_FLUSH_INTERVAL_SECS));
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.data_dir.ends_with("phs"), "data_dir: {:?}", cfg.data_dir);
    }

    #[test]
    fn db_path_appends_provenheaders() {
        let cfg = StoreConfig {
            data_dir: PathBuf::from("/tmp/phs-test"),
            ..StoreConfig::default()
        };
        assert_eq!(cfg.db_path(), PathBuf::from("/tmp/phs-test/provenheaders"));
    }

    #[test]
    fn load_without_sources_is_default() {
        let cfg = StoreConfig::load_with_env(None, no_env()).unwrap();
        assert_eq!(cfg, StoreConfig::default());
    }

    #[test]
    fn load_reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phs.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "max_cache_bytes = 4096").unwrap();
        writeln!(file, "flush_interval_secs = 5").unwrap();
        writeln!(file, "data_dir = \"/var/lib/phs\"").unwrap();
        drop(file);

        let cfg = StoreConfig::load_with_env(Some(&path), no_env()).unwrap();
        assert_eq!(cfg.max_cache_bytes, 4096);
        assert_eq!(cfg.flush_interval_secs, 5);
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/phs"));
        assert_eq!(cfg.max_single_flush_size, DEFAULT_MAX_SINGLE_FLUSH_SIZE);
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phs.toml");
        std::fs::write(&path, "max_single_flush_size = 10\n").unwrap();

        let mut env = HashMap::new();
        env.insert("PHS_MAX_SINGLE_FLUSH_SIZE".to_string(), "25".to_string());
        let cfg = StoreConfig::load_with_env(Some(&path), Some(env)).unwrap();
        assert_eq!(cfg.max_single_flush_size, 25);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = StoreConfig::load_with_env(Some(Path::new("/nonexistent/phs.toml")), no_env())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn zero_flush_size_rejected() {
        let cfg = StoreConfig {
            max_single_flush_size: 0,
            ..StoreConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_interval_rejected() {
        let cfg = StoreConfig {
            flush_interval_secs: 0,
            ..StoreConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
