//! Configuration for the session store, the reaper and logging.
//!
//! Loaded from a TOML file; every field has a default so a missing file or
//! a partial file is valid.
//!
//! # Example Configuration
//!
//! ```toml
//! [store]
//! path = "/var/lib/app/sessions.db"
//! namespace = "sessions"
//! default_max_age_secs = 86400
//!
//! [reaper]
//! enabled = true
//! batch_size = 1000
//! check_interval_secs = 10
//!
//! [logging]
//! format = "json"
//! level = "info"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_CHECK_INTERVAL, DEFAULT_DB_PATH, DEFAULT_MAX_AGE_SECS,
    DEFAULT_NAMESPACE,
};
use crate::logging::LogFormat;
use crate::reaper::ReaperOptions;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Session store settings.
    pub store: StoreConfig,
    /// Background reaper settings.
    pub reaper: ReaperConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Session store settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file.
    pub path: PathBuf,
    /// Namespace (redb table) holding the records.
    pub namespace: String,
    /// Lifetime applied by `save_default`.
    pub default_max_age_secs: i64,
}

/// Background reaper settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReaperConfig {
    /// Start the reaper alongside the store.
    pub enabled: bool,
    /// Maximum records examined per batch.
    pub batch_size: usize,
    /// Seconds between two batches.
    pub check_interval_secs: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `pretty`, `json` or `compact`.
    pub format: LogFormat,
    /// Minimum level (`trace` .. `error`).
    pub level: String,
    /// Include thread IDs in every line.
    pub thread_ids: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_PATH),
            namespace: DEFAULT_NAMESPACE.to_string(),
            default_max_age_secs: DEFAULT_MAX_AGE_SECS,
        }
    }
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: DEFAULT_BATCH_SIZE,
            check_interval_secs: DEFAULT_CHECK_INTERVAL.as_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: "info".to_string(),
            thread_ids: false,
        }
    }
}

impl StoreConfig {
    /// Store settings for a database file, other fields defaulted.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}

impl ReaperConfig {
    /// Interval between two batches.
    pub const fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Builds reaper options for the given namespace.
    pub fn to_options(&self, namespace: &str) -> ReaperOptions {
        ReaperOptions::new()
            .with_namespace(namespace)
            .with_batch_size(self.batch_size)
            .with_check_interval(self.check_interval())
    }
}

impl LoggingConfig {
    /// The configured level, parsed.
    pub fn parsed_level(&self) -> Result<tracing::Level> {
        self.level
            .parse::<tracing::Level>()
            .with_context(|| format!("Invalid log level '{}'", self.level))
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid, returns an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(
                path = %path.display(),
                "Config not found, using defaults"
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        tracing::debug!(
            path = %path.display(),
            db = %config.store.path.display(),
            namespace = %config.store.namespace,
            batch_size = config.reaper.batch_size,
            interval_secs = config.reaper.check_interval_secs,
            "Loaded configuration"
        );

        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Validate the configuration, collecting every problem.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.store.namespace.is_empty() {
            errors.push("store.namespace cannot be empty".to_string());
        }
        if self.store.path.as_os_str().is_empty() {
            errors.push("store.path cannot be empty".to_string());
        }
        if self.reaper.batch_size == 0 {
            errors.push("reaper.batch_size must be greater than 0".to_string());
        }
        if self.reaper.check_interval_secs == 0 {
            errors.push("reaper.check_interval_secs must be greater than 0".to_string());
        }
        if self.logging.parsed_level().is_err() {
            errors.push(format!("logging.level '{}' is not a level", self.logging.level));
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}
