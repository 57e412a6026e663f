//! Configuration system for tweetstore.
//!
//! Provides layered configuration from multiple sources:
//!
//! 1. **Compiled defaults** - Sensible defaults built into the binary
//! 2. **User config file** - `~/.config/tweetstore/config.toml`
//! 3. **Environment variables** - `TWEETSTORE_*` prefix
//! 4. **CLI arguments** - Highest priority, always wins
//!
//! # Example Configuration File
//!
//! ```toml
//! [paths]
//! db = "~/.local/share/tweetstore/tweetstore.db"
//!
//! [ingest]
//! save_retweets = false
//!
//! [time]
//! use_tz = true
//! zone = "UTC"
//!
//! [output]
//! format = "text"
//! colors = true
//! ```

use crate::error::{Result, TweetStoreError};
use crate::timestamp::TimeMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure for tweetstore.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path-related configuration.
    pub paths: PathsConfig,
    /// Ingestion behavior.
    pub ingest: IngestConfig,
    /// Timezone handling for stored timestamps.
    pub time: TimeConfig,
    /// Output formatting configuration.
    pub output: OutputConfig,
}

/// Path configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Path to the `SQLite` database file.
    /// Environment variable: `TWEETSTORE_DB`
    pub db: Option<PathBuf>,
}

/// Ingestion behavior configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Store retweets instead of skipping them.
    /// Environment variable: `TWEETSTORE_SAVE_RETWEETS`
    pub save_retweets: bool,
}

/// Timezone configuration. Read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// Attach a zone to stored timestamps. When false, times are stored naive.
    /// Environment variable: `TWEETSTORE_USE_TZ`
    pub use_tz: bool,

    /// Zone attached to parsed times: `UTC`, `Z` or a `±HH:MM` offset.
    /// Environment variable: `TWEETSTORE_TIME_ZONE`
    pub zone: String,
}

/// Output formatting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format: text, json, json-pretty.
    pub format: String,

    /// Enable colored output.
    pub colors: bool,

    /// Suppress non-essential output (progress spinners, etc.).
    pub quiet: bool,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            use_tz: true,
            zone: "UTC".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
            colors: true,
            quiet: false,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. User config file (~/.config/tweetstore/config.toml)
    /// 3. Compiled defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the user config file cannot be read or parsed, or
    /// if a boolean environment variable holds something other than a boolean.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(user_config) = Self::load_user_config()? {
            config.merge(user_config);
        }

        config.apply_overrides(|var| std::env::var(var).ok())?;

        debug!("Configuration loaded: {:?}", config);
        Ok(config)
    }

    /// Load configuration from a specific file. A missing file is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `PathError` if the file exists but cannot be read, and
    /// `ConfigError` if it is not valid TOML for this schema.
    pub fn load_from_file(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            debug!("Config file not found: {}", path.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| TweetStoreError::path_error("read", path, e))?;
        let config = toml::from_str(&content).map_err(|e| TweetStoreError::ConfigError {
            path: path.to_path_buf(),
            reason: e.message().to_string(),
        })?;
        info!("Loaded config from: {}", path.display());
        Ok(Some(config))
    }

    fn load_user_config() -> Result<Option<Self>> {
        match Self::user_config_path() {
            Some(path) => Self::load_from_file(&path),
            None => Ok(None),
        }
    }

    /// Get the path to the user configuration file.
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("tweetstore").join("config.toml"))
    }

    /// Apply `TWEETSTORE_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(db) = lookup("TWEETSTORE_DB") {
            self.paths.db = Some(PathBuf::from(db));
        }

        if let Some(value) = lookup("TWEETSTORE_SAVE_RETWEETS") {
            self.ingest.save_retweets = env_bool("TWEETSTORE_SAVE_RETWEETS", &value)?;
        }

        if let Some(value) = lookup("TWEETSTORE_USE_TZ") {
            self.time.use_tz = env_bool("TWEETSTORE_USE_TZ", &value)?;
        }
        if let Some(zone) = lookup("TWEETSTORE_TIME_ZONE") {
            self.time.zone = zone;
        }

        if let Some(format) = lookup("TWEETSTORE_FORMAT") {
            self.output.format = format;
        }
        if lookup("TWEETSTORE_NO_COLOR").is_some() || lookup("NO_COLOR").is_some() {
            self.output.colors = false;
        }
        if lookup("TWEETSTORE_QUIET").is_some() {
            self.output.quiet = true;
        }
        Ok(())
    }

    /// Merge another config into this one (other takes precedence).
    fn merge(&mut self, other: Self) {
        if other.paths.db.is_some() {
            self.paths.db = other.paths.db;
        }

        self.ingest.save_retweets = other.ingest.save_retweets;

        self.time.use_tz = other.time.use_tz;
        self.time.zone = other.time.zone;

        self.output.format = other.output.format;
        self.output.colors = other.output.colors;
        self.output.quiet = other.output.quiet;
    }

    /// Get the database path, using defaults if not configured.
    pub fn db_path(&self) -> PathBuf {
        self.paths
            .db
            .clone()
            .unwrap_or_else(crate::default_db_path)
    }

    /// The timezone mode handed to the normalizer.
    ///
    /// # Errors
    ///
    /// Returns an error if `time.zone` is not a recognised zone.
    pub fn time_mode(&self) -> Result<TimeMode> {
        TimeMode::from_settings(self.time.use_tz, &self.time.zone)
    }

    /// Generate a default configuration file content.
    #[must_use]
    pub fn default_config_content() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn env_bool(var: &str, value: &str) -> Result<bool> {
    parse_bool(value).ok_or_else(|| TweetStoreError::EnvVarError {
        var: var.to_string(),
        reason: format!("expected a boolean, found '{value}'"),
    })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
