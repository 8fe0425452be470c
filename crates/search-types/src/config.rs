//! Configuration loading for the search indexer.
//!
//! Layered config: defaults -> default config file -> explicit config file -> env vars.
//! The default config file lives at `<config dir>/search-indexer/config.*`.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ModelError;

/// Bounded retry around external calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed wait between attempts (ms)
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_ms() -> u64 {
    1000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

/// Background loop timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerSettings {
    /// Sleep between ticks (ms)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// How often `stop` checks for loop termination (ms)
    #[serde(default = "default_stop_poll_interval_ms")]
    pub stop_poll_interval_ms: u64,

    /// Give up waiting for the loop after this long
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_stop_poll_interval_ms() -> u64 {
    100
}

fn default_stop_timeout_secs() -> u64 {
    60
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            stop_poll_interval_ms: default_stop_poll_interval_ms(),
            stop_timeout_secs: default_stop_timeout_secs(),
        }
    }
}

/// Main indexer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Scratch directory for loaded object data
    #[serde(default = "default_temp_dir")]
    pub temp_dir: String,

    /// Events read from the queue per storage code per tick
    #[serde(default = "default_event_batch_size")]
    pub event_batch_size: usize,

    /// Longest reference path followed while resolving references
    #[serde(default = "default_max_reference_depth")]
    pub max_reference_depth: usize,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub runner: RunnerSettings,
}

fn default_temp_dir() -> String {
    ProjectDirs::from("", "", "search-indexer")
        .map(|p| p.cache_dir().join("tmp"))
        .unwrap_or_else(|| std::env::temp_dir().join("search-indexer"))
        .to_string_lossy()
        .to_string()
}

fn default_event_batch_size() -> usize {
    1000
}

fn default_max_reference_depth() -> usize {
    64
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            event_batch_size: default_event_batch_size(),
            max_reference_depth: default_max_reference_depth(),
            retry: RetrySettings::default(),
            runner: RunnerSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Default config file (`<config dir>/search-indexer/config.*`)
    /// 3. Explicit config file (optional)
    /// 4. Environment variables (`SEARCH_*`, nested keys joined by `__`)
    pub fn load(config_path: Option<&str>) -> Result<Self, ModelError> {
        let config_dir = ProjectDirs::from("", "", "search-indexer")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("temp_dir", default_temp_dir())
            .map_err(|e| ModelError::Config(e.to_string()))?
            .set_default("event_batch_size", default_event_batch_size() as i64)
            .map_err(|e| ModelError::Config(e.to_string()))?
            .set_default("max_reference_depth", default_max_reference_depth() as i64)
            .map_err(|e| ModelError::Config(e.to_string()))?
            .set_default("retry.max_retries", default_max_retries() as i64)
            .map_err(|e| ModelError::Config(e.to_string()))?
            .set_default("retry.backoff_ms", default_backoff_ms() as i64)
            .map_err(|e| ModelError::Config(e.to_string()))?
            .set_default("runner.tick_interval_ms", default_tick_interval_ms() as i64)
            .map_err(|e| ModelError::Config(e.to_string()))?
            .set_default(
                "runner.stop_poll_interval_ms",
                default_stop_poll_interval_ms() as i64,
            )
            .map_err(|e| ModelError::Config(e.to_string()))?
            .set_default("runner.stop_timeout_secs", default_stop_timeout_secs() as i64)
            .map_err(|e| ModelError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // SEARCH_EVENT_BATCH_SIZE, SEARCH_RETRY__MAX_RETRIES, ...
        builder = builder.add_source(
            Environment::with_prefix("SEARCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| ModelError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| ModelError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the indexer cannot run with.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.max_reference_depth == 0 {
            return Err(ModelError::Config(
                "max_reference_depth must be > 0".to_string(),
            ));
        }
        if self.retry.backoff_ms == 0 {
            return Err(ModelError::Config("retry.backoff_ms must be > 0".to_string()));
        }
        if self.runner.tick_interval_ms == 0 || self.runner.stop_poll_interval_ms == 0 {
            return Err(ModelError::Config(
                "runner intervals must be > 0".to_string(),
            ));
        }
        if self.runner.stop_timeout_secs == 0 {
            return Err(ModelError::Config(
                "runner.stop_timeout_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn temp_dir_path(&self) -> PathBuf {
        PathBuf::from(&self.temp_dir)
    }
}
