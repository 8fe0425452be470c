//! Runner configuration.
//!
//! Intervals of the tick loop and of the stop handshake.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use search_types::RunnerSettings;

/// Configuration for the lifecycle runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Sleep between two ticks, in milliseconds.
    /// Defaults to 1000.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// How often `stop` checks whether the loop has exited, in milliseconds.
    /// Defaults to 100.
    #[serde(default = "default_stop_poll_interval_ms")]
    pub stop_poll_interval_ms: u64,

    /// How long `stop` waits before reporting a timeout, in seconds.
    /// Defaults to 60.
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

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            stop_poll_interval_ms: default_stop_poll_interval_ms(),
            stop_timeout_secs: default_stop_timeout_secs(),
        }
    }
}

impl RunnerConfig {
    pub fn from_settings(settings: &RunnerSettings) -> Self {
        Self {
            tick_interval_ms: settings.tick_interval_ms,
            stop_poll_interval_ms: settings.stop_poll_interval_ms,
            stop_timeout_secs: settings.stop_timeout_secs,
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_stop_poll_interval(mut self, interval: Duration) -> Self {
        self.stop_poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout_secs = timeout.as_secs();
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn stop_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stop_poll_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}
