//! Error types for the scheduler crate.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by [`LifecycleRunner`](crate::LifecycleRunner) start/stop.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Runner is already running
    #[error("Runner is already running")]
    AlreadyRunning,

    /// Runner is not running
    #[error("Runner is not running")]
    NotRunning,

    /// A previous stop gave up waiting and the loop is still alive
    #[error("Runner is already stopping")]
    AlreadyStopping,

    /// The loop did not exit in time
    #[error("Runner did not stop within {0:?}")]
    StopTimeout(Duration),
}
