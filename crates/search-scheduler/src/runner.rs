//! Background tick loop with start/stop lifecycle.
//!
//! A runner owns at most one loop task. `start` spawns it, `stop` cancels
//! it and waits for it to exit within the configured timeout.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use search_indexing::{EventProcessor, Halt, TickError, TickSummary};

use crate::{RunnerConfig, RunnerError};

/// Handle of the running loop task.
struct RunnerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    /// Set once `stop` has signalled cancellation
    stopping: bool,
}

/// Runs [`EventProcessor`] ticks until stopped or halted by a fatal error.
pub struct LifecycleRunner {
    processor: Arc<EventProcessor>,
    config: RunnerConfig,
    handle: Mutex<Option<RunnerHandle>>,
}

impl LifecycleRunner {
    pub fn new(processor: Arc<EventProcessor>, config: RunnerConfig) -> Self {
        Self {
            processor,
            config,
            handle: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Spawn the loop task.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::AlreadyRunning` while a previous loop task is
    /// alive, including one a timed-out `stop` is still waiting on.
    pub async fn start(&self) -> Result<(), RunnerError> {
        let mut handle = self.handle.lock().await;
        if handle.as_ref().is_some_and(|h| !h.task.is_finished()) {
            return Err(RunnerError::AlreadyRunning);
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(
            Arc::clone(&self.processor),
            self.config.tick_interval(),
            cancel.clone(),
        ));
        *handle = Some(RunnerHandle {
            cancel,
            task,
            stopping: false,
        });
        info!(
            tick_interval_ms = self.config.tick_interval_ms,
            "Lifecycle runner started"
        );
        Ok(())
    }

    /// Cancel the loop and wait for it to exit.
    ///
    /// Polls every `stop_poll_interval` for at most `stop_timeout`. On
    /// timeout the handle is kept, so a later `start` still refuses and a
    /// later `stop` reports `AlreadyStopping` until the task finishes.
    ///
    /// # Errors
    ///
    /// - `RunnerError::NotRunning` if no loop is alive
    /// - `RunnerError::AlreadyStopping` if an earlier stop timed out
    /// - `RunnerError::StopTimeout` if the loop did not exit in time
    pub async fn stop(&self) -> Result<(), RunnerError> {
        {
            let mut guard = self.handle.lock().await;
            let Some(handle) = guard.as_mut() else {
                return Err(RunnerError::NotRunning);
            };
            if handle.task.is_finished() {
                let stopping = handle.stopping;
                *guard = None;
                return if stopping {
                    info!("Lifecycle runner stopped");
                    Ok(())
                } else {
                    Err(RunnerError::NotRunning)
                };
            }
            if handle.stopping {
                return Err(RunnerError::AlreadyStopping);
            }
            handle.stopping = true;
            handle.cancel.cancel();
        }
        info!("Stopping lifecycle runner");

        let timeout = self.config.stop_timeout();
        let deadline = Instant::now() + timeout;
        loop {
            if self.reap().await {
                info!("Lifecycle runner stopped");
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!(
                    timeout_secs = timeout.as_secs(),
                    "Lifecycle runner did not stop in time"
                );
                return Err(RunnerError::StopTimeout(timeout));
            }
            tokio::time::sleep(self.config.stop_poll_interval()).await;
        }
    }

    /// Whether a loop task is alive.
    pub async fn is_running(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.task.is_finished())
    }

    /// Drop the handle if its task has exited.
    async fn reap(&self) -> bool {
        let mut guard = self.handle.lock().await;
        match guard.as_ref() {
            Some(handle) if !handle.task.is_finished() => false,
            _ => {
                if let Some(handle) = guard.take() {
                    if let Err(e) = handle.task.await {
                        error!(error = %e, "Lifecycle runner task panicked");
                    }
                }
                true
            }
        }
    }
}

async fn run_loop(processor: Arc<EventProcessor>, tick_interval: Duration, cancel: CancellationToken) {
    let mut total = TickSummary::new();
    loop {
        match processor.perform_one_tick(&cancel).await {
            Ok(summary) => {
                if summary.has_work() {
                    info!(
                        parents = summary.parents,
                        succeeded = summary.succeeded,
                        failed = summary.failed,
                        skipped = summary.skipped,
                        "Tick complete"
                    );
                } else {
                    debug!("No due events");
                }
                total.merge(&summary);
            }
            Err(TickError::Halted(Halt::Fatal(e))) => {
                error!(error = %e, "Fatal error, halting indexer");
                break;
            }
            Err(TickError::Halted(Halt::Cancelled)) => break,
            Err(TickError::Queue(e)) => {
                error!(error = %e, "Error reading or updating the event queue");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(tick_interval) => {}
        }
    }
    info!(
        parents = total.parents,
        succeeded = total.succeeded,
        failed = total.failed,
        skipped = total.skipped,
        "Lifecycle runner loop exited"
    );
}
