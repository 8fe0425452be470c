//! Bounded retry around external calls.
//!
//! A failed attempt is classified by [`IndexingError::kind`]:
//! retriable errors wait a fixed backoff and try again until the attempt
//! ceiling, fatal errors halt the caller, anything else is returned at once.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::{Backoff, Constant};
use search_types::RetrySettings;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::error::{ErrorKind, Halt, IndexingError};

/// Result of a retried operation.
///
/// The outer `Err` stops the tick; the inner `Err` is the final failure of
/// this operation only.
pub type Outcome<T> = Result<Result<T, IndexingError>, Halt>;

/// Fixed-interval retry with an attempt ceiling.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self::new(
            settings.max_retries,
            Duration::from_millis(settings.backoff_ms),
        )
    }

    /// Upper bound on attempts for one operation.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Start tracking attempts of one operation.
    ///
    /// Use this directly when the operation borrows state mutably and
    /// cannot be expressed as a repeatable closure.
    pub fn attempts<'a>(&self, op: &'a str) -> Attempts<'a> {
        Attempts {
            op,
            made: 0,
            max_retries: self.max_retries,
            backoff: Constant::new(self.backoff),
        }
    }

    /// Run `f` until it succeeds, fails permanently or exhausts retries.
    pub async fn run<T, F, Fut>(&self, op: &str, cancel: &CancellationToken, mut f: F) -> Outcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, IndexingError>>,
    {
        let mut attempts = self.attempts(op);
        loop {
            if cancel.is_cancelled() {
                return Err(Halt::Cancelled);
            }
            match f().await {
                Ok(value) => return Ok(Ok(value)),
                Err(e) => {
                    if let Some(last) = attempts.on_failure(e, cancel).await? {
                        return Ok(Err(last));
                    }
                }
            }
        }
    }
}

/// Attempt bookkeeping for one retried operation.
pub struct Attempts<'a> {
    op: &'a str,
    made: u32,
    max_retries: u32,
    backoff: Constant,
}

impl Attempts<'_> {
    /// Number of failed attempts so far.
    pub fn made(&self) -> u32 {
        self.made
    }

    /// Classify a failed attempt.
    ///
    /// Returns `Ok(None)` after sleeping when the caller should try again,
    /// `Ok(Some(err))` when `err` is the final outcome, and `Err` when the
    /// error is fatal or the token was cancelled during the backoff.
    pub async fn on_failure(
        &mut self,
        err: IndexingError,
        cancel: &CancellationToken,
    ) -> Result<Option<IndexingError>, Halt> {
        self.made += 1;
        match err.kind() {
            ErrorKind::Fatal => {
                error!(op = self.op, attempt = self.made, error = %err, "Fatal error");
                Err(Halt::Fatal(err))
            }
            ErrorKind::Permanent => Ok(Some(err)),
            ErrorKind::Retriable if self.made > self.max_retries => {
                error!(op = self.op, attempts = self.made, error = %err, "Retries exhausted");
                Ok(Some(err))
            }
            ErrorKind::Retriable => {
                let delay = self.backoff.next_backoff().unwrap_or_default();
                warn!(
                    op = self.op,
                    attempt = self.made,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retriable error, backing off"
                );
                tokio::select! {
                    _ = cancel.cancelled() => Err(Halt::Cancelled),
                    _ = tokio::time::sleep(delay) => Ok(None),
                }
            }
        }
    }
}
