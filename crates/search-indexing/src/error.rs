//! Error types for the indexing pipeline.
//!
//! Every failure carries an [`ErrorKind`] tag that the retry policy and the
//! tick processor inspect to decide between retrying, skipping the event or
//! halting the runner.

use search_types::{Guid, ModelError, StorageCode};
use thiserror::Error;

/// Classification of an [`IndexingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transient failure, eligible for bounded retry
    Retriable,
    /// Unrecoverable, halts the runner
    Fatal,
    /// Abandon the affected event without retrying
    Permanent,
}

/// Errors that can occur in the indexing pipeline
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Transient collaborator failure (network, contention)
    #[error("Retriable error: {0}")]
    Retriable(String),

    /// Collaborator reported an unrecoverable failure
    #[error("Fatal error: {0}")]
    Fatal(String),

    #[error("Unsupported event kind: {0}")]
    UnsupportedEventKind(String),

    #[error("No event handler registered for storage code {0}")]
    NoHandler(StorageCode),

    /// A global type name that should be registered is not
    #[error("Unknown object type: {0}")]
    UnknownType(String),

    #[error("Empty reference path")]
    EmptyReferencePath,

    /// Malformed source data
    #[error("Parse error: {0}")]
    Parse(String),

    /// Event lacks a payload its kind requires
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Reference path to {guid} exceeds depth {depth}")]
    ReferenceDepth { guid: Guid, depth: usize },

    /// Scratch file could not be created
    #[error("Temp file error: {0}")]
    TempFile(#[from] std::io::Error),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

impl IndexingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IndexingError::Retriable(_) | IndexingError::TempFile(_) => ErrorKind::Retriable,
            IndexingError::Fatal(_)
            | IndexingError::UnsupportedEventKind(_)
            | IndexingError::NoHandler(_)
            | IndexingError::UnknownType(_)
            | IndexingError::EmptyReferencePath => ErrorKind::Fatal,
            IndexingError::Parse(_)
            | IndexingError::InvalidEvent(_)
            | IndexingError::ReferenceDepth { .. }
            | IndexingError::Model(_) => ErrorKind::Permanent,
        }
    }

    pub fn is_retriable(&self) -> bool {
        self.kind() == ErrorKind::Retriable
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }
}

impl From<serde_json::Error> for IndexingError {
    fn from(err: serde_json::Error) -> Self {
        IndexingError::Parse(err.to_string())
    }
}

/// Reason a tick stopped before draining the queue.
#[derive(Error, Debug)]
pub enum Halt {
    /// A fatal error; the runner must stop
    #[error("Fatal: {0}")]
    Fatal(IndexingError),

    /// The runner asked to stop
    #[error("Cancelled")]
    Cancelled,
}

/// Failure of one whole tick.
#[derive(Error, Debug)]
pub enum TickError {
    #[error("Tick halted: {0}")]
    Halted(#[from] Halt),

    /// Reading or marking the event queue failed; the next tick retries
    #[error("Queue error: {0}")]
    Queue(IndexingError),
}

impl TickError {
    /// Whether the runner must exit its loop.
    pub fn is_halt(&self) -> bool {
        matches!(self, TickError::Halted(_))
    }
}
