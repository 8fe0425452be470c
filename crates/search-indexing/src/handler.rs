//! Event source handlers: the object-store side of the pipeline.
//!
//! One handler exists per storage code. It expands parent events into
//! sub-events, loads object data and resolves cross-object references.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use search_types::{Guid, ResolvedReference, SourceData, StatusEvent, StorageCode};

use crate::error::IndexingError;

/// Lazily produced sub-events of one parent event.
#[async_trait]
pub trait SubEventSource: Send {
    /// Next sub-event, or `None` when the parent is exhausted.
    async fn next_event(&mut self) -> Result<Option<StatusEvent>, IndexingError>;
}

/// Sub-events known up front.
#[derive(Debug, Default)]
pub struct EventList {
    events: VecDeque<StatusEvent>,
}

impl EventList {
    pub fn new(events: impl IntoIterator<Item = StatusEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }

    /// The unexpanded parent event.
    pub fn single(event: StatusEvent) -> Self {
        Self::new([event])
    }
}

#[async_trait]
impl SubEventSource for EventList {
    async fn next_event(&mut self) -> Result<Option<StatusEvent>, IndexingError> {
        Ok(self.events.pop_front())
    }
}

/// Object store access for one storage code.
///
/// Implementations classify their failures: transient problems map to
/// [`IndexingError::Retriable`], misconfiguration to [`IndexingError::Fatal`].
#[async_trait]
pub trait EventHandler: Send + Sync {
    fn storage_code(&self) -> StorageCode;

    /// Expand a parent event into its sub-events.
    ///
    /// A handler with nothing to expand yields the parent event itself.
    async fn expand(&self, event: &StatusEvent) -> Result<Box<dyn SubEventSource>, IndexingError>;

    /// Load the last object of `ref_path`, reachable through the rest of the path.
    ///
    /// `destination` is a scratch file the handler may spill raw data into.
    async fn load(&self, ref_path: &[Guid], destination: &Path)
        -> Result<SourceData, IndexingError>;

    /// Map each raw reference to the full reference path string that
    /// reaches it from `ref_path`.
    fn build_reference_paths(
        &self,
        ref_path: &[Guid],
        refs: &BTreeSet<String>,
    ) -> HashMap<String, String>;

    async fn resolve_references(
        &self,
        ref_path: &[Guid],
        refs: &BTreeSet<String>,
    ) -> Result<Vec<ResolvedReference>, IndexingError>;
}

/// Handlers keyed by the storage code they serve.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<StorageCode, Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn register(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.insert(handler.storage_code(), handler);
    }

    /// Handler for `code`; a missing handler is a configuration error.
    pub fn get(&self, code: StorageCode) -> Result<&Arc<dyn EventHandler>, IndexingError> {
        self.handlers
            .get(&code)
            .ok_or(IndexingError::NoHandler(code))
    }

    /// Registered storage codes in a stable order.
    pub fn storage_codes(&self) -> Vec<StorageCode> {
        let mut codes: Vec<_> = self.handlers.keys().copied().collect();
        codes.sort();
        codes
    }
}
