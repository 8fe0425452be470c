//! Status event storage contract and the per-tick queue view over it.

use std::sync::Arc;

use async_trait::async_trait;
use search_types::{
    ProcessingState, Settings, StatusEvent, StatusEventId, StorageCode, StoredStatusEvent,
};
use tracing::debug;

use crate::error::IndexingError;

/// Largest batch a status event storage returns.
pub const MAX_EVENT_LIMIT: usize = 1000;

/// Clamp a requested batch size into `1..=MAX_EVENT_LIMIT`.
///
/// Out of range requests get the maximum.
pub fn clamp_limit(limit: usize) -> usize {
    if (1..=MAX_EVENT_LIMIT).contains(&limit) {
        limit
    } else {
        MAX_EVENT_LIMIT
    }
}

/// Persistent store of status events.
///
/// Transient storage problems surface as [`IndexingError::Retriable`].
#[async_trait]
pub trait StatusEventStorage: Send + Sync {
    async fn store(
        &self,
        event: StatusEvent,
        state: ProcessingState,
    ) -> Result<StoredStatusEvent, IndexingError>;

    async fn get(&self, id: &StatusEventId) -> Result<Option<StoredStatusEvent>, IndexingError>;

    /// Events in `state`, earliest timestamp first, at most `clamp_limit(limit)`.
    async fn get_by_state(
        &self,
        state: ProcessingState,
        limit: usize,
    ) -> Result<Vec<StoredStatusEvent>, IndexingError>;

    /// Events in `state` from storage `code`, earliest first, at most
    /// `clamp_limit(limit)`.
    ///
    /// The default filters one `get_by_state` batch, where a backlog of other
    /// codes can crowd this code out. Storages that can filter in the query
    /// override it.
    async fn get_by_state_for_code(
        &self,
        state: ProcessingState,
        code: StorageCode,
        limit: usize,
    ) -> Result<Vec<StoredStatusEvent>, IndexingError> {
        Ok(self
            .get_by_state(state, limit)
            .await?
            .into_iter()
            .filter(|e| e.event.storage_code() == code)
            .collect())
    }

    /// Returns the updated event, or `None` if no event has this id.
    async fn set_processing_state(
        &self,
        id: &StatusEventId,
        state: ProcessingState,
    ) -> Result<Option<StoredStatusEvent>, IndexingError>;
}

/// Queue of due parent events.
pub struct StatusEventQueue {
    storage: Arc<dyn StatusEventStorage>,
    batch_size: usize,
}

impl StatusEventQueue {
    pub fn new(storage: Arc<dyn StatusEventStorage>) -> Self {
        Self {
            storage,
            batch_size: MAX_EVENT_LIMIT,
        }
    }

    pub fn from_settings(storage: Arc<dyn StatusEventStorage>, settings: &Settings) -> Self {
        Self::new(storage).with_batch_size(settings.event_batch_size)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = clamp_limit(batch_size);
        self
    }

    pub fn storage(&self) -> &Arc<dyn StatusEventStorage> {
        &self.storage
    }

    /// Unprocessed events for one storage code, earliest first.
    pub async fn due_events(
        &self,
        code: StorageCode,
    ) -> Result<Vec<StoredStatusEvent>, IndexingError> {
        let events = self
            .storage
            .get_by_state_for_code(ProcessingState::Unprocessed, code, self.batch_size)
            .await?;
        debug!(storage_code = %code, count = events.len(), "Fetched due events");
        Ok(events)
    }

    /// Record the outcome of a parent event.
    pub async fn mark_visited(
        &self,
        event: &StoredStatusEvent,
        success: bool,
    ) -> Result<(), IndexingError> {
        let state = if success {
            ProcessingState::Indexed
        } else {
            ProcessingState::Failed
        };
        self.storage.set_processing_state(&event.id, state).await?;
        Ok(())
    }
}
