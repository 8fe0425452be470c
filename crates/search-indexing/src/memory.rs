//! In-memory status event and type rule storages.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use search_types::{
    ProcessingState, StatusEvent, StatusEventId, StorageCode, StorageObjectType,
    StoredStatusEvent, TypeParsingRule,
};

use crate::error::IndexingError;
use crate::queue::{clamp_limit, StatusEventStorage};
use crate::storage::TypeStorage;

fn poisoned() -> IndexingError {
    IndexingError::Retriable("in-memory storage lock poisoned".to_string())
}

/// Status events held in process memory.
#[derive(Debug, Default)]
pub struct MemoryStatusEventStorage {
    events: RwLock<BTreeMap<StatusEventId, StoredStatusEvent>>,
}

impl MemoryStatusEventStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.read().map(|e| e.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Matching events, earliest timestamp first, at most `clamp_limit(limit)`.
    fn select(
        &self,
        matches: impl Fn(&StoredStatusEvent) -> bool,
        limit: usize,
    ) -> Result<Vec<StoredStatusEvent>, IndexingError> {
        let events = self.events.read().map_err(|_| poisoned())?;
        let mut matching: Vec<_> = events.values().filter(|&e| matches(e)).cloned().collect();
        // ULID order breaks timestamp ties by insertion
        matching.sort_by(|a, b| {
            a.event
                .timestamp
                .cmp(&b.event.timestamp)
                .then_with(|| a.id.cmp(&b.id))
        });
        matching.truncate(clamp_limit(limit));
        Ok(matching)
    }
}

#[async_trait]
impl StatusEventStorage for MemoryStatusEventStorage {
    async fn store(
        &self,
        event: StatusEvent,
        state: ProcessingState,
    ) -> Result<StoredStatusEvent, IndexingError> {
        let stored = StoredStatusEvent::new(StatusEventId::generate(), event, state);
        self.events
            .write()
            .map_err(|_| poisoned())?
            .insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: &StatusEventId) -> Result<Option<StoredStatusEvent>, IndexingError> {
        Ok(self.events.read().map_err(|_| poisoned())?.get(id).cloned())
    }

    async fn get_by_state(
        &self,
        state: ProcessingState,
        limit: usize,
    ) -> Result<Vec<StoredStatusEvent>, IndexingError> {
        self.select(|e| e.state == state, limit)
    }

    async fn get_by_state_for_code(
        &self,
        state: ProcessingState,
        code: StorageCode,
        limit: usize,
    ) -> Result<Vec<StoredStatusEvent>, IndexingError> {
        self.select(|e| e.state == state && e.event.storage_code() == code, limit)
    }

    async fn set_processing_state(
        &self,
        id: &StatusEventId,
        state: ProcessingState,
    ) -> Result<Option<StoredStatusEvent>, IndexingError> {
        let mut events = self.events.write().map_err(|_| poisoned())?;
        Ok(events.get_mut(id).map(|e| {
            e.state = state;
            e.clone()
        }))
    }
}

/// Type parsing rules registered at startup.
#[derive(Debug, Default)]
pub struct MemoryTypeStorage {
    rules: Vec<Arc<TypeParsingRule>>,
}

impl MemoryTypeStorage {
    pub fn new(rules: impl IntoIterator<Item = TypeParsingRule>) -> Self {
        Self {
            rules: rules.into_iter().map(Arc::new).collect(),
        }
    }
}

#[async_trait]
impl TypeStorage for MemoryTypeStorage {
    async fn list_object_types(&self) -> Result<Vec<Arc<TypeParsingRule>>, IndexingError> {
        Ok(self.rules.clone())
    }

    async fn list_object_types_by_storage_object_type(
        &self,
        storage_object_type: &StorageObjectType,
    ) -> Result<Vec<Arc<TypeParsingRule>>, IndexingError> {
        Ok(self
            .rules
            .iter()
            .filter(|r| r.storage_object_type.matches(storage_object_type))
            .cloned()
            .collect())
    }

    async fn get_object_type(
        &self,
        global_object_type: &str,
    ) -> Result<Arc<TypeParsingRule>, IndexingError> {
        self.rules
            .iter()
            .find(|r| r.global_object_type == global_object_type)
            .cloned()
            .ok_or_else(|| IndexingError::UnknownType(global_object_type.to_string()))
    }
}
