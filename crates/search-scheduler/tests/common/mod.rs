//! Minimal collaborators for driving the runner.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use search_indexing::{
    EventHandler, EventList, EventProcessor, HandlerRegistry, IndexBatch, IndexingError,
    IndexingPipeline, IndexingStorage, MemoryStatusEventStorage, MemoryTypeStorage,
    PipelineConfig, RetryPolicy, StatusEventQueue, StatusEventStorage, SubEventSource,
};
use search_types::{
    AccessFilter, EventKind, FoundHits, Guid, MatchFilter, ObjectData, PostProcessing,
    ProcessingState, ResolvedReference, SearchRequest, SourceData, StatusEvent, StatusEventId,
    StorageCode, StoredStatusEvent, TypeParsingRule,
};

pub fn event(guid: &str, kind: EventKind) -> StatusEvent {
    StatusEvent::new(guid.parse().unwrap(), kind, Utc::now())
}

/// Object store whose expansion can be made slow.
#[derive(Default)]
pub struct SlowHandler {
    expand_delay: Option<Duration>,
    pub expands: AtomicUsize,
}

impl SlowHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expand_delay(mut self, delay: Duration) -> Self {
        self.expand_delay = Some(delay);
        self
    }
}

#[async_trait]
impl EventHandler for SlowHandler {
    fn storage_code(&self) -> StorageCode {
        StorageCode::Workspace
    }

    async fn expand(&self, event: &StatusEvent) -> Result<Box<dyn SubEventSource>, IndexingError> {
        self.expands.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.expand_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Box::new(EventList::single(event.clone())))
    }

    async fn load(&self, _ref_path: &[Guid], _dest: &Path) -> Result<SourceData, IndexingError> {
        Err(IndexingError::Fatal("objects are not loadable here".into()))
    }

    fn build_reference_paths(
        &self,
        _ref_path: &[Guid],
        _refs: &BTreeSet<String>,
    ) -> HashMap<String, String> {
        HashMap::new()
    }

    async fn resolve_references(
        &self,
        _ref_path: &[Guid],
        _refs: &BTreeSet<String>,
    ) -> Result<Vec<ResolvedReference>, IndexingError> {
        Ok(Vec::new())
    }
}

/// Index that only counts access changes.
#[derive(Default)]
pub struct CountingIndex {
    pub unshares: AtomicUsize,
}

#[async_trait]
impl IndexingStorage for CountingIndex {
    async fn check_parent_guids_exist(
        &self,
        guids: &BTreeSet<Guid>,
    ) -> Result<HashMap<Guid, bool>, IndexingError> {
        Ok(guids.iter().map(|g| (g.clone(), false)).collect())
    }

    async fn index_objects(&self, _batch: IndexBatch<'_>) -> Result<(), IndexingError> {
        Ok(())
    }

    async fn share_objects(
        &self,
        _guids: &BTreeSet<Guid>,
        _access_group_id: u32,
        _is_public: bool,
    ) -> Result<(), IndexingError> {
        Ok(())
    }

    async fn unshare_objects(
        &self,
        _guids: &BTreeSet<Guid>,
        _access_group_id: u32,
    ) -> Result<(), IndexingError> {
        self.unshares.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_all_versions(&self, _guid: &Guid) -> Result<(), IndexingError> {
        Ok(())
    }

    async fn undelete_all_versions(&self, _guid: &Guid) -> Result<(), IndexingError> {
        Ok(())
    }

    async fn publish_objects(&self, _guids: &BTreeSet<Guid>) -> Result<(), IndexingError> {
        Ok(())
    }

    async fn unpublish_objects(&self, _guids: &BTreeSet<Guid>) -> Result<(), IndexingError> {
        Ok(())
    }

    async fn publish_all_versions(&self, _guid: &Guid) -> Result<(), IndexingError> {
        Ok(())
    }

    async fn unpublish_all_versions(&self, _guid: &Guid) -> Result<(), IndexingError> {
        Ok(())
    }

    async fn set_name_on_all_object_versions(
        &self,
        _guid: &Guid,
        _new_name: &str,
    ) -> Result<(), IndexingError> {
        Ok(())
    }

    async fn get_objects_by_ids(
        &self,
        _guids: &BTreeSet<Guid>,
        _post_processing: PostProcessing,
    ) -> Result<Vec<ObjectData>, IndexingError> {
        Ok(Vec::new())
    }

    async fn search_types(
        &self,
        _filter: &MatchFilter,
        _access: &AccessFilter,
    ) -> Result<BTreeMap<String, u64>, IndexingError> {
        Ok(BTreeMap::new())
    }

    async fn search_objects(&self, request: &SearchRequest) -> Result<FoundHits, IndexingError> {
        Ok(FoundHits {
            pagination: request.pagination,
            ..Default::default()
        })
    }
}

/// Event storage whose first reads fail.
pub struct FlakyEventStorage {
    inner: MemoryStatusEventStorage,
    failures_left: AtomicUsize,
    pub reads: AtomicUsize,
}

impl FlakyEventStorage {
    pub fn new(failures: usize) -> Self {
        Self {
            inner: MemoryStatusEventStorage::new(),
            failures_left: AtomicUsize::new(failures),
            reads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl StatusEventStorage for FlakyEventStorage {
    async fn store(
        &self,
        event: StatusEvent,
        state: ProcessingState,
    ) -> Result<StoredStatusEvent, IndexingError> {
        self.inner.store(event, state).await
    }

    async fn get(&self, id: &StatusEventId) -> Result<Option<StoredStatusEvent>, IndexingError> {
        self.inner.get(id).await
    }

    async fn get_by_state(
        &self,
        state: ProcessingState,
        limit: usize,
    ) -> Result<Vec<StoredStatusEvent>, IndexingError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(IndexingError::Retriable("event store unavailable".into()));
        }
        self.inner.get_by_state(state, limit).await
    }

    async fn set_processing_state(
        &self,
        id: &StatusEventId,
        state: ProcessingState,
    ) -> Result<Option<StoredStatusEvent>, IndexingError> {
        self.inner.set_processing_state(id, state).await
    }
}

pub fn processor(
    handler: Arc<SlowHandler>,
    index: Arc<CountingIndex>,
    events: Arc<dyn StatusEventStorage>,
) -> EventProcessor {
    let pipeline = IndexingPipeline::new(
        HandlerRegistry::new().with_handler(handler),
        index,
        Arc::new(MemoryTypeStorage::new(Vec::<TypeParsingRule>::new())),
        PipelineConfig::default(),
    );
    EventProcessor::new(Arc::new(pipeline), StatusEventQueue::new(events))
        .with_retry(RetryPolicy::new(5, Duration::from_millis(10)))
}
