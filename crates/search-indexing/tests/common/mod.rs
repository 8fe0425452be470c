//! Shared fakes for the indexing integration tests.
//!
//! `FakeHandler` plays the object store and `RecordingIndex` the search
//! index; both record every call so tests can assert on side effects.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use search_indexing::{
    EventHandler, EventList, EventProcessor, HandlerRegistry, IndexBatch, IndexingError,
    IndexingPipeline, IndexingStorage, MemoryStatusEventStorage, MemoryTypeStorage, PipelineConfig,
    RetryPolicy, StatusEventQueue, SubEventSource,
};
use search_types::{
    AccessFilter, EventKind, FoundHits, Guid, IndexingRule, MatchFilter, ObjectData, ParsedObject,
    PostProcessing, ResolvedReference, SearchRequest, SourceData, StatusEvent, StorageCode,
    StorageObjectType, Transform, TypeParsingRule,
};

pub const GENOME_TYPE: &str = "KBaseGenomes.Genome";
pub const ASSEMBLY_TYPE: &str = "KBaseGenomeAnnotations.Assembly";
pub const NARRATIVE_TYPE: &str = "KBaseNarrative.Narrative";

pub fn guid(s: &str) -> Guid {
    s.parse().expect("valid guid")
}

pub fn ws_type(name: &str) -> StorageObjectType {
    StorageObjectType::new(StorageCode::Workspace, name)
}

pub fn new_version(guid_str: &str, type_name: &str) -> StatusEvent {
    StatusEvent::new(
        guid(guid_str),
        EventKind::NewVersion,
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
    )
    .with_storage_object_type(ws_type(type_name))
}

pub fn event(guid_str: &str, kind: EventKind) -> StatusEvent {
    StatusEvent::new(
        guid(guid_str),
        kind,
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
    )
}

/// Failure injected into `FakeHandler` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Retriable,
    Malformed,
    Fatal,
}

impl Failure {
    fn error(self, what: &str) -> IndexingError {
        match self {
            Failure::Retriable => IndexingError::Retriable(format!("{}: store unavailable", what)),
            Failure::Malformed => IndexingError::Parse(format!("{}: malformed", what)),
            Failure::Fatal => IndexingError::Fatal(format!("{}: credentials revoked", what)),
        }
    }
}

/// Sub-event source whose first `failures` reads fail with a retriable error.
pub struct FlakyEventList {
    events: EventList,
    failures: usize,
    reads: Arc<AtomicUsize>,
}

#[async_trait]
impl SubEventSource for FlakyEventList {
    async fn next_event(&mut self) -> Result<Option<StatusEvent>, IndexingError> {
        let read = self.reads.fetch_add(1, Ordering::SeqCst);
        if read < self.failures {
            return Err(Failure::Retriable.error("next event"));
        }
        self.events.next_event().await
    }
}

/// In-memory object store.
#[derive(Default)]
pub struct FakeHandler {
    objects: HashMap<Guid, SourceData>,
    expansions: HashMap<Guid, Vec<StatusEvent>>,
    refs: HashMap<String, ResolvedReference>,
    failures: HashMap<Guid, Failure>,
    expand_failures: HashMap<Guid, Failure>,
    flaky_reads: Option<usize>,
    cancel_on_expand: Option<CancellationToken>,
    pub loads: Mutex<Vec<Vec<Guid>>>,
    pub sub_event_reads: Arc<AtomicUsize>,
    pub resolves: Mutex<Vec<BTreeSet<String>>>,
    pub expands: AtomicUsize,
}

impl FakeHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(mut self, guid_str: &str, data: Value) -> Self {
        let name = format!("object_{}", guid_str.replace(['/', ':'], "_"));
        self.objects
            .insert(guid(guid_str), SourceData::new(data, name, "alice"));
        self
    }

    /// Expand events of `parent` into `events` instead of the event itself.
    pub fn with_expansion(mut self, parent: &str, events: Vec<StatusEvent>) -> Self {
        self.expansions.insert(guid(parent), events);
        self
    }

    /// Register a raw reference the store resolves to `target`.
    pub fn with_reference(mut self, raw: &str, target: &str, type_name: &str) -> Self {
        let target = guid(target);
        self.refs.insert(
            raw.to_string(),
            ResolvedReference {
                reference: raw.to_string(),
                resolved_reference: target.reference(),
                guid: target,
                storage_object_type: ws_type(type_name),
                timestamp: Utc.timestamp_millis_opt(1_600_000_000_000).unwrap(),
            },
        );
        self
    }

    pub fn with_load_failure(mut self, guid_str: &str, failure: Failure) -> Self {
        self.failures.insert(guid(guid_str), failure);
        self
    }

    /// Fail every expansion of events on `guid_str`.
    pub fn with_expand_failure(mut self, guid_str: &str, failure: Failure) -> Self {
        self.expand_failures.insert(guid(guid_str), failure);
        self
    }

    /// Fail the first `failures` sub-event reads of every expansion.
    pub fn with_flaky_sub_events(mut self, failures: usize) -> Self {
        self.flaky_reads = Some(failures);
        self
    }

    /// Cancel `token` from inside every expansion.
    pub fn with_cancel_on_expand(mut self, token: CancellationToken) -> Self {
        self.cancel_on_expand = Some(token);
        self
    }

    pub fn expand_count(&self) -> usize {
        self.expands.load(Ordering::SeqCst)
    }

    pub fn load_paths(&self) -> Vec<Vec<Guid>> {
        self.loads.lock().unwrap().clone()
    }

    pub fn load_count(&self) -> usize {
        self.loads.lock().unwrap().len()
    }

    pub fn resolve_calls(&self) -> Vec<BTreeSet<String>> {
        self.resolves.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventHandler for FakeHandler {
    fn storage_code(&self) -> StorageCode {
        StorageCode::Workspace
    }

    async fn expand(&self, event: &StatusEvent) -> Result<Box<dyn SubEventSource>, IndexingError> {
        self.expands.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = &self.cancel_on_expand {
            token.cancel();
        }
        if let Some(failure) = self.expand_failures.get(&event.guid) {
            return Err(failure.error("expand"));
        }
        let list = match self.expansions.get(&event.guid) {
            Some(events) => EventList::new(events.clone()),
            None => EventList::single(event.clone()),
        };
        match self.flaky_reads {
            Some(failures) => Ok(Box::new(FlakyEventList {
                events: list,
                failures,
                reads: Arc::clone(&self.sub_event_reads),
            })),
            None => Ok(Box::new(list)),
        }
    }

    async fn load(
        &self,
        ref_path: &[Guid],
        destination: &Path,
    ) -> Result<SourceData, IndexingError> {
        self.loads.lock().unwrap().push(ref_path.to_vec());
        let target = ref_path.last().ok_or(IndexingError::EmptyReferencePath)?;
        if let Some(failure) = self.failures.get(target) {
            return Err(failure.error(&format!("load {}", target)));
        }
        let source = self
            .objects
            .get(&target.parent())
            .cloned()
            .ok_or_else(|| IndexingError::Parse(format!("no such object {}", target)))?;
        std::fs::write(destination, serde_json::to_vec(&source.data)?)?;
        Ok(source)
    }

    fn build_reference_paths(
        &self,
        ref_path: &[Guid],
        refs: &BTreeSet<String>,
    ) -> HashMap<String, String> {
        let prefix: Vec<String> = ref_path.iter().map(Guid::reference).collect();
        let prefix = prefix.join(";");
        refs.iter()
            .map(|raw| (raw.clone(), format!("{};{}", prefix, raw)))
            .collect()
    }

    async fn resolve_references(
        &self,
        _ref_path: &[Guid],
        refs: &BTreeSet<String>,
    ) -> Result<Vec<ResolvedReference>, IndexingError> {
        self.resolves.lock().unwrap().push(refs.clone());
        refs.iter()
            .map(|raw| {
                self.refs
                    .get(raw)
                    .cloned()
                    .ok_or_else(|| IndexingError::Parse(format!("unresolvable reference {}", raw)))
            })
            .collect()
    }
}

/// One recorded `index_objects` call.
#[derive(Debug, Clone)]
pub struct RecordedBatch {
    pub object_type: String,
    pub guid: Guid,
    pub is_public: bool,
    pub parent_json: Option<String>,
    pub objects: Vec<(Guid, ParsedObject)>,
}

#[derive(Default)]
struct IndexState {
    batches: Vec<RecordedBatch>,
    documents: BTreeMap<Guid, ObjectData>,
    indexed_parents: BTreeSet<Guid>,
    calls: Vec<String>,
    lookups: Vec<(BTreeSet<Guid>, PostProcessing)>,
}

/// Search index that records every mutation.
#[derive(Default)]
pub struct RecordingIndex {
    state: Mutex<IndexState>,
}

impl RecordingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend `guid` was indexed by an earlier run.
    pub fn with_indexed(self, guid_str: &str, type_name: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let guid = guid(guid_str);
            state.indexed_parents.insert(guid.parent());
            state.documents.insert(
                guid.clone(),
                ObjectData {
                    guid: Some(guid.clone()),
                    parent_guid: Some(guid.parent()),
                    type_name: Some(type_name.to_string()),
                    ..Default::default()
                },
            );
        }
        self
    }

    /// Set a keyword on a document registered with `with_indexed`.
    pub fn with_key_prop(self, guid_str: &str, key: &str, value: &str) -> Self {
        if let Some(doc) = self.state.lock().unwrap().documents.get_mut(&guid(guid_str)) {
            doc.key_props.insert(key.to_string(), value.to_string());
        }
        self
    }

    /// Every `get_objects_by_ids` call with its projection.
    pub fn lookups(&self) -> Vec<(BTreeSet<Guid>, PostProcessing)> {
        self.state.lock().unwrap().lookups.clone()
    }

    pub fn batches(&self) -> Vec<RecordedBatch> {
        self.state.lock().unwrap().batches.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn document(&self, guid: &Guid) -> Option<ObjectData> {
        self.state.lock().unwrap().documents.get(guid).cloned()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

fn join(guids: &BTreeSet<Guid>) -> String {
    guids.iter().map(Guid::to_string).collect::<Vec<_>>().join(",")
}

fn first_text(values: &[Value]) -> Option<String> {
    values.first().map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

#[async_trait]
impl IndexingStorage for RecordingIndex {
    async fn check_parent_guids_exist(
        &self,
        guids: &BTreeSet<Guid>,
    ) -> Result<HashMap<Guid, bool>, IndexingError> {
        let state = self.state.lock().unwrap();
        Ok(guids
            .iter()
            .map(|g| (g.clone(), state.indexed_parents.contains(&g.parent())))
            .collect())
    }

    async fn index_objects(&self, batch: IndexBatch<'_>) -> Result<(), IndexingError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("index {} {}", batch.object_type, batch.guid));
        state.indexed_parents.insert(batch.guid.parent());
        for (sub_guid, parsed) in batch.objects {
            let key_props = parsed
                .keywords
                .iter()
                .filter_map(|(k, v)| first_text(v).map(|t| (k.clone(), t)))
                .collect();
            state.documents.insert(
                sub_guid.clone(),
                ObjectData {
                    guid: Some(sub_guid.clone()),
                    parent_guid: Some(batch.guid.clone()),
                    object_name: Some(batch.source.name.clone()),
                    type_name: Some(batch.object_type.to_string()),
                    creator: Some(batch.source.creator.clone()),
                    timestamp: Some(batch.timestamp),
                    data: parsed.json.as_deref().and_then(|j| serde_json::from_str(j).ok()),
                    parent_data: batch.parent_json.and_then(|j| serde_json::from_str(j).ok()),
                    key_props,
                },
            );
        }
        state.batches.push(RecordedBatch {
            object_type: batch.object_type.to_string(),
            guid: batch.guid.clone(),
            is_public: batch.is_public,
            parent_json: batch.parent_json.map(str::to_string),
            objects: batch.objects.to_vec(),
        });
        Ok(())
    }

    async fn share_objects(
        &self,
        guids: &BTreeSet<Guid>,
        access_group_id: u32,
        is_public: bool,
    ) -> Result<(), IndexingError> {
        self.record(format!("share {} {} {}", join(guids), access_group_id, is_public));
        Ok(())
    }

    async fn unshare_objects(
        &self,
        guids: &BTreeSet<Guid>,
        access_group_id: u32,
    ) -> Result<(), IndexingError> {
        self.record(format!("unshare {} {}", join(guids), access_group_id));
        Ok(())
    }

    async fn delete_all_versions(&self, guid: &Guid) -> Result<(), IndexingError> {
        self.record(format!("delete_all {}", guid));
        Ok(())
    }

    async fn undelete_all_versions(&self, guid: &Guid) -> Result<(), IndexingError> {
        self.record(format!("undelete_all {}", guid));
        Ok(())
    }

    async fn publish_objects(&self, guids: &BTreeSet<Guid>) -> Result<(), IndexingError> {
        self.record(format!("publish {}", join(guids)));
        Ok(())
    }

    async fn unpublish_objects(&self, guids: &BTreeSet<Guid>) -> Result<(), IndexingError> {
        self.record(format!("unpublish {}", join(guids)));
        Ok(())
    }

    async fn publish_all_versions(&self, guid: &Guid) -> Result<(), IndexingError> {
        self.record(format!("publish_all {}", guid));
        Ok(())
    }

    async fn unpublish_all_versions(&self, guid: &Guid) -> Result<(), IndexingError> {
        self.record(format!("unpublish_all {}", guid));
        Ok(())
    }

    async fn set_name_on_all_object_versions(
        &self,
        guid: &Guid,
        new_name: &str,
    ) -> Result<(), IndexingError> {
        self.record(format!("rename {} {}", guid, new_name));
        Ok(())
    }

    async fn get_objects_by_ids(
        &self,
        guids: &BTreeSet<Guid>,
        post_processing: PostProcessing,
    ) -> Result<Vec<ObjectData>, IndexingError> {
        let mut state = self.state.lock().unwrap();
        state.lookups.push((guids.clone(), post_processing));
        Ok(guids
            .iter()
            .filter_map(|g| state.documents.get(g))
            .map(|doc| {
                let mut doc = doc.clone();
                if !post_processing.object_data {
                    doc.data = None;
                    doc.parent_data = None;
                }
                if !post_processing.object_keys {
                    doc.key_props.clear();
                }
                doc
            })
            .collect())
    }

    async fn search_types(
        &self,
        _filter: &MatchFilter,
        access: &AccessFilter,
    ) -> Result<BTreeMap<String, u64>, IndexingError> {
        let state = self.state.lock().unwrap();
        let mut counts = BTreeMap::new();
        for doc in state.documents.values() {
            let visible = doc
                .guid
                .as_ref()
                .is_some_and(|g| access.access_group_ids.contains(&g.access_group_id()));
            if let (true, Some(type_name)) = (visible, &doc.type_name) {
                *counts.entry(type_name.clone()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn search_objects(&self, request: &SearchRequest) -> Result<FoundHits, IndexingError> {
        let state = self.state.lock().unwrap();
        let matching: Vec<ObjectData> = state
            .documents
            .values()
            .filter(|d| {
                d.type_name
                    .as_ref()
                    .is_some_and(|t| request.object_types.contains(t))
            })
            .cloned()
            .collect();
        Ok(FoundHits {
            pagination: request.pagination,
            total: matching.len() as u64,
            objects: matching
                .into_iter()
                .skip(request.pagination.start)
                .take(request.pagination.count)
                .collect(),
        })
    }
}

/// `Genome`, `GenomeFeature` and `Assembly` rules.
pub fn genome_rules() -> Vec<TypeParsingRule> {
    let genome = TypeParsingRule::new("Genome", ws_type(GENOME_TYPE))
        .unwrap()
        .with_indexing_rule(
            IndexingRule::from_path("scientific_name".parse().unwrap()).with_full_text(),
        )
        .with_indexing_rule(
            IndexingRule::from_path("assembly_ref".parse().unwrap())
                .with_key_name("assembly_guid")
                .with_transform(Transform::guid("Assembly", None).unwrap()),
        )
        .with_indexing_rule(IndexingRule::from_source_key("creator", "owner").unwrap());

    let feature = TypeParsingRule::new("GenomeFeature", ws_type(GENOME_TYPE))
        .unwrap()
        .with_sub_objects(
            "feature",
            "features/[*]".parse().unwrap(),
            "id".parse().unwrap(),
        )
        .unwrap()
        .with_indexing_rule(IndexingRule::from_path("id".parse().unwrap()))
        .with_indexing_rule(IndexingRule::from_path("function".parse().unwrap()).with_full_text())
        .with_indexing_rule(
            IndexingRule::from_path("scientific_name".parse().unwrap()).with_from_parent(),
        )
        .with_indexing_rule(
            IndexingRule::from_path("assembly_ref".parse().unwrap())
                .with_from_parent()
                .with_key_name("assembly_guid")
                .with_transform(Transform::guid("Assembly", None).unwrap()),
        );

    let assembly = TypeParsingRule::new("Assembly", ws_type(ASSEMBLY_TYPE))
        .unwrap()
        .with_indexing_rule(
            IndexingRule::from_path("dna_size".parse().unwrap()).with_keyword_type("integer"),
        )
        .with_indexing_rule(
            IndexingRule::from_path("genome_ref".parse().unwrap())
                .with_key_name("genome_guid")
                .with_transform(Transform::guid("Genome", None).unwrap()),
        );

    vec![genome, feature, assembly]
}

pub fn genome_data(assembly_ref: &str) -> Value {
    json!({
        "scientific_name": "Escherichia coli",
        "assembly_ref": assembly_ref,
        "features": [
            {"id": "b0001", "function": "thr operon leader peptide"},
            {"id": "b0002", "function": "aspartokinase"}
        ]
    })
}

pub fn assembly_data() -> Value {
    json!({"dna_size": 4641652})
}

/// Everything a test needs to drive ticks and inspect the fakes.
pub struct Harness {
    pub _temp_dir: tempfile::TempDir,
    pub handler: Arc<FakeHandler>,
    pub index: Arc<RecordingIndex>,
    pub events: Arc<MemoryStatusEventStorage>,
    pub processor: EventProcessor,
}

impl Harness {
    pub fn new(handler: FakeHandler, index: RecordingIndex) -> Self {
        Self::with_config(handler, index, |c| c)
    }

    pub fn with_config(
        handler: FakeHandler,
        index: RecordingIndex,
        configure: impl FnOnce(PipelineConfig) -> PipelineConfig,
    ) -> Self {
        Self::build(handler, index, genome_rules(), configure)
    }

    pub fn with_rules(
        handler: FakeHandler,
        index: RecordingIndex,
        rules: Vec<TypeParsingRule>,
    ) -> Self {
        Self::build(handler, index, rules, |c| c)
    }

    fn build(
        handler: FakeHandler,
        index: RecordingIndex,
        rules: Vec<TypeParsingRule>,
        configure: impl FnOnce(PipelineConfig) -> PipelineConfig,
    ) -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let handler = Arc::new(handler);
        let index = Arc::new(index);
        let events = Arc::new(MemoryStatusEventStorage::new());
        let config =
            configure(PipelineConfig::default().with_temp_dir(temp_dir.path().join("scratch")));
        let pipeline = IndexingPipeline::new(
            HandlerRegistry::new().with_handler(handler.clone()),
            index.clone(),
            Arc::new(MemoryTypeStorage::new(rules)),
            config,
        );
        let queue = StatusEventQueue::new(events.clone());
        let processor = EventProcessor::new(Arc::new(pipeline), queue)
            .with_retry(RetryPolicy::new(5, Duration::from_millis(10)));
        Self {
            _temp_dir: temp_dir,
            handler,
            index,
            events,
            processor,
        }
    }

    pub fn scratch_dir(&self) -> std::path::PathBuf {
        self._temp_dir.path().join("scratch")
    }
}
