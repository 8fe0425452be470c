//! Indexing pipeline for one object and everything it references.
//!
//! Loads the object through its storage handler, applies every type rule
//! registered for its storage type, extracts keywords per document and
//! writes one batch per rule to the index.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, info};

use search_types::{
    AccessFilter, FoundHits, Guid, MatchFilter, ObjectData, PostProcessing, SearchRequest,
    Settings, StorageObjectType, TypeDescriptor,
};

use crate::cache::{ResolutionCache, ResolvingLookup};
use crate::error::IndexingError;
use crate::handler::HandlerRegistry;
use crate::keywords::{ExtractRequest, KeywordExtractor, RuleKeywordExtractor};
use crate::parser;
use crate::storage::{IndexBatch, IndexingStorage, TypeStorage};

/// Configuration for the indexing pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of the per-storage-code scratch directories
    pub temp_dir: PathBuf,
    /// Longest reference path followed before giving up on an object
    pub max_reference_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir().join("search-indexer"),
            max_reference_depth: 64,
        }
    }
}

impl PipelineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            temp_dir: settings.temp_dir_path(),
            max_reference_depth: settings.max_reference_depth,
        }
    }

    /// Set the scratch directory root.
    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    /// Set the reference depth limit.
    pub fn with_max_reference_depth(mut self, depth: usize) -> Self {
        self.max_reference_depth = depth;
        self
    }
}

/// Indexes objects and answers index/type queries.
pub struct IndexingPipeline {
    handlers: HandlerRegistry,
    indexing_storage: Arc<dyn IndexingStorage>,
    type_storage: Arc<dyn TypeStorage>,
    extractor: Arc<dyn KeywordExtractor>,
    config: PipelineConfig,
}

impl IndexingPipeline {
    /// Create a pipeline using the rule-driven keyword extractor.
    pub fn new(
        handlers: HandlerRegistry,
        indexing_storage: Arc<dyn IndexingStorage>,
        type_storage: Arc<dyn TypeStorage>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            handlers,
            indexing_storage,
            type_storage,
            extractor: Arc::new(RuleKeywordExtractor),
            config,
        }
    }

    /// Replace the keyword extractor.
    pub fn with_extractor(mut self, extractor: Arc<dyn KeywordExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn indexing_storage(&self) -> &Arc<dyn IndexingStorage> {
        &self.indexing_storage
    }

    pub fn type_storage(&self) -> &Arc<dyn TypeStorage> {
        &self.type_storage
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Whether any type rule is registered for this storage type.
    pub async fn is_storage_type_supported(
        &self,
        storage_object_type: &StorageObjectType,
    ) -> Result<bool, IndexingError> {
        Ok(!self
            .type_storage
            .list_object_types_by_storage_object_type(storage_object_type)
            .await?
            .is_empty())
    }

    /// Whether the parent object of `guid` already has indexed documents.
    pub async fn is_indexed(&self, guid: &Guid) -> Result<bool, IndexingError> {
        let parent = guid.parent();
        let exists = self
            .indexing_storage
            .check_parent_guids_exist(&BTreeSet::from([parent.clone()]))
            .await?;
        Ok(exists.get(&parent).copied().unwrap_or(false))
    }

    /// Index one object reached through `ref_path`.
    ///
    /// A top-level call passes no cache and an empty path; calls made while
    /// resolving references pass the caller's cache and path. `ref_path` is
    /// never modified.
    pub fn index_object<'a>(
        &'a self,
        guid: &'a Guid,
        storage_object_type: &'a StorageObjectType,
        timestamp: Option<DateTime<Utc>>,
        is_public: bool,
        cache: Option<&'a mut ResolutionCache>,
        ref_path: &'a [Guid],
    ) -> BoxFuture<'a, Result<(), IndexingError>> {
        async move {
            if ref_path.len() >= self.config.max_reference_depth {
                return Err(IndexingError::ReferenceDepth {
                    guid: guid.clone(),
                    depth: self.config.max_reference_depth,
                });
            }

            let handler = self.handlers.get(guid.storage_code())?;
            let temp_dir = self.config.temp_dir.join(guid.storage_code().as_str());
            tokio::fs::create_dir_all(&temp_dir).await?;
            // Removed on drop, whichever way this call exits
            let temp_file = tempfile::Builder::new()
                .prefix("object_")
                .suffix(".json")
                .tempfile_in(&temp_dir)?;

            let mut owned_cache = None;
            let cache = match cache {
                Some(cache) => cache,
                None => owned_cache.insert(ResolutionCache::new()),
            };

            let mut path = ref_path.to_vec();
            path.push(guid.clone());

            let started = Instant::now();
            let source = handler.load(&path, temp_file.path()).await?;
            info!(
                guid = %guid,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Loaded object"
            );

            let rules = self
                .type_storage
                .list_object_types_by_storage_object_type(storage_object_type)
                .await?;
            let timestamp = timestamp.unwrap_or_else(Utc::now);
            let mut lookup = ResolvingLookup::new(self, cache);

            for rule in rules {
                let started = Instant::now();
                let parent = parser::extract_parent_fragment(&rule, &source.data);
                let parent_json = parent.as_ref().map(serde_json::to_string).transpose()?;
                let documents = parser::parse_sub_objects(&source.data, guid, &rule)?;

                let mut objects = Vec::with_capacity(documents.len());
                for (sub_guid, document) in &documents {
                    let request = ExtractRequest {
                        global_object_type: &rule.global_object_type,
                        document,
                        parent: parent.as_ref(),
                        rules: &rule.indexing_rules,
                        source: &source,
                        ref_path: &path,
                    };
                    let parsed = self.extractor.extract_keywords(request, &mut lookup).await?;
                    objects.push((sub_guid.clone(), parsed));
                }
                info!(
                    guid = %guid,
                    object_type = %rule.global_object_type,
                    documents = objects.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Parsed object"
                );

                let started = Instant::now();
                self.indexing_storage
                    .index_objects(IndexBatch {
                        object_type: &rule.global_object_type,
                        source: &source,
                        timestamp,
                        parent_json: parent_json.as_deref(),
                        guid,
                        objects: &objects,
                        is_public,
                        indexing_rules: &rule.indexing_rules,
                    })
                    .await?;
                info!(
                    guid = %guid,
                    object_type = %rule.global_object_type,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Indexed object"
                );
            }

            drop(temp_file);
            Ok(())
        }
        .boxed()
    }

    /// Type descriptors keyed by global type name, optionally only `type_name`.
    pub async fn list_types(
        &self,
        type_name: Option<&str>,
    ) -> Result<BTreeMap<String, TypeDescriptor>, IndexingError> {
        Ok(self
            .type_storage
            .list_object_types()
            .await?
            .iter()
            .filter(|r| type_name.map_or(true, |t| t == r.global_object_type))
            .map(|r| (r.global_object_type.clone(), r.type_descriptor()))
            .collect())
    }

    /// Hit counts per global type.
    pub async fn search_types(
        &self,
        filter: &MatchFilter,
        access: &AccessFilter,
    ) -> Result<BTreeMap<String, u64>, IndexingError> {
        self.indexing_storage.search_types(filter, access).await
    }

    pub async fn search_objects(&self, request: &SearchRequest) -> Result<FoundHits, IndexingError> {
        self.indexing_storage.search_objects(request).await
    }

    /// Fetch indexed objects, silently dropping GUIDs outside `access_group_ids`.
    pub async fn get_objects(
        &self,
        guids: &[Guid],
        access_group_ids: &BTreeSet<u32>,
        post_processing: PostProcessing,
    ) -> Result<Vec<ObjectData>, IndexingError> {
        let visible: BTreeSet<Guid> = guids
            .iter()
            .filter(|g| access_group_ids.contains(&g.access_group_id()))
            .cloned()
            .collect();
        if visible.is_empty() {
            debug!("No requested objects are visible");
            return Ok(Vec::new());
        }
        self.indexing_storage
            .get_objects_by_ids(&visible, post_processing)
            .await
    }
}
