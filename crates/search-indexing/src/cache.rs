//! Per-pass resolution memo and the lookup provider built on it.
//!
//! A [`ResolutionCache`] lives exactly as long as one top-level
//! [`IndexingPipeline::index_object`] call and is threaded by `&mut` through
//! every recursive call that pass makes. Entries are written once and never
//! invalidated; the cache is dropped when the pass completes.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use search_types::{Guid, ObjectData, PostProcessing, TypeParsingRule};
use tracing::debug;

use crate::error::IndexingError;
use crate::keywords::ObjectLookupProvider;
use crate::pipeline::IndexingPipeline;

/// Memo of one indexing pass.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    /// Full reference path -> canonical reference
    resolved_refs: HashMap<String, String>,
    /// Indexed object summaries (info and keys)
    objects: HashMap<Guid, ObjectData>,
    /// Indexed global type names
    types: HashMap<Guid, String>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical reference memoized for a full reference path.
    pub fn canonical_reference(&self, ref_path: &str) -> Option<&str> {
        self.resolved_refs.get(ref_path).map(String::as_str)
    }

    pub fn resolved_reference_count(&self) -> usize {
        self.resolved_refs.len()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }
}

/// [`ObjectLookupProvider`] bound to one pipeline pass.
pub struct ResolvingLookup<'a> {
    pipeline: &'a IndexingPipeline,
    cache: &'a mut ResolutionCache,
}

impl<'a> ResolvingLookup<'a> {
    pub(crate) fn new(pipeline: &'a IndexingPipeline, cache: &'a mut ResolutionCache) -> Self {
        Self { pipeline, cache }
    }
}

#[async_trait]
impl ObjectLookupProvider for ResolvingLookup<'_> {
    async fn resolve_refs(
        &mut self,
        ref_path: &[Guid],
        refs: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>, IndexingError> {
        let first = ref_path.first().ok_or(IndexingError::EmptyReferencePath)?;
        let handler = Arc::clone(self.pipeline.handlers().get(first.storage_code())?);
        let full_paths = handler.build_reference_paths(ref_path, refs);
        let full_path = |raw: &str| {
            full_paths
                .get(raw)
                .cloned()
                .unwrap_or_else(|| raw.to_string())
        };

        let mut canonical = BTreeSet::new();
        let mut to_resolve = BTreeSet::new();
        for raw in refs {
            match self.cache.resolved_refs.get(&full_path(raw)) {
                Some(hit) => {
                    canonical.insert(hit.clone());
                }
                None => {
                    to_resolve.insert(raw.clone());
                }
            }
        }
        if to_resolve.is_empty() {
            return Ok(canonical);
        }

        let resolved = handler.resolve_references(ref_path, &to_resolve).await?;
        let targets: BTreeSet<Guid> = resolved.iter().map(|r| r.guid.clone()).collect();
        let indexed = self
            .pipeline
            .indexing_storage()
            .check_parent_guids_exist(&targets)
            .await?;

        let mut indexed_now = BTreeSet::new();
        for reference in resolved {
            let target = &reference.guid;
            let already_indexed = indexed.get(target).copied().unwrap_or(false);
            let on_path = ref_path.iter().any(|g| g.parent() == target.parent());
            if !already_indexed && !on_path && !indexed_now.contains(target) {
                debug!(guid = %target, depth = ref_path.len(), "Indexing referenced object");
                self.pipeline
                    .index_object(
                        target,
                        &reference.storage_object_type,
                        Some(reference.timestamp),
                        false,
                        Some(&mut *self.cache),
                        ref_path,
                    )
                    .await?;
                indexed_now.insert(target.clone());
            }
            self.cache.resolved_refs.insert(
                full_path(&reference.reference),
                reference.resolved_reference.clone(),
            );
            canonical.insert(reference.resolved_reference);
        }
        Ok(canonical)
    }

    async fn lookup_objects_by_guid(
        &mut self,
        guids: &BTreeSet<Guid>,
    ) -> Result<BTreeMap<Guid, ObjectData>, IndexingError> {
        let misses: BTreeSet<Guid> = guids
            .iter()
            .filter(|g| !self.cache.objects.contains_key(*g))
            .cloned()
            .collect();
        if !misses.is_empty() {
            let loaded = self
                .pipeline
                .indexing_storage()
                .get_objects_by_ids(&misses, PostProcessing::info_and_keys())
                .await?;
            for object in loaded {
                if let Some(guid) = object.guid.clone() {
                    self.cache.objects.insert(guid, object);
                }
            }
        }
        Ok(guids
            .iter()
            .filter_map(|g| self.cache.objects.get(g).map(|o| (g.clone(), o.clone())))
            .collect())
    }

    async fn get_type_descriptor(
        &mut self,
        global_object_type: &str,
    ) -> Result<Arc<TypeParsingRule>, IndexingError> {
        self.pipeline
            .type_storage()
            .get_object_type(global_object_type)
            .await
    }

    async fn get_types_for_guids(
        &mut self,
        guids: &BTreeSet<Guid>,
    ) -> Result<BTreeMap<Guid, String>, IndexingError> {
        let misses: BTreeSet<Guid> = guids
            .iter()
            .filter(|g| !self.cache.types.contains_key(*g))
            .cloned()
            .collect();
        if !misses.is_empty() {
            let loaded = self
                .pipeline
                .indexing_storage()
                .get_objects_by_ids(&misses, PostProcessing::info_only())
                .await?;
            for object in loaded {
                if let (Some(guid), Some(type_name)) = (object.guid, object.type_name) {
                    self.cache.types.insert(guid, type_name);
                }
            }
        }
        Ok(guids
            .iter()
            .filter_map(|g| self.cache.types.get(g).map(|t| (g.clone(), t.clone())))
            .collect())
    }
}
