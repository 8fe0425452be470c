//! Index and type-rule storage contracts.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use search_types::{
    AccessFilter, FoundHits, Guid, IndexingRule, MatchFilter, ObjectData, ParsedObject,
    PostProcessing, SearchRequest, SourceData, StorageObjectType, TypeParsingRule,
};

use crate::error::IndexingError;

/// Everything one rule produced for one loaded object.
#[derive(Debug, Clone, Copy)]
pub struct IndexBatch<'a> {
    /// Global type the documents are written under
    pub object_type: &'a str,
    pub source: &'a SourceData,
    pub timestamp: DateTime<Utc>,
    /// Fragment of the parent document shared by sub-object documents
    pub parent_json: Option<&'a str>,
    /// GUID of the loaded (parent) object
    pub guid: &'a Guid,
    /// Documents in extraction order
    pub objects: &'a [(Guid, ParsedObject)],
    pub is_public: bool,
    pub indexing_rules: &'a [IndexingRule],
}

/// The search index.
#[async_trait]
pub trait IndexingStorage: Send + Sync {
    /// Whether each parent GUID already has indexed documents.
    async fn check_parent_guids_exist(
        &self,
        guids: &BTreeSet<Guid>,
    ) -> Result<HashMap<Guid, bool>, IndexingError>;

    async fn index_objects(&self, batch: IndexBatch<'_>) -> Result<(), IndexingError>;

    async fn share_objects(
        &self,
        guids: &BTreeSet<Guid>,
        access_group_id: u32,
        is_public: bool,
    ) -> Result<(), IndexingError>;

    async fn unshare_objects(
        &self,
        guids: &BTreeSet<Guid>,
        access_group_id: u32,
    ) -> Result<(), IndexingError>;

    async fn delete_all_versions(&self, guid: &Guid) -> Result<(), IndexingError>;

    async fn undelete_all_versions(&self, guid: &Guid) -> Result<(), IndexingError>;

    async fn publish_objects(&self, guids: &BTreeSet<Guid>) -> Result<(), IndexingError>;

    async fn unpublish_objects(&self, guids: &BTreeSet<Guid>) -> Result<(), IndexingError>;

    async fn publish_all_versions(&self, guid: &Guid) -> Result<(), IndexingError>;

    async fn unpublish_all_versions(&self, guid: &Guid) -> Result<(), IndexingError>;

    async fn set_name_on_all_object_versions(
        &self,
        guid: &Guid,
        new_name: &str,
    ) -> Result<(), IndexingError>;

    async fn get_objects_by_ids(
        &self,
        guids: &BTreeSet<Guid>,
        post_processing: PostProcessing,
    ) -> Result<Vec<ObjectData>, IndexingError>;

    /// Hit counts per global type.
    async fn search_types(
        &self,
        filter: &MatchFilter,
        access: &AccessFilter,
    ) -> Result<BTreeMap<String, u64>, IndexingError>;

    async fn search_objects(&self, request: &SearchRequest) -> Result<FoundHits, IndexingError>;
}

/// Repository of registered type parsing rules.
#[async_trait]
pub trait TypeStorage: Send + Sync {
    async fn list_object_types(&self) -> Result<Vec<Arc<TypeParsingRule>>, IndexingError>;

    /// Every rule registered for a storage object type; may be several.
    async fn list_object_types_by_storage_object_type(
        &self,
        storage_object_type: &StorageObjectType,
    ) -> Result<Vec<Arc<TypeParsingRule>>, IndexingError>;

    /// Rule for a global type name; a missing rule is [`IndexingError::UnknownType`].
    async fn get_object_type(
        &self,
        global_object_type: &str,
    ) -> Result<Arc<TypeParsingRule>, IndexingError>;
}
