//! Internal search-filter model used by index storage queries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::object::ObjectData;

/// Matching condition on one keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchValue {
    Value(String),
    IntRange { min: Option<i64>, max: Option<i64> },
    FloatRange { min: Option<f64>, max: Option<f64> },
    Bool(bool),
}

/// Which access groups a search may see.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessFilter {
    pub access_group_ids: Vec<u32>,
    pub with_public: bool,
    pub with_all_history: bool,
}

/// Filter combining full-text, object name and keyword conditions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchFilter {
    #[serde(default)]
    pub full_text_in_all: Option<String>,
    #[serde(default)]
    pub object_name: Option<String>,
    #[serde(default)]
    pub lookup_in_keys: BTreeMap<String, MatchValue>,
    #[serde(default)]
    pub exclude_subobjects: bool,
}

impl MatchFilter {
    pub fn full_text(text: impl Into<String>) -> Self {
        Self {
            full_text_in_all: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<String>, value: MatchValue) -> Self {
        self.lookup_in_keys.insert(key.into(), value);
        self
    }
}

/// One sort criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortingRule {
    /// Object property (e.g. `timestamp`) or keyword name
    pub key: String,
    pub is_object_property: bool,
    pub ascending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub start: usize,
    pub count: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { start: 0, count: 50 }
    }
}

/// A paginated, filtered, sorted search over one or more global types.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    pub object_types: Vec<String>,
    pub filter: MatchFilter,
    pub sorting: Vec<SortingRule>,
    pub access: AccessFilter,
    pub pagination: Pagination,
}

/// One page of search hits.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FoundHits {
    pub pagination: Pagination,
    pub total: u64,
    pub objects: Vec<ObjectData>,
}
