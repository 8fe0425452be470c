//! Loaded source objects, extraction results and index projections.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::StorageObjectType;
use crate::guid::Guid;

/// Content loaded for one GUID plus its provenance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceData {
    /// Structured object content
    pub data: Value,
    /// Display name of the object
    pub name: String,
    pub creator: String,
    #[serde(default)]
    pub copier: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub module_version: Option<String>,
    #[serde(default)]
    pub commit_hash: Option<String>,
}

impl SourceData {
    pub fn new(data: Value, name: impl Into<String>, creator: impl Into<String>) -> Self {
        Self {
            data,
            name: name.into(),
            creator: creator.into(),
            ..Default::default()
        }
    }

    pub fn with_copier(mut self, copier: impl Into<String>) -> Self {
        self.copier = Some(copier.into());
        self
    }

    /// Record the method that produced this object.
    pub fn with_provenance(
        mut self,
        module: impl Into<String>,
        method: impl Into<String>,
        module_version: impl Into<String>,
        commit_hash: impl Into<String>,
    ) -> Self {
        self.module = Some(module.into());
        self.method = Some(method.into());
        self.module_version = Some(module_version.into());
        self.commit_hash = Some(commit_hash.into());
        self
    }

    /// Value of a flat provenance key, if set.
    pub fn source_key(&self, key: &str) -> Option<&str> {
        match key {
            "name" => Some(self.name.as_str()),
            "creator" => Some(self.creator.as_str()),
            "copier" => self.copier.as_deref(),
            "module" => self.module.as_deref(),
            "method" => self.method.as_deref(),
            "module_version" => self.module_version.as_deref(),
            "commit_hash" => self.commit_hash.as_deref(),
            _ => None,
        }
    }
}

/// Keywords extracted from one (sub-)object, ready for the index write.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParsedObject {
    /// Serialized sub-document kept alongside the keywords
    #[serde(default)]
    pub json: Option<String>,
    pub keywords: BTreeMap<String, Vec<Value>>,
}

impl ParsedObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_json(mut self, json: impl Into<String>) -> Self {
        self.json = Some(json.into());
        self
    }

    pub fn add_keyword(&mut self, key: impl Into<String>, value: Value) {
        self.keywords.entry(key.into()).or_default().push(value);
    }

    pub fn keyword(&self, key: &str) -> Option<&[Value]> {
        self.keywords.get(key).map(Vec::as_slice)
    }
}

/// One textual reference resolved by the object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedReference {
    /// Raw reference as found in the object
    pub reference: String,
    /// Canonical reference form
    pub resolved_reference: String,
    pub guid: Guid,
    pub storage_object_type: StorageObjectType,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// An indexed object as returned by the index.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectData {
    pub guid: Option<Guid>,
    #[serde(default)]
    pub parent_guid: Option<Guid>,
    #[serde(default)]
    pub object_name: Option<String>,
    /// Global type name
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub parent_data: Option<Value>,
    /// Extracted keyword values by key name
    #[serde(default)]
    pub key_props: BTreeMap<String, String>,
}

/// Projection requested when fetching indexed objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PostProcessing {
    pub object_info: bool,
    pub object_data: bool,
    pub object_keys: bool,
}

impl PostProcessing {
    pub fn all() -> Self {
        Self {
            object_info: true,
            object_data: true,
            object_keys: true,
        }
    }

    /// Info and keys without the full document.
    pub fn info_and_keys() -> Self {
        Self {
            object_info: true,
            object_data: false,
            object_keys: true,
        }
    }

    pub fn info_only() -> Self {
        Self {
            object_info: true,
            object_data: false,
            object_keys: false,
        }
    }
}
