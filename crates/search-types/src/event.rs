//! Status events emitted by an external object store.
//!
//! Events are immutable notifications about source-of-truth mutations.
//! Once stored, only their processing state changes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::guid::{Guid, StorageCode};

/// Kind of mutation a status event reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// A new object version was saved
    NewVersion,
    /// An object was removed from its access group
    Deleted,
    /// Every version of an object was deleted
    DeleteAllVersions,
    /// Every version of an object was restored
    UndeleteAllVersions,
    /// An object was shared into another access group
    Shared,
    /// An object was unshared from another access group
    Unshared,
    /// Every version of an object got a new display name
    RenameAllVersions,
    /// Every version of an object became public
    PublishAllVersions,
    /// Every version of an object stopped being public
    UnpublishAllVersions,
    /// Any kind this indexer does not understand
    Unsupported(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::NewVersion => "NEW_VERSION",
            EventKind::Deleted => "DELETED",
            EventKind::DeleteAllVersions => "DELETE_ALL_VERSIONS",
            EventKind::UndeleteAllVersions => "UNDELETE_ALL_VERSIONS",
            EventKind::Shared => "SHARED",
            EventKind::Unshared => "UNSHARED",
            EventKind::RenameAllVersions => "RENAME_ALL_VERSIONS",
            EventKind::PublishAllVersions => "PUBLISH_ALL_VERSIONS",
            EventKind::UnpublishAllVersions => "UNPUBLISH_ALL_VERSIONS",
            EventKind::Unsupported(other) => other,
        }
    }
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        match s {
            "NEW_VERSION" => EventKind::NewVersion,
            "DELETED" => EventKind::Deleted,
            "DELETE_ALL_VERSIONS" => EventKind::DeleteAllVersions,
            "UNDELETE_ALL_VERSIONS" => EventKind::UndeleteAllVersions,
            "SHARED" => EventKind::Shared,
            "UNSHARED" => EventKind::Unshared,
            "RENAME_ALL_VERSIONS" => EventKind::RenameAllVersions,
            "PUBLISH_ALL_VERSIONS" => EventKind::PublishAllVersions,
            "UNPUBLISH_ALL_VERSIONS" => EventKind::UnpublishAllVersions,
            other => EventKind::Unsupported(other.to_string()),
        }
    }
}

impl From<String> for EventKind {
    fn from(s: String) -> Self {
        EventKind::from(s.as_str())
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A storage-specific object type, e.g. `WS:KBaseGenomes.Genome-8`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageObjectType {
    pub storage_code: StorageCode,
    pub type_name: String,
    /// Type version; `None` matches any version
    #[serde(default)]
    pub version: Option<u32>,
}

impl StorageObjectType {
    pub fn new(storage_code: StorageCode, type_name: impl Into<String>) -> Self {
        Self {
            storage_code,
            type_name: type_name.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    /// Whether a rule registered for `self` applies to an object of type `other`.
    pub fn matches(&self, other: &StorageObjectType) -> bool {
        self.storage_code == other.storage_code
            && self.type_name == other.type_name
            && (self.version.is_none() || self.version == other.version)
    }
}

impl fmt::Display for StorageObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.storage_code, self.type_name)?;
        if let Some(v) = self.version {
            write!(f, "-{}", v)?;
        }
        Ok(())
    }
}

/// A notification about one mutation of the object store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    /// Object the event targets
    pub guid: Guid,

    pub kind: EventKind,

    /// Storage type of the target, when the source knows it
    #[serde(default)]
    pub storage_object_type: Option<StorageObjectType>,

    /// Source timestamp (when the mutation happened)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub is_global_accessible: Option<bool>,

    /// New display name for rename events
    #[serde(default)]
    pub new_name: Option<String>,

    /// Access group for share/unshare events
    #[serde(default)]
    pub target_access_group_id: Option<u32>,
}

impl StatusEvent {
    pub fn new(guid: Guid, kind: EventKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            guid,
            kind,
            storage_object_type: None,
            timestamp,
            is_global_accessible: None,
            new_name: None,
            target_access_group_id: None,
        }
    }

    pub fn with_storage_object_type(mut self, storage_object_type: StorageObjectType) -> Self {
        self.storage_object_type = Some(storage_object_type);
        self
    }

    pub fn with_global_accessible(mut self, is_global_accessible: bool) -> Self {
        self.is_global_accessible = Some(is_global_accessible);
        self
    }

    pub fn with_new_name(mut self, new_name: impl Into<String>) -> Self {
        self.new_name = Some(new_name.into());
        self
    }

    pub fn with_target_access_group(mut self, access_group_id: u32) -> Self {
        self.target_access_group_id = Some(access_group_id);
        self
    }

    pub fn storage_code(&self) -> StorageCode {
        self.guid.storage_code()
    }

    pub fn access_group_id(&self) -> u32 {
        self.guid.access_group_id()
    }

    /// Absent flag means not globally accessible.
    pub fn is_global_accessible(&self) -> bool {
        self.is_global_accessible.unwrap_or(false)
    }
}

/// Processing state of a stored event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    /// Stored, not yet looked at
    Unprocessed,
    /// Ready to be picked up
    Ready,
    /// Currently being processed
    Processing,
    /// Visited and processed successfully
    Indexed,
    /// Visited and failed
    Failed,
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessingState::Unprocessed => "unprocessed",
            ProcessingState::Ready => "ready",
            ProcessingState::Processing => "processing",
            ProcessingState::Indexed => "indexed",
            ProcessingState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Queue-assigned identity of a stored event (ULID string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StatusEventId(String);

impl StatusEventId {
    /// Generate a fresh id.
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for StatusEventId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ModelError::InvalidInput(
                "status event id cannot be empty".to_string(),
            ));
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for StatusEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A status event plus its queue identity and processing state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredStatusEvent {
    pub id: StatusEventId,
    pub event: StatusEvent,
    pub state: ProcessingState,
}

impl StoredStatusEvent {
    pub fn new(id: StatusEventId, event: StatusEvent, state: ProcessingState) -> Self {
        Self { id, event, state }
    }
}
