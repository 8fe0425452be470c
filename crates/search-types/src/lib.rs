//! # search-types
//!
//! Shared domain types for the search indexer.
//!
//! This crate defines the core data structures used throughout the system:
//! - GUIDs: identifiers of indexed objects and sub-objects
//! - Status events: notifications about object store mutations
//! - Rules: type parsing rules, indexing rules, transforms and object paths
//! - Objects: loaded source data, parsed objects, resolved references
//! - Search: the internal search-filter model
//! - Settings: configuration types
//!
//! ## Usage
//!
//! ```rust
//! use search_types::Guid;
//!
//! let guid: Guid = "WS:5/3/1".parse().unwrap();
//! assert_eq!(guid.access_group_id(), 5);
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod guid;
pub mod object;
pub mod rules;
pub mod search;

pub use config::{RetrySettings, RunnerSettings, Settings};
pub use error::ModelError;
pub use event::{
    EventKind, ProcessingState, StatusEvent, StatusEventId, StorageObjectType, StoredStatusEvent,
};
pub use guid::{Guid, StorageCode, SubObject};
pub use object::{ObjectData, ParsedObject, PostProcessing, ResolvedReference, SourceData};
pub use rules::{
    IndexingRule, KeyDescription, LocationKind, ObjectPath, PathSegment, RuleSource,
    SubObjectRule, Transform, TypeDescriptor, TypeParsingRule,
};
pub use search::{
    AccessFilter, FoundHits, MatchFilter, MatchValue, Pagination, SearchRequest, SortingRule,
};
