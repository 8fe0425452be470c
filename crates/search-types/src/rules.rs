//! Type parsing rules: how a storage object type becomes indexed documents.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ModelError;
use crate::event::StorageObjectType;

/// One step of an [`ObjectPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Map key (or array index when it parses as a number)
    Key(String),
    /// Every element of an array or every value of a map
    Wildcard,
}

/// A structural path into a JSON document, e.g. `/features/[*]/id`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectPath {
    segments: Vec<PathSegment>,
}

impl ObjectPath {
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// First map key of the path, if any.
    pub fn first_key(&self) -> Option<&str> {
        self.segments.iter().find_map(|s| match s {
            PathSegment::Key(k) => Some(k.as_str()),
            PathSegment::Wildcard => None,
        })
    }

    /// Select every value the path reaches in `doc`, in document order.
    pub fn select<'a>(&self, doc: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![doc];
        for segment in &self.segments {
            let mut next = Vec::new();
            for value in current {
                match segment {
                    PathSegment::Key(key) => match value {
                        Value::Object(map) => {
                            if let Some(v) = map.get(key) {
                                next.push(v);
                            }
                        }
                        Value::Array(items) => {
                            if let Some(v) = key.parse::<usize>().ok().and_then(|i| items.get(i)) {
                                next.push(v);
                            }
                        }
                        _ => {}
                    },
                    PathSegment::Wildcard => match value {
                        Value::Object(map) => next.extend(map.values()),
                        Value::Array(items) => next.extend(items.iter()),
                        _ => {}
                    },
                }
            }
            current = next;
        }
        current
    }
}

impl FromStr for ObjectPath {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        let mut segments = Vec::new();
        for part in trimmed.split('/') {
            match part {
                "" => {
                    return Err(ModelError::InvalidPath(format!(
                        "empty segment in path '{}'",
                        s
                    )))
                }
                "*" | "[*]" => segments.push(PathSegment::Wildcard),
                key => segments.push(PathSegment::Key(key.to_string())),
            }
        }
        Ok(Self { segments })
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            match segment {
                PathSegment::Key(k) => write!(f, "/{}", k)?,
                PathSegment::Wildcard => f.write_str("/[*]")?,
            }
        }
        Ok(())
    }
}

/// Which part of a location tuple a `location` transform extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationKind {
    ContigId,
    Start,
    Stop,
    Length,
    Strand,
}

impl FromStr for LocationKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contig_id" => Ok(LocationKind::ContigId),
            "start" => Ok(LocationKind::Start),
            "stop" => Ok(LocationKind::Stop),
            "length" => Ok(LocationKind::Length),
            "strand" => Ok(LocationKind::Strand),
            other => Err(ModelError::InvalidRule(format!(
                "illegal transform location: {}",
                other
            ))),
        }
    }
}

/// How a raw field value becomes an index value.
///
/// Build through the constructors so the per-variant invariants hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    /// Index the values of a container
    Values,
    String,
    Integer,
    Location(LocationKind),
    /// Read `target_key` from the indexed object the value points at
    Lookup { target_key: String },
    /// Build a GUID for an object of `target_object_type`
    Guid {
        target_object_type: String,
        sub_object_id_key: Option<String>,
    },
}

impl Transform {
    pub fn location(kind: LocationKind) -> Self {
        Transform::Location(kind)
    }

    pub fn lookup(target_key: impl Into<String>) -> Result<Self, ModelError> {
        let target_key = non_empty(target_key.into(), "lookup transform target key")?;
        Ok(Transform::Lookup { target_key })
    }

    pub fn guid(
        target_object_type: impl Into<String>,
        sub_object_id_key: Option<String>,
    ) -> Result<Self, ModelError> {
        let target_object_type = non_empty(target_object_type.into(), "guid target object type")?;
        Ok(Transform::Guid {
            target_object_type,
            sub_object_id_key: sub_object_id_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Parse a rule-file transform string such as `location.start` or `lookup.name`.
    ///
    /// The part after the first `.` is the location kind or the lookup target key.
    pub fn parse(
        text: &str,
        target_object_type: Option<&str>,
        sub_object_id_key: Option<&str>,
    ) -> Result<Self, ModelError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ModelError::InvalidRule(
                "transform cannot be empty".to_string(),
            ));
        }
        let (name, property) = match text.split_once('.') {
            Some((name, prop)) => (name, Some(prop)),
            None => (text, None),
        };
        match name {
            "values" => Ok(Transform::Values),
            "string" => Ok(Transform::String),
            "integer" => Ok(Transform::Integer),
            "location" => {
                let prop = property.filter(|p| !p.trim().is_empty()).ok_or_else(|| {
                    ModelError::InvalidRule("location transform requires a location kind".into())
                })?;
                Ok(Transform::Location(prop.parse()?))
            }
            "lookup" => Transform::lookup(property.unwrap_or_default()),
            "guid" => Transform::guid(
                target_object_type.unwrap_or_default(),
                sub_object_id_key.map(str::to_string),
            ),
            other => Err(ModelError::InvalidRule(format!(
                "illegal transform type: {}",
                other
            ))),
        }
    }
}

fn non_empty(value: String, what: &str) -> Result<String, ModelError> {
    if value.trim().is_empty() {
        Err(ModelError::InvalidRule(format!("{} cannot be empty", what)))
    } else {
        Ok(value)
    }
}

/// Where an indexing rule reads its raw value from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSource {
    /// A structural path into the (sub-)document
    Path(ObjectPath),
    /// A flat key of the object's provenance data
    SourceKey(String),
}

/// Describes one extractable key of an indexed document.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexingRule {
    pub source: RuleSource,
    key_name: Option<String>,
    pub full_text: bool,
    pub from_parent: bool,
    pub not_indexed: bool,
    pub ui_hidden: bool,
    pub keyword_type: Option<String>,
    pub default_value: Option<Value>,
    pub transform: Option<Transform>,
    pub ui_name: Option<String>,
    pub ui_link_key: Option<String>,
}

impl IndexingRule {
    pub fn from_path(path: ObjectPath) -> Self {
        Self::with_source(RuleSource::Path(path), None)
    }

    pub fn from_source_key(
        source_key: impl Into<String>,
        key_name: impl Into<String>,
    ) -> Result<Self, ModelError> {
        let source_key = non_empty(source_key.into(), "source key")?;
        let key_name = non_empty(key_name.into(), "key name for a source key rule")?;
        Ok(Self::with_source(
            RuleSource::SourceKey(source_key),
            Some(key_name),
        ))
    }

    fn with_source(source: RuleSource, key_name: Option<String>) -> Self {
        Self {
            source,
            key_name,
            full_text: false,
            from_parent: false,
            not_indexed: false,
            ui_hidden: false,
            keyword_type: None,
            default_value: None,
            transform: None,
            ui_name: None,
            ui_link_key: None,
        }
    }

    pub fn with_key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = Some(key_name.into());
        self
    }

    pub fn with_full_text(mut self) -> Self {
        self.full_text = true;
        self
    }

    pub fn with_from_parent(mut self) -> Self {
        self.from_parent = true;
        self
    }

    pub fn with_not_indexed(mut self) -> Self {
        self.not_indexed = true;
        self
    }

    pub fn with_ui_hidden(mut self) -> Self {
        self.ui_hidden = true;
        self
    }

    pub fn with_keyword_type(mut self, keyword_type: impl Into<String>) -> Self {
        self.keyword_type = Some(keyword_type.into());
        self
    }

    pub fn with_default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_ui_name(mut self, ui_name: impl Into<String>) -> Self {
        self.ui_name = Some(ui_name.into());
        self
    }

    pub fn with_ui_link_key(mut self, link_key: impl Into<String>) -> Self {
        self.ui_link_key = Some(link_key.into());
        self
    }

    /// Name of the index key this rule fills.
    ///
    /// Path rules without an explicit name use the first key of their path.
    pub fn key_name(&self) -> &str {
        if let Some(name) = &self.key_name {
            return name;
        }
        match &self.source {
            RuleSource::Path(path) => path.first_key().unwrap_or_default(),
            RuleSource::SourceKey(key) => key,
        }
    }
}

/// Marks a rule as producing one document per sub-object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubObjectRule {
    pub sub_object_type: String,
    pub path_to_sub_objects: ObjectPath,
    pub primary_key_path: ObjectPath,
}

/// Binds a storage object type to a global type and its indexing rules.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeParsingRule {
    pub global_object_type: String,
    pub storage_object_type: StorageObjectType,
    pub ui_type_name: Option<String>,
    pub sub_object: Option<SubObjectRule>,
    pub indexing_rules: Vec<IndexingRule>,
}

impl TypeParsingRule {
    pub fn new(
        global_object_type: impl Into<String>,
        storage_object_type: StorageObjectType,
    ) -> Result<Self, ModelError> {
        let global_object_type = non_empty(global_object_type.into(), "global object type")?;
        Ok(Self {
            global_object_type,
            storage_object_type,
            ui_type_name: None,
            sub_object: None,
            indexing_rules: Vec::new(),
        })
    }

    pub fn with_ui_type_name(mut self, name: impl Into<String>) -> Self {
        self.ui_type_name = Some(name.into());
        self
    }

    pub fn with_sub_objects(
        mut self,
        sub_object_type: impl Into<String>,
        path_to_sub_objects: ObjectPath,
        primary_key_path: ObjectPath,
    ) -> Result<Self, ModelError> {
        let sub_object_type = non_empty(sub_object_type.into(), "sub-object type")?;
        self.sub_object = Some(SubObjectRule {
            sub_object_type,
            path_to_sub_objects,
            primary_key_path,
        });
        Ok(self)
    }

    pub fn with_indexing_rule(mut self, rule: IndexingRule) -> Self {
        self.indexing_rules.push(rule);
        self
    }

    pub fn is_sub_object_rule(&self) -> bool {
        self.sub_object.is_some()
    }

    /// Descriptor of this type for search front ends.
    pub fn type_descriptor(&self) -> TypeDescriptor {
        let keys = self
            .indexing_rules
            .iter()
            .filter(|r| !r.not_indexed)
            .map(|r| {
                let key_name = r.key_name().to_string();
                KeyDescription {
                    ui_title: r.ui_name.clone().unwrap_or_else(|| guess_ui_name(&key_name)),
                    value_type: r
                        .keyword_type
                        .clone()
                        .unwrap_or_else(|| "string".to_string()),
                    hidden: r.ui_hidden,
                    link_key: r.ui_link_key.clone(),
                    key_name,
                }
            })
            .collect();
        TypeDescriptor {
            type_name: self.global_object_type.clone(),
            ui_title: self
                .ui_type_name
                .clone()
                .unwrap_or_else(|| guess_ui_name(&self.global_object_type)),
            keys,
        }
    }
}

fn guess_ui_name(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Search-facing description of one indexed key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDescription {
    pub key_name: String,
    pub ui_title: String,
    pub value_type: String,
    pub hidden: bool,
    pub link_key: Option<String>,
}

/// Search-facing description of one global type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub type_name: String,
    pub ui_title: String,
    pub keys: Vec<KeyDescription>,
}
