//! Keyword extraction from parsed documents.
//!
//! [`RuleKeywordExtractor`] applies a type's indexing rules to one
//! document. Transforms that reach into other objects go through an
//! [`ObjectLookupProvider`], which may index those objects on the way.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use search_types::{
    Guid, IndexingRule, LocationKind, ObjectData, ParsedObject, RuleSource, SourceData,
    Transform, TypeParsingRule,
};

use crate::error::IndexingError;

/// Lookups keyword extraction needs while resolving cross-object references.
#[async_trait]
pub trait ObjectLookupProvider: Send {
    /// Resolve raw references found in the object at the end of `ref_path`
    /// to canonical references, indexing unseen targets first.
    async fn resolve_refs(
        &mut self,
        ref_path: &[Guid],
        refs: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>, IndexingError>;

    /// Indexed summaries (info and keys) of the given objects.
    async fn lookup_objects_by_guid(
        &mut self,
        guids: &BTreeSet<Guid>,
    ) -> Result<BTreeMap<Guid, ObjectData>, IndexingError>;

    async fn get_type_descriptor(
        &mut self,
        global_object_type: &str,
    ) -> Result<Arc<TypeParsingRule>, IndexingError>;

    /// Indexed global type names of the given objects.
    async fn get_types_for_guids(
        &mut self,
        guids: &BTreeSet<Guid>,
    ) -> Result<BTreeMap<Guid, String>, IndexingError>;
}

/// One document to extract keywords from.
#[derive(Debug, Clone, Copy)]
pub struct ExtractRequest<'a> {
    pub global_object_type: &'a str,
    pub document: &'a Value,
    /// Fragment read by `from_parent` rules
    pub parent: Option<&'a Value>,
    pub rules: &'a [IndexingRule],
    pub source: &'a SourceData,
    /// Path to the loaded object, ending with it
    pub ref_path: &'a [Guid],
}

#[async_trait]
pub trait KeywordExtractor: Send + Sync {
    async fn extract_keywords(
        &self,
        request: ExtractRequest<'_>,
        lookup: &mut dyn ObjectLookupProvider,
    ) -> Result<ParsedObject, IndexingError>;
}

/// Extracts keywords by applying each indexing rule in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleKeywordExtractor;

#[async_trait]
impl KeywordExtractor for RuleKeywordExtractor {
    async fn extract_keywords(
        &self,
        request: ExtractRequest<'_>,
        lookup: &mut dyn ObjectLookupProvider,
    ) -> Result<ParsedObject, IndexingError> {
        let mut parsed = ParsedObject::new().with_json(serde_json::to_string(request.document)?);
        for rule in request.rules {
            let raw = raw_values(rule, &request)?;
            let mut values = match &rule.transform {
                None => flatten(raw),
                Some(transform) => apply_transform(transform, raw, &request, lookup).await?,
            };
            if values.is_empty() {
                if let Some(default) = &rule.default_value {
                    values.push(default.clone());
                }
            }
            for value in values {
                let value = coerce(rule, value)?;
                parsed.add_keyword(rule.key_name(), value);
            }
        }
        Ok(parsed)
    }
}

fn raw_values(rule: &IndexingRule, request: &ExtractRequest<'_>) -> Result<Vec<Value>, IndexingError> {
    match &rule.source {
        RuleSource::SourceKey(key) => {
            if !matches!(
                key.as_str(),
                "name" | "creator" | "copier" | "module" | "method" | "module_version" | "commit_hash"
            ) {
                return Err(IndexingError::Parse(format!("unknown source key: {}", key)));
            }
            Ok(request
                .source
                .source_key(key)
                .map(|v| vec![Value::String(v.to_string())])
                .unwrap_or_default())
        }
        RuleSource::Path(path) => {
            let doc = if rule.from_parent {
                match request.parent {
                    Some(parent) => parent,
                    None => return Ok(Vec::new()),
                }
            } else {
                request.document
            };
            Ok(path
                .select(doc)
                .into_iter()
                .filter(|v| !v.is_null())
                .cloned()
                .collect())
        }
    }
}

fn flatten(values: Vec<Value>) -> Vec<Value> {
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        match value {
            Value::Array(items) => out.extend(items.into_iter().filter(|v| !v.is_null())),
            Value::Null => {}
            other => out.push(other),
        }
    }
    out
}

async fn apply_transform(
    transform: &Transform,
    raw: Vec<Value>,
    request: &ExtractRequest<'_>,
    lookup: &mut dyn ObjectLookupProvider,
) -> Result<Vec<Value>, IndexingError> {
    match transform {
        Transform::Values => {
            let mut out = Vec::new();
            for value in raw {
                match value {
                    Value::Array(items) => out.extend(items),
                    Value::Object(map) => out.extend(map.into_iter().map(|(_, v)| v)),
                    other => out.push(other),
                }
            }
            Ok(out.into_iter().filter(|v| !v.is_null()).collect())
        }
        Transform::String => Ok(flatten(raw)
            .into_iter()
            .map(|v| match v {
                Value::String(s) => Value::String(s),
                other => Value::String(other.to_string()),
            })
            .collect()),
        Transform::Integer => flatten(raw).into_iter().map(|v| to_integer(&v)).collect(),
        Transform::Location(kind) => raw.iter().map(|v| location(v, *kind)).collect(),
        Transform::Lookup { target_key } => {
            let guids = flatten(raw)
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.parse::<Guid>().map_err(IndexingError::from),
                    other => Err(IndexingError::Parse(format!(
                        "lookup transform expects GUID strings, got {}",
                        other
                    ))),
                })
                .collect::<Result<BTreeSet<Guid>, _>>()?;
            if guids.is_empty() {
                return Ok(Vec::new());
            }
            let objects = lookup.lookup_objects_by_guid(&guids).await?;
            Ok(objects
                .values()
                .filter_map(|o| o.key_props.get(target_key))
                .map(|v| Value::String(v.clone()))
                .collect())
        }
        Transform::Guid {
            target_object_type,
            sub_object_id_key,
        } => {
            let refs = flatten(raw)
                .into_iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s),
                    other => Err(IndexingError::Parse(format!(
                        "guid transform expects reference strings, got {}",
                        other
                    ))),
                })
                .collect::<Result<BTreeSet<String>, _>>()?;
            if refs.is_empty() {
                return Ok(Vec::new());
            }
            let target = lookup.get_type_descriptor(target_object_type).await?;
            let storage_code = target.storage_object_type.storage_code;
            let sub_id = match (&target.sub_object, sub_object_id_key) {
                (Some(sub), Some(key)) => request
                    .document
                    .get(key)
                    .and_then(scalar_text)
                    .map(|id| (sub.sub_object_type.clone(), id)),
                _ => None,
            };

            let mut guids = BTreeSet::new();
            for canonical in lookup.resolve_refs(request.ref_path, &refs).await? {
                let guid = Guid::from_reference(storage_code, &canonical)?;
                let guid = match &sub_id {
                    Some((sub_type, id)) => guid.with_sub_object(sub_type, id),
                    None => guid,
                };
                guids.insert(guid);
            }

            let types = lookup.get_types_for_guids(&guids).await?;
            for (guid, type_name) in &types {
                if type_name != target_object_type {
                    return Err(IndexingError::Parse(format!(
                        "{} is of type {}, expected {}",
                        guid, type_name, target_object_type
                    )));
                }
            }
            Ok(guids.into_iter().map(|g| Value::String(g.to_string())).collect())
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn to_integer(value: &Value) -> Result<Value, IndexingError> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Value::Number(n.clone())),
        Value::Number(n) => n
            .as_f64()
            .map(|f| Value::from(f.trunc() as i64))
            .ok_or_else(|| IndexingError::Parse(format!("not an integer: {}", n))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| IndexingError::Parse(format!("not an integer: {}", s))),
        other => Err(IndexingError::Parse(format!("not an integer: {}", other))),
    }
}

/// Pick one part of the first `[contig_id, start, strand, length]` tuple.
fn location(value: &Value, kind: LocationKind) -> Result<Value, IndexingError> {
    let bad = || IndexingError::Parse(format!("malformed location: {}", value));
    let tuple = match value {
        Value::Array(items) => match items.first() {
            Some(Value::Array(first)) => first,
            Some(_) => items,
            None => return Err(bad()),
        },
        _ => return Err(bad()),
    };
    if tuple.len() < 4 {
        return Err(bad());
    }
    let contig = tuple[0].clone();
    let start = tuple[1].as_i64().ok_or_else(bad)?;
    let strand = tuple[2].as_str().ok_or_else(bad)?;
    let length = tuple[3].as_i64().ok_or_else(bad)?;
    let forward = strand == "+";
    Ok(match kind {
        LocationKind::ContigId => contig,
        LocationKind::Strand => Value::String(strand.to_string()),
        LocationKind::Length => Value::from(length),
        LocationKind::Start if forward => Value::from(start),
        LocationKind::Start => Value::from(
            start
                .checked_sub(length)
                .and_then(|v| v.checked_add(1))
                .ok_or_else(bad)?,
        ),
        LocationKind::Stop if forward => Value::from(
            start
                .checked_add(length)
                .and_then(|v| v.checked_sub(1))
                .ok_or_else(bad)?,
        ),
        LocationKind::Stop => Value::from(start),
    })
}

fn coerce(rule: &IndexingRule, value: Value) -> Result<Value, IndexingError> {
    let Some(keyword_type) = rule.keyword_type.as_deref() else {
        return Ok(value);
    };
    let fail = |v: &Value| {
        IndexingError::Parse(format!(
            "{} value {} is not a valid {}",
            rule.key_name(),
            v,
            keyword_type
        ))
    };
    match keyword_type {
        "integer" => to_integer(&value).map_err(|_| fail(&value)),
        "double" | "float" => match &value {
            Value::Number(n) => n.as_f64().map(Value::from).ok_or_else(|| fail(&value)),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::from)
                .map_err(|_| fail(&value)),
            _ => Err(fail(&value)),
        },
        "boolean" => match &value {
            Value::Bool(_) => Ok(value),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            _ => Err(fail(&value)),
        },
        "string" => Ok(match value {
            Value::String(s) => Value::String(s),
            other => Value::String(other.to_string()),
        }),
        other => Err(IndexingError::Parse(format!(
            "unsupported keyword type: {}",
            other
        ))),
    }
}
