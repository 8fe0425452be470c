//! Splits a loaded object into the documents one type rule indexes.

use serde_json::{Map, Value};

use search_types::{Guid, RuleSource, TypeParsingRule};

use crate::error::IndexingError;

/// Top-level keys of `data` read by the rule's `from_parent` indexing rules.
///
/// Only sub-object rules have a parent fragment; `None` otherwise or when
/// no indexing rule reads from the parent.
pub fn extract_parent_fragment(rule: &TypeParsingRule, data: &Value) -> Option<Value> {
    if !rule.is_sub_object_rule() {
        return None;
    }
    let keys: Vec<&str> = rule
        .indexing_rules
        .iter()
        .filter(|r| r.from_parent)
        .filter_map(|r| match &r.source {
            RuleSource::Path(path) => path.first_key(),
            RuleSource::SourceKey(_) => None,
        })
        .collect();
    if keys.is_empty() {
        return None;
    }
    let mut fragment = Map::new();
    if let Value::Object(map) = data {
        for key in keys {
            if let Some(value) = map.get(key) {
                fragment.insert(key.to_string(), value.clone());
            }
        }
    }
    Some(Value::Object(fragment))
}

/// One `(guid, document)` pair per indexed document.
///
/// A plain rule yields the whole object under `guid`. A sub-object rule
/// yields every sub-object under `guid` extended with the sub-object type
/// and the value at the primary key path.
pub fn parse_sub_objects(
    data: &Value,
    guid: &Guid,
    rule: &TypeParsingRule,
) -> Result<Vec<(Guid, Value)>, IndexingError> {
    let Some(sub) = &rule.sub_object else {
        return Ok(vec![(guid.clone(), data.clone())]);
    };

    let mut docs = Vec::new();
    for selected in sub.path_to_sub_objects.select(data) {
        let items: Vec<&Value> = match selected {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        for item in items {
            let id = primary_key(item, rule)?;
            docs.push((guid.with_sub_object(&sub.sub_object_type, id), item.clone()));
        }
    }
    Ok(docs)
}

fn primary_key(item: &Value, rule: &TypeParsingRule) -> Result<String, IndexingError> {
    let Some(sub) = &rule.sub_object else {
        return Err(IndexingError::Parse(format!(
            "{} is not a sub-object rule",
            rule.global_object_type
        )));
    };
    match sub.primary_key_path.select(item).first() {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(IndexingError::Parse(format!(
            "{} sub-object primary key at {} is not a scalar: {}",
            rule.global_object_type, sub.primary_key_path, other
        ))),
        None => Err(IndexingError::Parse(format!(
            "{} sub-object has no primary key at {}",
            rule.global_object_type, sub.primary_key_path
        ))),
    }
}
