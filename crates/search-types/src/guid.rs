//! Globally unique identifiers for indexed objects and sub-objects.
//!
//! Text form: `<storage code>:<access group>/<object id>[/<version>][:<sub type>/<sub id>]`,
//! for example `WS:5/3/1` or `WS:5/3/1:feature/b0001`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Code of the external storage system an object lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StorageCode {
    /// The versioned workspace object store
    #[serde(rename = "WS")]
    Workspace,
}

impl StorageCode {
    /// Short code used in GUIDs and type rules.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageCode::Workspace => "WS",
        }
    }
}

impl fmt::Display for StorageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageCode {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WS" => Ok(StorageCode::Workspace),
            other => Err(ModelError::InvalidGuid(format!(
                "unknown storage code '{}'",
                other
            ))),
        }
    }
}

/// Sub-object segment of a GUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubObject {
    /// Sub-object type, e.g. `feature`
    pub sub_type: String,
    /// Primary key of the sub-object within its parent
    pub id: String,
}

/// Identifier of an object version or one of its sub-objects.
///
/// Immutable value type; used as map key and as index document key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Guid {
    storage_code: StorageCode,
    access_group_id: u32,
    object_id: String,
    version: Option<u32>,
    sub_object: Option<SubObject>,
}

impl Guid {
    /// Create a GUID for a (possibly unversioned) parent object.
    pub fn new(
        storage_code: StorageCode,
        access_group_id: u32,
        object_id: impl Into<String>,
        version: Option<u32>,
    ) -> Self {
        Self {
            storage_code,
            access_group_id,
            object_id: object_id.into(),
            version,
            sub_object: None,
        }
    }

    /// Build a GUID from a storage reference of the form `group/object[/version]`.
    pub fn from_reference(storage_code: StorageCode, reference: &str) -> Result<Self, ModelError> {
        let (access_group_id, object_id, version) = parse_reference(reference)?;
        Ok(Self::new(storage_code, access_group_id, object_id, version))
    }

    /// Return a copy of this GUID pointing at a sub-object of the same parent.
    pub fn with_sub_object(&self, sub_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            sub_object: Some(SubObject {
                sub_type: sub_type.into(),
                id: id.into(),
            }),
            ..self.parent()
        }
    }

    /// The parent object GUID (this GUID without its sub-object segment).
    pub fn parent(&self) -> Self {
        Self {
            storage_code: self.storage_code,
            access_group_id: self.access_group_id,
            object_id: self.object_id.clone(),
            version: self.version,
            sub_object: None,
        }
    }

    pub fn storage_code(&self) -> StorageCode {
        self.storage_code
    }

    pub fn access_group_id(&self) -> u32 {
        self.access_group_id
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn version(&self) -> Option<u32> {
        self.version
    }

    pub fn sub_object(&self) -> Option<&SubObject> {
        self.sub_object.as_ref()
    }

    /// Storage reference of the parent object, `group/object[/version]`.
    pub fn reference(&self) -> String {
        match self.version {
            Some(v) => format!("{}/{}/{}", self.access_group_id, self.object_id, v),
            None => format!("{}/{}", self.access_group_id, self.object_id),
        }
    }
}

fn parse_reference(reference: &str) -> Result<(u32, String, Option<u32>), ModelError> {
    let parts: Vec<&str> = reference.split('/').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(ModelError::InvalidGuid(format!(
            "reference '{}' must be group/object[/version]",
            reference
        )));
    }
    let access_group_id = parts[0].parse::<u32>().map_err(|_| {
        ModelError::InvalidGuid(format!("bad access group id in '{}'", reference))
    })?;
    if parts[1].is_empty() {
        return Err(ModelError::InvalidGuid(format!(
            "missing object id in '{}'",
            reference
        )));
    }
    let version = match parts.get(2) {
        Some(v) => Some(
            v.parse::<u32>()
                .map_err(|_| ModelError::InvalidGuid(format!("bad version in '{}'", reference)))?,
        ),
        None => None,
    };
    Ok((access_group_id, parts[1].to_string(), version))
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.storage_code, self.reference())?;
        if let Some(sub) = &self.sub_object {
            write!(f, ":{}/{}", sub.sub_type, sub.id)?;
        }
        Ok(())
    }
}

impl FromStr for Guid {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let code = parts.next().unwrap_or_default();
        let reference = parts
            .next()
            .ok_or_else(|| ModelError::InvalidGuid(format!("'{}' has no reference part", s)))?;
        let storage_code = code.parse::<StorageCode>()?;
        let mut guid = Guid::from_reference(storage_code, reference)?;
        if let Some(sub) = parts.next() {
            let (sub_type, id) = sub.split_once('/').ok_or_else(|| {
                ModelError::InvalidGuid(format!("sub-object part of '{}' must be type/id", s))
            })?;
            if sub_type.is_empty() || id.is_empty() {
                return Err(ModelError::InvalidGuid(format!(
                    "empty sub-object type or id in '{}'",
                    s
                )));
            }
            guid = guid.with_sub_object(sub_type, id);
        }
        Ok(guid)
    }
}

impl TryFrom<String> for Guid {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Guid> for String {
    fn from(guid: Guid) -> Self {
        guid.to_string()
    }
}
