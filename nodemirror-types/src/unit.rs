//! Content units, their natural-key identity, and published unit records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path};

/// An addressable piece of content (e.g. a package).
///
/// Units are created and updated by the content-management layer; the
/// mirroring core only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentUnit {
    /// Schema/content family of the unit (e.g. "rpm").
    pub type_id: String,
    /// Natural key of the unit within its type.
    pub unit_key: BTreeMap<String, Value>,
    /// Type-specific descriptive fields. Never read by name in this workspace.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Absolute path of the unit's payload, if it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
}

impl ContentUnit {
    /// Creates a metadata-only unit.
    pub fn new(type_id: impl Into<String>, unit_key: BTreeMap<String, Value>) -> Self {
        Self {
            type_id: type_id.into(),
            unit_key,
            metadata: Map::new(),
            storage_path: None,
        }
    }

    /// Sets the payload path.
    #[must_use]
    pub fn with_storage_path(mut self, path: impl Into<String>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    /// Adds one metadata field.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Hashable identity of a unit: its type plus its sorted key fields.
///
/// Two units with the same `type_id` and the same unit_key fields (in any
/// order) produce equal keys. Used for set membership only, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitKey {
    type_id: String,
    fields: Vec<(String, String)>,
}

impl UnitKey {
    /// Builds the key from a type id and a unit_key mapping.
    pub fn new(type_id: &str, unit_key: &BTreeMap<String, Value>) -> Self {
        // Values keep their JSON encoding so `1` and `"1"` stay distinct.
        let mut fields: Vec<(String, String)> = unit_key
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect();
        fields.sort();
        Self {
            type_id: type_id.to_string(),
            fields,
        }
    }

    /// Returns the type id component.
    pub fn type_id(&self) -> &str {
        &self.type_id
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{{", self.type_id)?;
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{k}={v}")?;
        }
        write!(f, "}}")
    }
}

/// Anything that can be reduced to a `UnitKey`.
pub trait Keyed {
    fn unit_key(&self) -> UnitKey;
}

impl<T: Keyed + ?Sized> Keyed for &T {
    fn unit_key(&self) -> UnitKey {
        (**self).unit_key()
    }
}

impl Keyed for ContentUnit {
    fn unit_key(&self) -> UnitKey {
        UnitKey::new(&self.type_id, &self.unit_key)
    }
}

impl Keyed for PublishedUnit {
    fn unit_key(&self) -> UnitKey {
        self.unit.unit_key()
    }
}

/// Where a published unit's payload can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadDescriptor {
    pub url: String,
}

/// A unit plus the fields added when it was published.
///
/// These are the exact records serialized, one per line, into a unit stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedUnit {
    #[serde(flatten)]
    pub unit: ContentUnit,
    /// Location of the link or archive under the publish root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
    /// Location of the payload relative to the parent's storage root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_relative_path: Option<String>,
    /// True when a directory payload was bundled into a compressed tar.
    #[serde(default)]
    pub published_as_archive: bool,
    #[serde(rename = "_download", default, skip_serializing_if = "Option::is_none")]
    pub download: Option<DownloadDescriptor>,
}

impl PublishedUnit {
    /// Wraps a unit with no publish-specific fields set.
    pub fn new(unit: ContentUnit) -> Self {
        Self {
            unit,
            relative_path: None,
            storage_relative_path: None,
            published_as_archive: false,
            download: None,
        }
    }

    /// Returns true if the record references a payload.
    pub fn has_content(&self) -> bool {
        self.relative_path.is_some() || self.download.is_some()
    }
}

/// Strips `storage_dir` from `storage_path`, yielding a `/`-separated
/// relative path.
///
/// Paths outside the storage root keep their own components with the root
/// and any `..` segments dropped, so the result is always relative.
pub fn relative_to_storage(storage_dir: &Path, storage_path: &str) -> String {
    let path = Path::new(storage_path);
    let relative = path.strip_prefix(storage_dir).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
