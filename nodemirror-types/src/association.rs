//! Repository/unit associations.

use crate::unit::ContentUnit;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Links a repository to a unit. Queried, never mutated, by this workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub repo_id: String,
    pub unit_id: String,
    pub unit_type_id: String,
    /// Which subsystem created the association (e.g. "importer").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

/// A unit joined with its association, as yielded by the unit enumerator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociatedUnit {
    pub unit_id: String,
    pub unit: ContentUnit,
    pub association: Association,
    /// `storage_path` relative to the storage root; `None` without a payload.
    pub relative_path: Option<String>,
}
