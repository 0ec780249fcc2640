//! Tests for content units and unit keys.

use nodemirror_types::{ContentUnit, DownloadDescriptor, Keyed, PublishedUnit, UnitKey};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{Value, json};
use std::collections::BTreeMap;

fn rpm(name: &str, version: &str) -> ContentUnit {
    let mut key = BTreeMap::new();
    key.insert("name".to_string(), json!(name));
    key.insert("version".to_string(), json!(version));
    ContentUnit::new("rpm", key)
}

// ── UnitKey identity ────────────────────────────────────────────

#[test]
fn same_fields_same_key() {
    assert_eq!(rpm("zsh", "5.9").unit_key(), rpm("zsh", "5.9").unit_key());
}

#[test]
fn different_type_different_key() {
    let a = rpm("zsh", "5.9");
    let mut b = a.clone();
    b.type_id = "srpm".into();
    assert_ne!(a.unit_key(), b.unit_key());
}

#[test]
fn different_field_value_different_key() {
    assert_ne!(rpm("zsh", "5.9").unit_key(), rpm("zsh", "5.8").unit_key());
}

#[test]
fn metadata_does_not_affect_key() {
    let a = rpm("zsh", "5.9").with_metadata("summary", "shell");
    let b = rpm("zsh", "5.9").with_storage_path("/tmp/zsh.rpm");
    assert_eq!(a.unit_key(), b.unit_key());
}

#[test]
fn published_unit_key_matches_inner_unit() {
    let unit = rpm("bash", "5.2");
    let published = PublishedUnit::new(unit.clone());
    assert_eq!(published.unit_key(), unit.unit_key());
    assert_eq!(published.unit_key().type_id(), "rpm");
}

proptest! {
    #[test]
    fn key_independent_of_insertion_order(
        fields in prop::collection::vec(("[a-z]{1,8}", "[a-z0-9]{0,8}"), 1..8)
    ) {
        let forward: BTreeMap<String, Value> =
            fields.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
        let reverse: BTreeMap<String, Value> =
            fields.iter().rev().map(|(k, v)| (k.clone(), json!(v))).collect();
        // Later duplicates win in both maps, so only compare when keys are unique.
        let unique: std::collections::HashSet<_> = fields.iter().map(|(k, _)| k).collect();
        prop_assume!(unique.len() == fields.len());
        prop_assert_eq!(UnitKey::new("t", &forward), UnitKey::new("t", &reverse));
    }
}

// ── Published record serialization ──────────────────────────────

#[test]
fn published_unit_serializes_flat_with_download() {
    let mut record = PublishedUnit::new(rpm("zsh", "5.9").with_storage_path("/content/zsh.rpm"));
    record.relative_path = Some("repo/content/abc".into());
    record.download = Some(DownloadDescriptor {
        url: "https://parent/pub/repo/content/abc".into(),
    });

    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["type_id"], "rpm");
    assert_eq!(value["unit_key"]["name"], "zsh");
    assert_eq!(value["relative_path"], "repo/content/abc");
    assert_eq!(value["published_as_archive"], false);
    assert_eq!(value["_download"]["url"], "https://parent/pub/repo/content/abc");
    assert!(value.get("storage_relative_path").is_none());
}

#[test]
fn published_unit_defaults_when_fields_missing() {
    let record: PublishedUnit =
        serde_json::from_str(r#"{"type_id":"erratum","unit_key":{"id":"RHSA-1"}}"#).unwrap();
    assert_eq!(record.unit.type_id, "erratum");
    assert!(record.unit.metadata.is_empty());
    assert!(record.relative_path.is_none());
    assert!(!record.published_as_archive);
    assert!(!record.has_content());
}
