//! Tests for publishing repositories to the publish root.

use flate2::read::GzDecoder;
use nodemirror_manifest::{MANIFEST_FILE_NAME, Manifest, UnitReader};
use nodemirror_publish::{PublishError, Publisher, encode};
use nodemirror_types::{ContentUnit, MirrorConfig, PublishedUnit};
use serde_json::json;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::Path;

fn unit(type_id: &str, name: &str) -> ContentUnit {
    let mut key = BTreeMap::new();
    key.insert("name".to_string(), json!(name));
    ContentUnit::new(type_id, key)
}

fn config(root: &Path) -> MirrorConfig {
    MirrorConfig {
        publish_root: root.join("pub"),
        storage_dir: root.join("storage"),
        archive_threshold_files: 10,
        ..Default::default()
    }
}

fn read_records(manifest_path: &Path) -> Vec<PublishedUnit> {
    let manifest = Manifest::read(manifest_path).unwrap();
    let dir = manifest_path.parent().unwrap();
    UnitReader::open(manifest.units_path(dir))
        .unwrap()
        .map(Result::unwrap)
        .collect()
}

/// One metadata-only unit, one single file, one directory of 50 files.
fn scenario(root: &Path) -> Vec<ContentUnit> {
    let storage = root.join("storage");
    fs::create_dir_all(storage.join("rpm")).unwrap();
    let file = storage.join("rpm/zsh-5.9.rpm");
    fs::write(&file, b"rpm payload").unwrap();

    let tree = storage.join("tree/ks");
    fs::create_dir_all(&tree).unwrap();
    for i in 0..50 {
        fs::write(tree.join(format!("file-{i:02}.img")), format!("image {i}")).unwrap();
    }

    vec![
        unit("erratum", "RHSA-2013:0001"),
        unit("rpm", "zsh").with_storage_path(file.to_string_lossy()),
        unit("distribution", "ks").with_storage_path(tree.to_string_lossy()),
    ]
}

// ── Publish scenario ────────────────────────────────────────────

#[test]
fn publish_mixed_units() {
    let root = tempfile::tempdir().unwrap();
    let units = scenario(root.path());
    let publisher = Publisher::new(config(root.path()));

    let report = publisher.publish("zoo", units.clone()).unwrap();
    assert_eq!(report.manifest.unit_count, 3);
    assert_eq!(report.metadata_only, 1);
    assert_eq!(report.linked, 1);
    assert_eq!(report.archived, 1);

    let records = read_records(&report.manifest_path);
    assert_eq!(records.len(), 3);

    // Metadata-only unit has no file reference.
    assert_eq!(records[0].unit, units[0]);
    assert!(records[0].relative_path.is_none());
    assert!(!records[0].published_as_archive);

    // Single file is a real symlink named by the hash of its path.
    let storage_path = units[1].storage_path.clone().unwrap();
    let relative = records[1].relative_path.clone().unwrap();
    assert_eq!(relative, format!("zoo/content/{}", encode(&storage_path)));
    assert!(!records[1].published_as_archive);
    let link = root.path().join("pub").join(&relative);
    assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    assert_eq!(fs::read_link(&link).unwrap(), Path::new(&storage_path));
    assert_eq!(records[1].storage_relative_path.as_deref(), Some("rpm/zsh-5.9.rpm"));

    // Large directory is bundled into a tar archive with every file.
    assert!(records[2].published_as_archive);
    let relative = records[2].relative_path.clone().unwrap();
    assert!(relative.ends_with(".tar.gz"));
    let archive = File::open(root.path().join("pub").join(&relative)).unwrap();
    let mut tar = tar::Archive::new(GzDecoder::new(archive));
    let entries = tar.entries().unwrap().count();
    assert_eq!(entries, 50);
}

#[test]
fn small_directory_is_linked_not_archived() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("storage/tree/small");
    fs::create_dir_all(&dir).unwrap();
    for i in 0..3 {
        fs::write(dir.join(format!("{i}.txt")), "x").unwrap();
    }
    let publisher = Publisher::new(config(root.path()));

    let report = publisher
        .publish("zoo", vec![unit("tree", "small").with_storage_path(dir.to_string_lossy())])
        .unwrap();
    let records = read_records(&report.manifest_path);
    assert!(!records[0].published_as_archive);
    let link = root.path().join("pub").join(records[0].relative_path.as_ref().unwrap());
    assert!(fs::symlink_metadata(link).unwrap().file_type().is_symlink());
}

#[test]
fn publish_empty_repository() {
    let root = tempfile::tempdir().unwrap();
    let publisher = Publisher::new(config(root.path()));

    let report = publisher.publish("empty", Vec::new()).unwrap();
    assert_eq!(report.manifest.unit_count, 0);
    assert!(read_records(&report.manifest_path).is_empty());
    assert!(root.path().join("pub/empty/content").is_dir());
}

// ── Idempotence ─────────────────────────────────────────────────

#[test]
fn republish_is_idempotent() {
    let root = tempfile::tempdir().unwrap();
    let units = scenario(root.path());
    let publisher = Publisher::new(config(root.path()));

    let first = publisher.publish("zoo", units.clone()).unwrap();
    let first_records = read_records(&first.manifest_path);
    let second = publisher.publish("zoo", units).unwrap();
    let second_records = read_records(&second.manifest_path);

    assert_eq!(first.manifest, second.manifest);
    assert_eq!(first_records, second_records);
    let content: Vec<_> = fs::read_dir(root.path().join("pub/zoo/content")).unwrap().collect();
    assert_eq!(content.len(), 2);
}

// ── Download descriptors ────────────────────────────────────────

#[test]
fn base_url_adds_download_descriptor() {
    let root = tempfile::tempdir().unwrap();
    let units = scenario(root.path());
    let publisher = Publisher::new(MirrorConfig {
        base_url: Some("https://parent.example.com/pub/".into()),
        ..config(root.path())
    });

    let report = publisher.publish("zoo", units).unwrap();
    let records = read_records(&report.manifest_path);
    assert!(records[0].download.is_none());
    let relative = records[1].relative_path.as_ref().unwrap();
    assert_eq!(
        records[1].download.as_ref().unwrap().url,
        format!("https://parent.example.com/pub/{relative}")
    );
}

// ── Failures ────────────────────────────────────────────────────

#[test]
fn unwritable_content_dir_aborts_before_manifest() {
    let root = tempfile::tempdir().unwrap();
    let units = scenario(root.path());
    fs::create_dir_all(root.path().join("pub/zoo")).unwrap();
    // A file where the content directory should be.
    fs::write(root.path().join("pub/zoo/content"), "not a directory").unwrap();

    let publisher = Publisher::new(config(root.path()));
    let result = publisher.publish("zoo", units);

    assert!(matches!(result, Err(PublishError::CreateDir { .. })));
    assert!(!root.path().join("pub/zoo").join(MANIFEST_FILE_NAME).exists());
}
