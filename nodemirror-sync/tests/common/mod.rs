//! Shared test helpers for sync tests.

#![allow(dead_code)]

use nodemirror_manifest::{MANIFEST_FILE_NAME, Manifest, UNITS_FILE_NAME, UnitWriter};
use nodemirror_publish::{PublishReport, Publisher};
use nodemirror_sync::{SyncError, SyncResult, UnitInventory};
use nodemirror_types::{ContentUnit, Keyed, MirrorConfig};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use walkdir::WalkDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Routes `tracing` output to the test harness. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn unit(type_id: &str, name: &str) -> ContentUnit {
    let mut key = BTreeMap::new();
    key.insert("name".to_string(), json!(name));
    ContentUnit::new(type_id, key)
}

/// Parent-side configuration rooted at `root/parent`.
pub fn parent_config(root: &Path) -> MirrorConfig {
    MirrorConfig {
        publish_root: root.join("parent/pub"),
        storage_dir: root.join("parent/storage"),
        archive_threshold_files: 10,
        ..Default::default()
    }
}

/// Child-side configuration rooted at `root/child`.
pub fn child_config(root: &Path) -> MirrorConfig {
    MirrorConfig {
        storage_dir: root.join("child/storage"),
        poll_delay_seconds: 0.0,
        ..Default::default()
    }
}

/// One metadata-only unit, one single file, one directory of 50 files.
pub fn parent_units(root: &Path) -> Vec<ContentUnit> {
    let storage = root.join("parent/storage");
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

pub fn publish(root: &Path, repo_id: &str, units: Vec<ContentUnit>) -> PublishReport {
    Publisher::new(parent_config(root))
        .publish(repo_id, units)
        .unwrap()
}

/// Writes hand-made records as a publication in `dir`. Returns the manifest path.
pub fn publish_records<T: Serialize>(dir: &Path, records: &[T]) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let mut writer = UnitWriter::open(dir.join(UNITS_FILE_NAME)).unwrap();
    for record in records {
        writer.add(record).unwrap();
    }
    let stream = writer.close().unwrap();
    Manifest::write(dir, &stream).unwrap();
    dir.join(MANIFEST_FILE_NAME)
}

/// Every regular file under `dir` (following links), relative and `/`-joined.
pub fn files_under(dir: &Path) -> Vec<(String, PathBuf)> {
    WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .map(Result::unwrap)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let rel = entry
                .path()
                .strip_prefix(dir)
                .unwrap()
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            (rel, entry.into_path())
        })
        .collect()
}

/// Serves every file of the publish root under `/pub/`.
pub async fn serve_publication(server: &MockServer, publish_root: &Path) {
    for (rel, file) in files_under(publish_root) {
        Mock::given(method("GET"))
            .and(path(format!("/pub/{rel}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(fs::read(file).unwrap()))
            .mount(server)
            .await;
    }
}

pub fn manifest_url(server: &MockServer, repo_id: &str) -> String {
    format!("{}/pub/{repo_id}/manifest.json", server.uri())
}

/// In-memory inventory, optionally refusing units of one type.
#[derive(Default)]
pub struct MemoryInventory {
    pub units: Mutex<Vec<ContentUnit>>,
    pub reject_type: Option<String>,
}

impl MemoryInventory {
    pub fn with_units(units: Vec<ContentUnit>) -> Self {
        Self {
            units: Mutex::new(units),
            reject_type: None,
        }
    }

    pub fn snapshot(&self) -> Vec<ContentUnit> {
        self.units.lock().unwrap().clone()
    }

    pub fn find(&self, type_id: &str) -> Option<ContentUnit> {
        self.snapshot().into_iter().find(|u| u.type_id == type_id)
    }
}

impl UnitInventory for MemoryInventory {
    fn units(&self) -> SyncResult<Vec<ContentUnit>> {
        Ok(self.snapshot())
    }

    fn add_unit(&self, unit: ContentUnit) -> SyncResult<()> {
        if self.reject_type.as_deref() == Some(unit.type_id.as_str()) {
            return Err(SyncError::Inventory(format!("{} is read-only", unit.type_id)));
        }
        self.units.lock().unwrap().push(unit);
        Ok(())
    }

    fn remove_unit(&self, unit: &ContentUnit) -> SyncResult<()> {
        let key = unit.unit_key();
        self.units.lock().unwrap().retain(|u| u.unit_key() != key);
        Ok(())
    }
}
