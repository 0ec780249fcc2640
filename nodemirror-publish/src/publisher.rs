//! Content-addressed publisher.
//!
//! Layout under the publish root:
//!
//! ```text
//! <publish_root>/<repo_id>/manifest.json
//! <publish_root>/<repo_id>/units.json.gz
//! <publish_root>/<repo_id>/content/<sha256(storage_path)>[.tar.gz]
//! ```

use crate::address;
use crate::archive;
use crate::enumerator::UnitEnumerator;
use crate::error::{PublishError, PublishResult};
use crate::store::UnitStore;
use nodemirror_manifest::{Manifest, UNITS_FILE_NAME, UnitWriter};
use nodemirror_types::{
    ContentUnit, DownloadDescriptor, MirrorConfig, PublishedUnit, relative_to_storage,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory (under the repository's publish dir) holding content links.
pub const CONTENT_DIR: &str = "content";

/// Outcome of one publish.
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub manifest: Manifest,
    pub manifest_path: PathBuf,
    /// Units published as a single link.
    pub linked: usize,
    /// Directory units published as one archive.
    pub archived: usize,
    /// Units without a payload.
    pub metadata_only: usize,
}

/// Builds the link tree and manifest for a repository.
pub struct Publisher {
    config: MirrorConfig,
}

impl Publisher {
    pub fn new(config: MirrorConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// The repository's publish directory.
    pub fn repo_dir(&self, repo_id: &str) -> PathBuf {
        self.config.publish_root.join(repo_id)
    }

    /// Publishes `units` in order.
    pub fn publish<I>(&self, repo_id: &str, units: I) -> PublishResult<PublishReport>
    where
        I: IntoIterator<Item = ContentUnit>,
    {
        self.publish_from(repo_id, units.into_iter().map(Ok))
    }

    /// Publishes every unit associated with `repo_id` in `store`.
    pub fn publish_repository<S>(&self, store: &S, repo_id: &str) -> PublishResult<PublishReport>
    where
        S: UnitStore + ?Sized,
    {
        let units = UnitEnumerator::new(store, &self.config).enumerate(repo_id)?;
        self.publish_from(repo_id, units.map(|r| r.map(|associated| associated.unit)))
    }

    fn publish_from<I>(&self, repo_id: &str, units: I) -> PublishResult<PublishReport>
    where
        I: Iterator<Item = PublishResult<ContentUnit>>,
    {
        let repo_dir = self.repo_dir(repo_id);
        create_dir(&repo_dir.join(CONTENT_DIR))?;
        info!("Publishing repository {} to {}", repo_id, repo_dir.display());

        let mut writer = UnitWriter::open(repo_dir.join(UNITS_FILE_NAME))?;
        let (mut linked, mut archived, mut metadata_only) = (0, 0, 0);
        for unit in units {
            let record = self.publish_unit(repo_id, unit?)?;
            match (&record.relative_path, record.published_as_archive) {
                (None, _) => metadata_only += 1,
                (Some(_), true) => archived += 1,
                (Some(_), false) => linked += 1,
            }
            writer.add(&record)?;
        }

        // The manifest goes last so it never describes an unfinished stream.
        let stream = writer.close()?;
        let manifest = Manifest::write(&repo_dir, &stream)?;
        info!(
            "Published {} units for {} ({} linked, {} archived, {} metadata-only)",
            manifest.unit_count, repo_id, linked, archived, metadata_only
        );

        Ok(PublishReport {
            manifest_path: repo_dir.join(nodemirror_manifest::MANIFEST_FILE_NAME),
            manifest,
            linked,
            archived,
            metadata_only,
        })
    }

    fn publish_unit(&self, repo_id: &str, unit: ContentUnit) -> PublishResult<PublishedUnit> {
        let mut record = PublishedUnit::new(unit);
        let Some(storage_path) = record.unit.storage_path.clone() else {
            return Ok(record);
        };

        let source = Path::new(&storage_path);
        let mut relative = format!("{repo_id}/{CONTENT_DIR}/{}", address::encode(&storage_path));
        let files = if source.is_dir() {
            Some(archive::walk_files(source)?)
        } else {
            None
        };

        match files {
            Some(files) if files.len() > self.config.archive_threshold_files => {
                relative.push_str(&self.config.archive_suffix);
                let target = self.config.publish_root.join(&relative);
                create_parent(&target)?;
                archive::bundle(source, &files, &target).map_err(|source| {
                    PublishError::Archive {
                        path: target.clone(),
                        source,
                    }
                })?;
                debug!("Archived {} files from {}", files.len(), storage_path);
                record.published_as_archive = true;
            }
            _ => {
                let target = self.config.publish_root.join(&relative);
                create_parent(&target)?;
                link(source, &target)?;
            }
        }

        record.storage_relative_path = Some(relative_to_storage(&self.config.storage_dir, &storage_path));
        record.download = self.config.base_url.as_deref().map(|base| DownloadDescriptor {
            url: format!("{}/{}", base.trim_end_matches('/'), relative),
        });
        record.relative_path = Some(relative);
        Ok(record)
    }
}

fn create_dir(path: &Path) -> PublishResult<()> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(source) => Err(PublishError::CreateDir {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn create_parent(path: &Path) -> PublishResult<()> {
    match path.parent() {
        Some(parent) => create_dir(parent),
        None => Ok(()),
    }
}

/// Links `target` to `source`. An existing link is left in place.
fn link(source: &Path, target: &Path) -> PublishResult<()> {
    #[cfg(unix)]
    let result = std::os::unix::fs::symlink(source, target);
    #[cfg(not(unix))]
    let result = fs::copy(source, target).map(|_| ());

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            debug!("Link {} already exists", target.display());
            Ok(())
        }
        Err(source) => Err(PublishError::Link {
            path: target.to_path_buf(),
            source,
        }),
    }
}
