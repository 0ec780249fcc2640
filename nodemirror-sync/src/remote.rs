//! Child-side view of a parent's publication.
//!
//! The manifest header is fetched first and checked for format compatibility
//! before the (possibly large) unit stream is requested.

use crate::download::{DownloadRequest, Downloader};
use crate::error::{SyncError, SyncResult};
use flate2::read::GzDecoder;
use nodemirror_manifest::{
    MANIFEST_FILE_NAME, MANIFEST_VERSION, Manifest, UnitReader, count_units, decompress,
};
use nodemirror_types::{Keyed, PublishedUnit, UnitKey};
use reqwest::Url;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Where a unit's payload lives on the parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRef {
    url: Option<String>,
    archive: bool,
}

impl ContentRef {
    /// Absolute URL of the payload, if the unit has one.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// True when the payload is a bundled directory.
    pub fn is_archive(&self) -> bool {
        self.archive
    }

    pub fn has_content(&self) -> bool {
        self.url.is_some()
    }

    /// The transfer that delivers this payload for `destination`.
    ///
    /// Archives are downloaded beside the destination and unpacked by
    /// [`ContentRef::complete`].
    pub fn download_request(&self, destination: &Path) -> Option<DownloadRequest> {
        let url = self.url.as_ref()?;
        let target = if self.archive {
            staging_path(destination)
        } else {
            destination.to_path_buf()
        };
        Some(DownloadRequest::new(url.clone(), target))
    }

    /// Finishes a successful transfer: unpacks archives into `destination`.
    pub async fn complete(&self, destination: &Path) -> SyncResult<()> {
        if !self.archive {
            return Ok(());
        }
        let archive = staging_path(destination);
        let target = destination.to_path_buf();
        tokio::task::spawn_blocking(move || unpack(&archive, &target))
            .await
            .map_err(|e| SyncError::Io(io::Error::other(e)))??;
        Ok(())
    }

    /// Downloads the payload to `destination` and completes it.
    pub async fn fetch(&self, downloader: &dyn Downloader, destination: &Path) -> SyncResult<u64> {
        let Some(request) = self.download_request(destination) else {
            return Ok(0);
        };
        let bytes = downloader.download_one(request).await?;
        self.complete(destination).await?;
        Ok(bytes)
    }
}

fn staging_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".archive");
    destination.with_file_name(name)
}

fn unpack(archive: &Path, destination: &Path) -> io::Result<()> {
    fs::create_dir_all(destination)?;
    let file = File::open(archive)?;
    tar::Archive::new(GzDecoder::new(BufReader::new(file))).unpack(destination)?;
    fs::remove_file(archive)
}

/// One record of the remote inventory with its resolved payload location.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteUnit {
    pub record: PublishedUnit,
    pub content: ContentRef,
}

impl Keyed for RemoteUnit {
    fn unit_key(&self) -> UnitKey {
        self.record.unit_key()
    }
}

/// A fetched, version-checked manifest and its local working copy.
pub struct RemoteManifest {
    url: Url,
    content_base: Url,
    working_dir: PathBuf,
    manifest: Manifest,
    downloader: Arc<dyn Downloader>,
}

impl RemoteManifest {
    /// Downloads the manifest header into `working_dir` and checks its version.
    pub async fn fetch(
        url: &str,
        working_dir: impl Into<PathBuf>,
        downloader: Arc<dyn Downloader>,
    ) -> SyncResult<Self> {
        let url = Url::parse(url)
            .map_err(|e| SyncError::ManifestFetch(format!("invalid manifest URL {url}: {e}")))?;
        // <root>/<repo_id>/manifest.json: relative paths resolve against <root>/
        let content_base = url
            .join("../")
            .map_err(|e| SyncError::ManifestFetch(format!("no publish root for {url}: {e}")))?;
        let working_dir = working_dir.into();
        tokio::fs::create_dir_all(&working_dir).await?;

        let destination = working_dir.join(MANIFEST_FILE_NAME);
        downloader
            .download_one(DownloadRequest::new(url.as_str(), &destination))
            .await
            .map_err(|e| SyncError::ManifestFetch(e.to_string()))?;
        let manifest = Manifest::read(&destination)
            .map_err(|e| SyncError::ManifestFetch(format!("unreadable manifest at {url}: {e}")))?;

        if !manifest.is_valid() {
            return Err(SyncError::IncompatibleManifest {
                expected: MANIFEST_VERSION,
                found: manifest.format_version,
            });
        }
        let name = manifest.units.name.as_str();
        if Path::new(name).file_name().and_then(|n| n.to_str()) != Some(name) {
            return Err(SyncError::ManifestFetch(format!(
                "unit stream name {name:?} at {url} is not a plain file name"
            )));
        }
        info!("Fetched manifest {} ({} units)", url, manifest.unit_count);

        Ok(Self {
            url,
            content_base,
            working_dir,
            manifest,
            downloader,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Local path of the unit stream as currently referenced by the manifest.
    pub fn units_path(&self) -> PathBuf {
        self.manifest.units_path(&self.working_dir)
    }

    /// Downloads the unit stream next to the manifest.
    pub async fn fetch_units(&self) -> SyncResult<()> {
        self.manifest.validate()?;
        let url = self
            .url
            .join(&self.manifest.units.name)
            .map_err(|e| SyncError::UnitsFetch(e.to_string()))?;
        let bytes = self
            .downloader
            .download_one(DownloadRequest::new(url.as_str(), self.units_path()))
            .await
            .map_err(|e| SyncError::UnitsFetch(e.to_string()))?;
        debug!("Fetched unit stream {} ({} bytes)", url, bytes);
        Ok(())
    }

    /// Decompresses the local unit stream in place. Safe to call again.
    pub fn decompress_units(&mut self) -> SyncResult<()> {
        let path = decompress(&self.units_path())?;
        self.manifest.mark_decompressed(&path);
        Ok(())
    }

    /// True iff the local unit stream holds exactly `unit_count` records.
    pub fn has_valid_units(&self) -> SyncResult<bool> {
        let path = self.units_path();
        if !path.exists() {
            return Ok(false);
        }
        Ok(count_units(path)? == self.manifest.unit_count)
    }

    /// Like `has_valid_units`, as an error carrying both counts.
    pub fn verify_units(&self) -> SyncResult<()> {
        let actual = count_units(self.units_path())?;
        if actual != self.manifest.unit_count {
            return Err(SyncError::UnitCountMismatch {
                declared: self.manifest.unit_count,
                actual,
            });
        }
        Ok(())
    }

    /// Streams the remote inventory. Each call starts from the first record.
    pub fn get_units(&self) -> SyncResult<RemoteUnits<'_>> {
        Ok(RemoteUnits {
            reader: UnitReader::open(self.units_path())?,
            remote: self,
        })
    }

    fn content_ref(&self, record: &PublishedUnit) -> SyncResult<ContentRef> {
        let url = match (&record.download, &record.relative_path) {
            (Some(descriptor), _) => Some(descriptor.url.clone()),
            (None, Some(relative)) => Some(
                self.content_base
                    .join(relative)
                    .map_err(|e| SyncError::Download {
                        url: relative.clone(),
                        reason: e.to_string(),
                    })?
                    .to_string(),
            ),
            (None, None) => None,
        };
        Ok(ContentRef {
            url,
            archive: record.published_as_archive,
        })
    }
}

/// Iterator over [`RemoteUnit`]s read lazily from the local unit stream.
pub struct RemoteUnits<'a> {
    reader: UnitReader<PublishedUnit>,
    remote: &'a RemoteManifest,
}

impl Iterator for RemoteUnits<'_> {
    type Item = SyncResult<RemoteUnit>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.reader.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e.into())),
        };
        Some(
            self.remote
                .content_ref(&record)
                .map(|content| RemoteUnit { record, content }),
        )
    }
}
