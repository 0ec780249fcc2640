//! Child-side synchronization driver.
//!
//! One `synchronize` call brings a local repository in line with a parent's
//! publication: fetch and check the manifest, stream the remote inventory,
//! diff it against local units, download what is missing, and (for the
//! mirror strategy) remove what the parent no longer has.

use crate::download::{DownloadReport, DownloadRequest, Downloader};
use crate::error::{SyncError, SyncResult};
use crate::reconcile;
use crate::remote::{RemoteManifest, RemoteUnit};
use nodemirror_types::{ContentUnit, Keyed, MirrorConfig, UnitKey};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// The child's local unit inventory for one repository.
pub trait UnitInventory: Send + Sync {
    fn units(&self) -> SyncResult<Vec<ContentUnit>>;
    fn add_unit(&self, unit: ContentUnit) -> SyncResult<()>;
    fn remove_unit(&self, unit: &ContentUnit) -> SyncResult<()>;
}

/// How local-only units are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStrategy {
    /// Add missing units; keep local-only units.
    #[default]
    Additive,
    /// Add missing units, then remove units the parent no longer lists.
    Mirror,
}

impl FromStr for SyncStrategy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "additive" => Ok(SyncStrategy::Additive),
            "mirror" => Ok(SyncStrategy::Mirror),
            other => Err(SyncError::Config(format!("unknown sync strategy: {other}"))),
        }
    }
}

impl fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStrategy::Additive => write!(f, "additive"),
            SyncStrategy::Mirror => write!(f, "mirror"),
        }
    }
}

/// Progress notifications for a running sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    ManifestDownloading { url: String },
    ManifestReady { unit_count: u64 },
    AddingUnits { total: usize },
    UnitAdded { unit_key: String },
    RemovingUnits { total: usize },
    Finished { summary: String },
}

/// A unit that could not be added or removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFailure {
    pub unit_key: UnitKey,
    pub error: String,
}

/// Outcome of one `synchronize` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub removed: usize,
    pub failures: Vec<UnitFailure>,
    pub cancelled: bool,
}

impl SyncReport {
    pub fn succeeded(&self) -> usize {
        self.added + self.removed
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn summary(&self) -> String {
        format!("{} succeeded, {} failed", self.succeeded(), self.failed())
    }

    fn fail(&mut self, unit_key: UnitKey, error: impl fmt::Display) {
        warn!("Unit {} failed: {}", unit_key, error);
        self.failures.push(UnitFailure {
            unit_key,
            error: error.to_string(),
        });
    }
}

type CancelFn = dyn Fn() -> bool + Send + Sync;

/// A unit with content waiting on its download.
struct PendingUnit {
    remote: RemoteUnit,
    local: ContentUnit,
    destination: PathBuf,
    request: DownloadRequest,
}

/// Synchronizes one child repository from a parent publication.
pub struct NodeSync {
    config: MirrorConfig,
    strategy: SyncStrategy,
    downloader: Arc<dyn Downloader>,
    inventory: Arc<dyn UnitInventory>,
    events: Option<UnboundedSender<SyncEvent>>,
    is_cancelled: Arc<CancelFn>,
}

impl NodeSync {
    pub fn new(
        config: MirrorConfig,
        strategy: SyncStrategy,
        downloader: Arc<dyn Downloader>,
        inventory: Arc<dyn UnitInventory>,
    ) -> Self {
        Self {
            config,
            strategy,
            downloader,
            inventory,
            events: None,
            is_cancelled: Arc::new(|| false),
        }
    }

    /// Sends progress events to `tx`. A closed receiver is ignored.
    #[must_use]
    pub fn with_events(mut self, tx: UnboundedSender<SyncEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Checks `is_cancelled` between units and before each phase.
    #[must_use]
    pub fn with_cancellation<F>(mut self, is_cancelled: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.is_cancelled = Arc::new(is_cancelled);
        self
    }

    pub fn strategy(&self) -> SyncStrategy {
        self.strategy
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    fn cancelled(&self) -> bool {
        (self.is_cancelled)()
    }

    /// Runs one synchronization of `repo_id` against `manifest_url`.
    ///
    /// Manifest, unit stream and local-inventory errors are fatal. Failures
    /// of individual units are collected in the report.
    pub async fn synchronize(
        &self,
        repo_id: &str,
        manifest_url: &str,
        working_dir: &Path,
    ) -> SyncResult<SyncReport> {
        info!("Synchronizing {} from {} ({})", repo_id, manifest_url, self.strategy);
        self.emit(SyncEvent::ManifestDownloading {
            url: manifest_url.to_string(),
        });

        let remote = RemoteManifest::fetch(manifest_url, working_dir, self.downloader.clone()).await?;
        remote.fetch_units().await?;
        remote.verify_units()?;
        self.emit(SyncEvent::ManifestReady {
            unit_count: remote.manifest().unit_count,
        });

        let present = self.inventory.units()?;

        // The unit stream is read lazily; only missing records are kept.
        let mut report = SyncReport::default();
        let missing = reconcile::try_diff(remote.get_units()?, &present)?;
        self.add_units(repo_id, missing, &mut report).await;

        if self.strategy == SyncStrategy::Mirror && !report.cancelled {
            let orphans = reconcile::try_orphans(&present, remote.get_units()?)?;
            self.remove_units(orphans, &mut report);
        }

        let summary = report.summary();
        info!("Synchronized {}: {}", repo_id, summary);
        self.emit(SyncEvent::Finished { summary });
        Ok(report)
    }

    async fn add_units(&self, repo_id: &str, missing: Vec<RemoteUnit>, report: &mut SyncReport) {
        self.emit(SyncEvent::AddingUnits {
            total: missing.len(),
        });

        let mut pending = Vec::new();
        let mut claimed: HashSet<PathBuf> = HashSet::new();
        for remote in missing {
            if self.cancelled() {
                report.cancelled = true;
                break;
            }
            let key = remote.unit_key();
            let mut local = remote.record.unit.clone();
            if !remote.content.has_content() {
                local.storage_path = None;
                self.add_one(local, report);
                continue;
            }
            let destination = match self.destination(repo_id, &remote) {
                Ok(destination) => destination,
                Err(e) => {
                    report.fail(key, e);
                    continue;
                }
            };
            let Some(request) = remote.content.download_request(&destination) else {
                report.fail(key, "no content URL");
                continue;
            };
            // Outcomes are matched back by path, so each path has one owner.
            let targets = [destination.clone(), request.destination.clone()];
            if targets.iter().any(|t| claimed.contains(t)) {
                let conflict = SyncError::DestinationConflict(destination.display().to_string());
                report.fail(key, conflict);
                continue;
            }
            claimed.extend(targets);
            local.storage_path = Some(destination.to_string_lossy().into_owned());
            pending.push(PendingUnit {
                remote,
                local,
                destination,
                request,
            });
        }

        if report.cancelled || pending.is_empty() {
            return;
        }

        let requests = pending.iter().map(|p| p.request.clone()).collect();
        let mut outcomes: HashMap<PathBuf, DownloadReport> = self
            .downloader
            .download(requests)
            .await
            .into_iter()
            .map(|r| (r.request.destination.clone(), r))
            .collect();

        for unit in pending {
            let key = unit.remote.unit_key();
            let outcome = outcomes.remove(&unit.request.destination);
            match outcome.map(|o| o.result) {
                Some(Ok(bytes)) => {
                    debug!("Downloaded {} ({} bytes)", key, bytes);
                    match unit.remote.content.complete(&unit.destination).await {
                        Ok(()) => self.add_one(unit.local, report),
                        Err(e) => report.fail(key, e),
                    }
                }
                Some(Err(e)) => report.fail(key, e),
                None => report.fail(key, "no download outcome reported"),
            }
        }
    }

    fn add_one(&self, unit: ContentUnit, report: &mut SyncReport) {
        let key = unit.unit_key();
        match self.inventory.add_unit(unit) {
            Ok(()) => {
                report.added += 1;
                self.emit(SyncEvent::UnitAdded {
                    unit_key: key.to_string(),
                });
            }
            Err(e) => report.fail(key, e),
        }
    }

    fn remove_units(&self, orphans: Vec<&ContentUnit>, report: &mut SyncReport) {
        self.emit(SyncEvent::RemovingUnits {
            total: orphans.len(),
        });
        for unit in orphans {
            if self.cancelled() {
                report.cancelled = true;
                break;
            }
            match self.inventory.remove_unit(unit) {
                Ok(()) => report.removed += 1,
                Err(e) => report.fail(unit.unit_key(), e),
            }
        }
    }

    /// `storage_dir/<storage_relative_path>`, falling back to the published
    /// file name under the repository id.
    ///
    /// Both come from the parent, so anything that could leave
    /// `storage_dir` is refused.
    fn destination(&self, repo_id: &str, remote: &RemoteUnit) -> SyncResult<PathBuf> {
        let record = &remote.record;
        let relative = match (&record.storage_relative_path, &record.relative_path) {
            (Some(path), _) => confined(path)?,
            (None, Some(path)) => {
                let name = path.rsplit('/').next().unwrap_or_default();
                confined(repo_id)?.join(confined(name)?)
            }
            (None, None) => confined(repo_id)?,
        };
        Ok(self.config.storage_dir.join(relative))
    }
}

/// `path` as a relative path made only of plain segments.
fn confined(path: &str) -> SyncResult<PathBuf> {
    let relative = Path::new(path);
    let plain = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !plain || relative.as_os_str().is_empty() {
        return Err(SyncError::UnsafePath(path.to_string()));
    }
    Ok(relative.to_path_buf())
}
