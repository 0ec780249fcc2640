//! Child side of node repository mirroring.
//!
//! - [`RemoteManifest`]: fetch a parent's manifest, gate on its format
//!   version, then fetch and stream the unit inventory
//! - [`reconcile`]: key-based diff between upstream and local inventories
//! - [`Downloader`]: batch transfers with per-request outcomes
//! - [`TaskPoller`]: wait on a task running on the parent
//! - [`NodeSync`]: the end-to-end driver built from the pieces above
//!
//! # Example
//!
//! ```no_run
//! use nodemirror_sync::{HttpDownloader, NodeSync, SyncStrategy, UnitInventory};
//! use nodemirror_types::MirrorConfig;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn run(inventory: Arc<dyn UnitInventory>) -> nodemirror_sync::SyncResult<()> {
//! let config = MirrorConfig::load(Path::new("/etc/nodemirror/child.toml"))
//!     .map_err(|e| nodemirror_sync::SyncError::Config(e.to_string()))?;
//! let downloader = Arc::new(HttpDownloader::new(config.max_concurrent_downloads)?);
//! let sync = NodeSync::new(config, SyncStrategy::Mirror, downloader, inventory);
//! let report = sync
//!     .synchronize("zoo", "https://parent.example.com/pub/nodes/zoo/manifest.json", Path::new("/tmp/zoo"))
//!     .await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

mod download;
mod error;
mod node;
mod poller;
pub mod reconcile;
mod remote;

pub use download::{DownloadReport, DownloadRequest, Downloader, FileDownloader, HttpDownloader};
pub use error::{SyncError, SyncResult};
pub use node::{NodeSync, SyncEvent, SyncReport, SyncStrategy, UnitFailure, UnitInventory};
pub use poller::{HttpTaskSource, TaskPoller, TaskSource, TaskState, TaskStatus};
pub use reconcile::{diff, diff_strict, orphans, try_diff, try_orphans};
pub use remote::{ContentRef, RemoteManifest, RemoteUnit, RemoteUnits};
