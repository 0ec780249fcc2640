//! Error types for the sync layer.

use nodemirror_manifest::ManifestError;
use serde_json::Value;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The manifest header could not be downloaded or parsed.
    #[error("manifest fetch failed: {0}")]
    ManifestFetch(String),

    /// The manifest was written by an unsupported format version.
    #[error("incompatible manifest: expected format version {expected}, found {found}")]
    IncompatibleManifest { expected: u32, found: u32 },

    /// The unit stream could not be downloaded.
    #[error("unit stream fetch failed: {0}")]
    UnitsFetch(String),

    /// The unit stream is truncated or padded.
    #[error("unit stream holds {actual} records but manifest declares {declared}")]
    UnitCountMismatch { declared: u64, actual: u64 },

    /// Network error.
    #[error("network error: {0}")]
    Network(String),

    /// A single transfer failed.
    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    /// A published path would land outside the local storage root.
    #[error("unsafe storage path {0:?}")]
    UnsafePath(String),

    /// Two units resolve to the same local destination.
    #[error("destination {0} is already claimed by another unit")]
    DestinationConflict(String),

    /// The upstream inventory lists the same unit twice.
    #[error("duplicate unit key in upstream inventory: {0}")]
    DuplicateUnitKey(String),

    /// The task status could not be fetched.
    #[error("task polling failed: {0}")]
    PollFailed(String),

    /// The remote task reported an error.
    #[error("task {task_id} failed: {exception}")]
    TaskFailed {
        task_id: String,
        exception: Value,
        traceback: Value,
    },

    /// The remote task was cancelled on the remote side.
    #[error("task {0} was cancelled")]
    TaskCancelled(String),

    /// The caller's cancellation predicate fired.
    #[error("operation cancelled")]
    Cancelled,

    /// Local unit inventory error.
    #[error("inventory error: {0}")]
    Inventory(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other manifest or unit stream error.
    #[error("manifest error: {0}")]
    Manifest(ManifestError),
}

impl From<ManifestError> for SyncError {
    fn from(err: ManifestError) -> Self {
        match err {
            ManifestError::IncompatibleVersion { expected, found } => {
                SyncError::IncompatibleManifest { expected, found }
            }
            ManifestError::UnitCountMismatch { declared, actual } => {
                SyncError::UnitCountMismatch { declared, actual }
            }
            ManifestError::Io(e) => SyncError::Io(e),
            other => SyncError::Manifest(other),
        }
    }
}
