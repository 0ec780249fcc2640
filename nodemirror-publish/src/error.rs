//! Error types for the publish side.

use nodemirror_manifest::ManifestError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for publish operations.
pub type PublishResult<T> = Result<T, PublishError>;

/// Errors that abort a publish or an enumeration.
#[derive(Debug, Error)]
pub enum PublishError {
    /// A publish directory could not be created.
    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A content link could not be created (other than already existing).
    #[error("failed to link {}: {source}", .path.display())]
    Link {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A directory bundle could not be written.
    #[error("failed to build archive {}: {source}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unit store error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Manifest or unit stream error.
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
