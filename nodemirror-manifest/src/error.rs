//! Error types for the manifest crate.

use thiserror::Error;

/// Result type for manifest and unit stream operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The manifest was written by an unsupported format version.
    #[error("incompatible manifest: expected format version {expected}, found {found}")]
    IncompatibleVersion { expected: u32, found: u32 },

    /// The unit stream holds a different number of records than declared.
    #[error("unit stream holds {actual} records but manifest declares {declared}")]
    UnitCountMismatch { declared: u64, actual: u64 },

    /// A unit stream line could not be decoded.
    #[error("invalid unit record at line {line}: {source}")]
    InvalidRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
