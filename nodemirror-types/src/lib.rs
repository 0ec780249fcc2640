//! Core type definitions for node repository mirroring.
//!
//! This crate defines the plain data shared by the publishing (parent) and
//! consuming (child) sides of a mirror:
//! - Content units and their natural-key identity (`UnitKey`)
//! - Published unit records, exactly as serialized into a unit stream
//! - Repository/unit associations as seen by the unit enumerator
//! - The explicit configuration object passed through every component
//!
//! Nothing here performs I/O beyond loading a configuration file.

mod association;
mod config;
mod unit;

pub use association::{AssociatedUnit, Association};
pub use config::{MAX_PAGE_SIZE, MirrorConfig};
pub use unit::{
    ContentUnit, DownloadDescriptor, Keyed, PublishedUnit, UnitKey, relative_to_storage,
};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
