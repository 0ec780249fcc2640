//! Mirror configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Largest accepted `page_size`.
pub const MAX_PAGE_SIZE: usize = 10_000;

/// Options shared by the publisher, the enumerator, and the sync side.
///
/// Passed explicitly to every component; there is no process-wide state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Units fetched per store round trip by the enumerator.
    pub page_size: usize,
    /// Directories with more files than this are published as one archive.
    pub archive_threshold_files: usize,
    /// Suffix appended to the relative path of archived units.
    pub archive_suffix: String,
    /// Delay between remote task status fetches.
    pub poll_delay_seconds: f64,
    /// Root of the published tree.
    pub publish_root: PathBuf,
    /// Root of unit storage. Stripped from storage paths on the parent,
    /// prepended to downloaded payloads on the child.
    pub storage_dir: PathBuf,
    /// Public URL of `publish_root`. When set, published records carry a
    /// `_download` descriptor.
    pub base_url: Option<String>,
    /// Upper bound on concurrent content downloads.
    pub max_concurrent_downloads: usize,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            page_size: 500,
            archive_threshold_files: 100,
            archive_suffix: ".tar.gz".to_string(),
            poll_delay_seconds: 0.5,
            publish_root: PathBuf::from("/var/www/pub/nodes"),
            storage_dir: PathBuf::from("/var/lib/nodemirror/content"),
            base_url: None,
            max_concurrent_downloads: 4,
        }
    }
}

impl MirrorConfig {
    /// Parses and validates a TOML document. Missing keys take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::InvalidConfig(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if !self.poll_delay_seconds.is_finite() || self.poll_delay_seconds < 0.0 {
            return Err(Error::InvalidConfig(
                "poll_delay_seconds must be a non-negative number".into(),
            ));
        }
        if self.max_concurrent_downloads == 0 {
            return Err(Error::InvalidConfig(
                "max_concurrent_downloads must be positive".into(),
            ));
        }
        if self.archive_suffix.is_empty() {
            return Err(Error::InvalidConfig("archive_suffix must not be empty".into()));
        }
        Ok(())
    }

    /// The poll delay as a `Duration`.
    pub fn poll_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.poll_delay_seconds).unwrap_or(Duration::ZERO)
    }
}
