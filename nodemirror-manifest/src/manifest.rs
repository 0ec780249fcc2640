//! Manifest header (manifest.json) describing a published unit stream.

use crate::codec;
use crate::error::{ManifestError, ManifestResult};
use crate::writer::UnitStream;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Format version written and accepted by this crate. Readers require an
/// exact match.
pub const MANIFEST_VERSION: u32 = 2;

/// File name of the manifest header within a publish directory.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// File name of the unit stream before compression.
pub const UNITS_FILE_NAME: &str = "units.json";

/// Reference to the unit stream file, relative to the manifest's directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitsFile {
    pub name: String,
    pub compressed: bool,
}

/// Versioned header describing one publication.
///
/// Written once per publish and never mutated; the next publish supersedes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    // Defaults let a header from another format version still be read far
    // enough to report the mismatch.
    #[serde(default)]
    pub unit_count: u64,
    #[serde(default)]
    pub units: UnitsFile,
}

impl Manifest {
    /// Describes a closed unit stream at the current format version.
    pub fn for_stream(stream: &UnitStream) -> Self {
        Self {
            format_version: MANIFEST_VERSION,
            unit_count: stream.total_units(),
            units: UnitsFile {
                name: stream.file_name(),
                compressed: stream.compressed(),
            },
        }
    }

    /// Writes the header for `stream` into `dir`, replacing any previous one.
    pub fn write(dir: &Path, stream: &UnitStream) -> ManifestResult<Self> {
        let manifest = Self::for_stream(stream);
        manifest.write_to(dir)?;
        Ok(manifest)
    }

    /// Writes this header to `dir/manifest.json` via temp file and rename.
    pub fn write_to(&self, dir: &Path) -> ManifestResult<PathBuf> {
        let path = dir.join(MANIFEST_FILE_NAME);
        codec::replace_atomic(&path, |out| {
            serde_json::to_writer_pretty(&mut *out, self)?;
            Ok(())
        })?;
        Ok(path)
    }

    /// Parses a header file. The version is not checked here.
    pub fn read(path: impl AsRef<Path>) -> ManifestResult<Self> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// True iff the header was written at the supported format version.
    pub fn is_valid(&self) -> bool {
        self.format_version == MANIFEST_VERSION
    }

    /// Like `is_valid`, as an error carrying both versions.
    pub fn validate(&self) -> ManifestResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ManifestError::IncompatibleVersion {
                expected: MANIFEST_VERSION,
                found: self.format_version,
            })
        }
    }

    /// Location of the unit stream next to a manifest stored in `dir`.
    pub fn units_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.units.name)
    }

    /// Records that the local copy of the unit stream was decompressed.
    pub fn mark_decompressed(&mut self, path: &Path) {
        if let Some(name) = path.file_name() {
            self.units.name = name.to_string_lossy().into_owned();
        }
        self.units.compressed = codec::is_compressed(path);
    }
}
