//! Line-delimited unit stream writer.

use crate::codec;
use crate::error::ManifestResult;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Appends one JSON record per line to an uncompressed working file.
///
/// `close()` gzips the file in place; the compressed file only appears
/// under its final name once it is complete.
pub struct UnitWriter {
    path: PathBuf,
    out: BufWriter<File>,
    total_units: u64,
}

impl UnitWriter {
    /// Creates (or truncates) the working file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> ManifestResult<Self> {
        let path = path.into();
        let out = BufWriter::new(File::create(&path)?);
        Ok(Self {
            path,
            out,
            total_units: 0,
        })
    }

    /// Appends one record.
    pub fn add<T: Serialize>(&mut self, record: &T) -> ManifestResult<()> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        self.total_units += 1;
        Ok(())
    }

    /// Number of records written so far.
    pub fn total_units(&self) -> u64 {
        self.total_units
    }

    /// Path of the uncompressed working file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes and compresses the stream, replacing the working file.
    pub fn close(mut self) -> ManifestResult<UnitStream> {
        self.out.flush()?;
        let file = self.out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);

        let path = codec::compress(&self.path)?;
        debug!(
            "Closed unit stream {} ({} units)",
            path.display(),
            self.total_units
        );
        Ok(UnitStream {
            path,
            total_units: self.total_units,
        })
    }
}

/// A finished, compressed unit stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitStream {
    path: PathBuf,
    total_units: u64,
}

impl UnitStream {
    /// Full path of the compressed stream.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name of the compressed stream.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Number of records in the stream.
    pub fn total_units(&self) -> u64 {
        self.total_units
    }

    /// Whether the stream is gzip-compressed.
    pub fn compressed(&self) -> bool {
        codec::is_compressed(&self.path)
    }
}
