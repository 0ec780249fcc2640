//! Gzip and atomic-replace helpers shared by the writer and the reader.

use crate::error::ManifestResult;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Suffix marking a gzip-compressed file.
pub const GZIP_SUFFIX: &str = ".gz";

const TEMP_SUFFIX: &str = ".tmp";

/// Returns true if the file name carries the gzip suffix.
pub fn is_compressed(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().ends_with(GZIP_SUFFIX))
        .unwrap_or(false)
}

/// `path` with `suffix` appended to its file name.
pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Writes through a sibling temp file and renames it over `path`, so readers
/// of `path` see either the old content or the complete new content.
pub(crate) fn replace_atomic<F>(path: &Path, write: F) -> ManifestResult<()>
where
    F: FnOnce(&mut BufWriter<File>) -> ManifestResult<()>,
{
    let temp = with_suffix(path, TEMP_SUFFIX);
    let result = write_then_rename(&temp, path, write);
    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}

fn write_then_rename<F>(temp: &Path, path: &Path, write: F) -> ManifestResult<()>
where
    F: FnOnce(&mut BufWriter<File>) -> ManifestResult<()>,
{
    let mut out = BufWriter::new(File::create(temp)?);
    write(&mut out)?;
    let file = out.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    fs::rename(temp, path)?;
    Ok(())
}

/// Compresses `path` to `path.gz` and removes the uncompressed original.
pub fn compress(path: &Path) -> ManifestResult<PathBuf> {
    let target = with_suffix(path, GZIP_SUFFIX);
    replace_atomic(&target, |out| {
        let mut input = BufReader::new(File::open(path)?);
        let mut encoder = GzEncoder::new(out, Compression::default());
        io::copy(&mut input, &mut encoder)?;
        encoder.try_finish()?;
        Ok(())
    })?;
    fs::remove_file(path)?;
    Ok(target)
}

/// Decompresses `path` in place, dropping the gzip suffix.
///
/// A path without the suffix is already decompressed and is returned as is.
pub fn decompress(path: &Path) -> ManifestResult<PathBuf> {
    if !is_compressed(path) {
        return Ok(path.to_path_buf());
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.strip_suffix(GZIP_SUFFIX).unwrap_or(&name);
    let target = path.with_file_name(stem);
    replace_atomic(&target, |out| {
        let mut decoder = GzDecoder::new(BufReader::new(File::open(path)?));
        io::copy(&mut decoder, out)?;
        out.flush()?;
        Ok(())
    })?;
    fs::remove_file(path)?;
    Ok(target)
}
