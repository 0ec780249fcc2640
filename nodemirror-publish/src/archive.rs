//! Directory payloads bundled into compressed tar archives.

use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Lists the files under `dir` recursively, as sorted paths relative to `dir`.
///
/// Symlinks are listed as files and not followed.
pub fn walk_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry.path().strip_prefix(dir).map_err(io::Error::other)?;
        files.push(relative.to_path_buf());
    }
    Ok(files)
}

/// Writes a `.tar.gz` of every file under `dir` to `target`.
///
/// Entries are named relative to `dir`. The archive is built under a temp
/// name and renamed over `target`, replacing any previous bundle.
pub fn bundle(dir: &Path, files: &[PathBuf], target: &Path) -> io::Result<()> {
    let mut temp_name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    temp_name.push(".tmp");
    let temp = target.with_file_name(temp_name);

    let result = write_archive(dir, files, &temp).and_then(|()| fs::rename(&temp, target));
    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}

fn write_archive(dir: &Path, files: &[PathBuf], temp: &Path) -> io::Result<()> {
    let out = BufWriter::new(File::create(temp)?);
    let mut builder = tar::Builder::new(GzEncoder::new(out, Compression::default()));
    for relative in files {
        builder.append_path_with_name(dir.join(relative), relative)?;
    }
    let encoder = builder.into_inner()?;
    let out = encoder.finish()?;
    let file = out.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}
