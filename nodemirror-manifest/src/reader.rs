//! Streaming unit stream reader.

use crate::codec;
use crate::error::{ManifestError, ManifestResult};
use flate2::read::GzDecoder;
use nodemirror_types::PublishedUnit;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::marker::PhantomData;
use std::path::Path;

type LineSource = Lines<Box<dyn BufRead + Send>>;

/// Reads one record per line, compressed or not, without loading the file.
///
/// Each `open` starts from the beginning of the file.
pub struct UnitReader<T = PublishedUnit> {
    lines: LineSource,
    line: usize,
    _record: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> UnitReader<T> {
    /// Opens a unit stream. A `.gz` name selects gzip decoding.
    pub fn open(path: impl AsRef<Path>) -> ManifestResult<Self> {
        Ok(Self {
            lines: open_lines(path.as_ref())?,
            line: 0,
            _record: PhantomData,
        })
    }
}

impl<T: DeserializeOwned> Iterator for UnitReader<T> {
    type Item = ManifestResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(e) => return Some(Err(e.into())),
            };
            self.line += 1;
            if text.trim().is_empty() {
                continue;
            }
            return Some(serde_json::from_str(&text).map_err(|source| {
                ManifestError::InvalidRecord {
                    line: self.line,
                    source,
                }
            }));
        }
    }
}

/// Counts the records in a unit stream without decoding them.
pub fn count_units(path: impl AsRef<Path>) -> ManifestResult<u64> {
    let mut count = 0;
    for line in open_lines(path.as_ref())? {
        if !line?.trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}

fn open_lines(path: &Path) -> ManifestResult<LineSource> {
    let file = File::open(path)?;
    let reader: Box<dyn BufRead + Send> = if codec::is_compressed(path) {
        Box::new(BufReader::new(GzDecoder::new(BufReader::new(file))))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader.lines())
}
