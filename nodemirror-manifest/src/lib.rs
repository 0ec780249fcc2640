//! Manifest and unit stream format for node repository mirroring.
//!
//! A publication consists of two files in the repository's publish directory:
//! - `manifest.json`: a small header with `format_version`, `unit_count`,
//!   and a reference to the unit stream file
//! - `units.json.gz`: gzip-compressed, one JSON unit record per line
//!
//! The header is cheap to fetch speculatively; the stream can be encoded and
//! decoded without materializing the whole unit list. Both files are written
//! to a temp name and renamed into place, so a reader never observes a
//! partial write. The manifest is only written after its stream is closed.

mod codec;
mod error;
mod manifest;
mod reader;
mod writer;

pub use codec::{GZIP_SUFFIX, compress, decompress, is_compressed};
pub use error::{ManifestError, ManifestResult};
pub use manifest::{MANIFEST_FILE_NAME, MANIFEST_VERSION, Manifest, UNITS_FILE_NAME, UnitsFile};
pub use reader::{UnitReader, count_units};
pub use writer::{UnitStream, UnitWriter};
