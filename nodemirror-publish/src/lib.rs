//! Publishing side of node repository mirroring.
//!
//! The parent node walks a repository's units, links each payload into a
//! content-addressed tree under the publish root, and writes a manifest plus
//! unit stream that a child node can fetch over HTTP.
//!
//! # Components
//!
//! - **Addressing**: `encode` names a payload by the SHA-256 of its path
//! - **Publisher**: builds links (or archives for large directories) and
//!   the manifest
//! - **Enumerator**: pages through a repository's units with bounded memory
//! - **Store**: the `UnitStore` seam and its SQLite implementation
//!
//! # Example
//!
//! ```no_run
//! use nodemirror_publish::{Publisher, SqliteUnitStore};
//! use nodemirror_types::MirrorConfig;
//!
//! let store = SqliteUnitStore::open("/var/lib/nodemirror/units.db").unwrap();
//! let publisher = Publisher::new(MirrorConfig::default());
//! let report = publisher.publish_repository(&store, "zoo").unwrap();
//! println!("{} units published", report.manifest.unit_count);
//! ```

mod address;
mod archive;
mod enumerator;
mod error;
mod publisher;
mod store;

pub use address::encode;
pub use enumerator::{AssociatedUnits, UnitEnumerator};
pub use error::{PublishError, PublishResult};
pub use publisher::{CONTENT_DIR, PublishReport, Publisher};
pub use store::{SqliteUnitStore, StoredUnit, UnitStore};
