//! Object/property persistence layer.
//!
//! Maps a tree of named objects, each carrying a tree of typed properties
//! with per-sample time indices, onto the grouped binary container:
//! - [`codec`] - header block encoding, metadata pool, time-sampling wire format
//! - [`sampling`] - the archive-wide deduplicated time-sampling table
//! - [`read`] / [`write`] - lazy reconstruction and incremental construction

pub mod codec;
pub mod sampling;
pub mod read;
pub mod write;

pub use read::{ArchiveReader, ArrayReader, CompoundReader, ObjectReader, PropertyReader, ScalarReader};
pub use sampling::TimeSamplingTable;
pub use write::{ArchiveWriter, ArrayWriter, CompoundWriter, ObjectWriter, PropertyWriter, ScalarWriter};

/// Version of the persistence layout, stored in root slot 0.
pub const ARCHIVE_FORMAT_VERSION: i32 = 1;

/// Version of this library, stored in root slot 1 (major*10000 +
/// minor*100 + patch).
pub const LIBRARY_VERSION: i32 = 100;
