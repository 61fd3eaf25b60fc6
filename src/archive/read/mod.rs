//! Read side of the persistence layer.
//!
//! Opening an archive yields a root object node; child objects, property
//! compounds, and typed property readers are materialized on demand and
//! shared through weak caches while referenced.

mod archive;
mod object;
mod property;

pub use archive::ArchiveReader;
pub use object::ObjectReader;
pub use property::{ArrayReader, CompoundReader, PropertyReader, ScalarReader};

use crate::archive::sampling::TimeSamplingTable;
use crate::core::MetaData;

/// Archive-wide immutable state shared by every read-side node.
pub(crate) struct ReadContext {
    pub(crate) time_table: TimeSamplingTable,
    pub(crate) metadata_pool: Vec<MetaData>,
}
