//! Write side of the persistence layer.
//!
//! Two-phase model: creating a property or object eagerly allocates its
//! container sub-group and buffers header fields in memory; byte-encoding
//! of each header block is deferred until the owning node finalizes.

mod archive;
mod object;
mod property;

pub use archive::ArchiveWriter;
pub use object::ObjectWriter;
pub use property::{ArrayWriter, CompoundWriter, PropertyWriter, ScalarWriter};

use parking_lot::Mutex;

use crate::archive::codec::MetaDataPool;
use crate::archive::sampling::TimeSamplingTable;

/// Archive-wide mutable state shared by every write-side node.
pub(crate) struct WriteContext {
    pub(crate) time_table: Mutex<TimeSamplingTable>,
    pub(crate) metadata_pool: Mutex<MetaDataPool>,
}

impl WriteContext {
    pub(crate) fn new() -> Self {
        Self {
            time_table: Mutex::new(TimeSamplingTable::new()),
            metadata_pool: Mutex::new(MetaDataPool::new()),
        }
    }
}
