//! Archive writer - creation, root layout, and the close/freeze step.

use std::path::Path;
use std::sync::Arc;

use crate::archive::codec::encode_time_samplings;
use crate::archive::write::WriteContext;
use crate::archive::write::object::ObjectWriter;
use crate::archive::{ARCHIVE_FORMAT_VERSION, LIBRARY_VERSION};
use crate::container::WArchive;
use crate::core::{MetaData, ObjectHeader, TimeSampling};
use crate::util::Result;

/// Writer for a whole archive.
///
/// Creation writes the container header and the leading root slots (format
/// version, library version, root object group); the trailer slots (archive
/// metadata, time-sampling table, metadata pool) are appended by `close`,
/// after every deferred header block has been flushed bottom-up.
pub struct ArchiveWriter {
    name: String,
    container: WArchive,
    ctx: Arc<WriteContext>,
    root: Arc<ObjectWriter>,
    archive_metadata: MetaData,
}

impl ArchiveWriter {
    /// Create a new archive file for writing.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let name = path.as_ref().to_string_lossy().to_string();
        let container = WArchive::create(path)?;
        let ctx = Arc::new(WriteContext::new());

        let root_group = container.root();
        root_group.add_data(&ARCHIVE_FORMAT_VERSION.to_le_bytes())?;
        root_group.add_data(&LIBRARY_VERSION.to_le_bytes())?;

        let object_group = root_group.add_group()?;
        let root = Arc::new(ObjectWriter::new(
            ObjectHeader::new("ABC", "/"),
            object_group,
            ctx.clone(),
        )?);

        tracing::debug!(archive = %name, "created archive for writing");

        Ok(Self {
            name,
            container,
            ctx,
            root,
            archive_metadata: MetaData::new(),
        })
    }

    /// Get the archive name/path.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the root object writer.
    pub fn root(&self) -> &Arc<ObjectWriter> {
        &self.root
    }

    /// Intern a time sampling, returning its stable table index.
    pub fn add_time_sampling(&self, ts: TimeSampling) -> u32 {
        self.ctx.time_table.lock().intern(ts)
    }

    /// Number of interned time samplings (identity included).
    pub fn num_time_samplings(&self) -> usize {
        self.ctx.time_table.lock().len()
    }

    /// Get a time sampling by index.
    pub fn time_sampling(&self, index: u32) -> Option<TimeSampling> {
        self.ctx.time_table.lock().resolve(index).ok().cloned()
    }

    /// Set archive-level metadata, stored in the trailer.
    pub fn set_archive_metadata(&mut self, meta_data: MetaData) {
        self.archive_metadata = meta_data;
    }

    /// Finalize the archive: flush every header block bottom-up, append the
    /// trailer slots, and freeze the container.
    pub fn close(self) -> Result<()> {
        self.root.write_headers()?;

        let root_group = self.container.root();
        root_group.add_data(self.archive_metadata.serialize().as_bytes())?;

        {
            let table = self.ctx.time_table.lock();
            let ts_block = encode_time_samplings(table.samplings(), table.max_samples());
            root_group.add_data(&ts_block)?;
        }

        {
            let pool = self.ctx.metadata_pool.lock();
            root_group.add_data(&pool.serialize())?;
        }

        tracing::debug!(archive = %self.name, "finalized archive");

        self.container.freeze()
    }
}
