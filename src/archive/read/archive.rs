//! Archive reader - open, validate, and bootstrap the root object.

use std::path::Path;
use std::sync::Arc;

use crate::archive::codec::{decode_metadata_pool, decode_time_samplings};
use crate::archive::read::ReadContext;
use crate::archive::read::object::{ObjectData, ObjectReader};
use crate::archive::sampling::TimeSamplingTable;
use crate::archive::ARCHIVE_FORMAT_VERSION;
use crate::container::RArchive;
use crate::core::{MetaData, ObjectHeader, TimeSampling};
use crate::util::{Error, Result};

/// Reader for a whole archive.
///
/// Opening memory-maps the container, validates the fixed root layout,
/// loads the time-sampling table and the interned metadata pool, and
/// constructs the root object node. Everything below the root is
/// materialized lazily.
pub struct ArchiveReader {
    name: String,
    archive_version: i32,
    library_version: i32,
    ctx: Arc<ReadContext>,
    root: Arc<ObjectReader>,
}

impl ArchiveReader {
    /// Open an archive file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_opts(path, true, 4)
    }

    /// Open with explicit I/O options.
    pub fn open_opts(path: impl AsRef<Path>, use_mmap: bool, pool_size: usize) -> Result<Self> {
        let name = path.as_ref().to_string_lossy().to_string();
        let container = RArchive::open_opts(path, use_mmap, pool_size)?;

        if !container.is_frozen() {
            return Err(Error::invalid("archive was not finalized"));
        }

        let group = container.root();

        // Root layout: format version, library version, root object group,
        // archive metadata, time-sampling table, indexed metadata pool.
        if group.num_children() < 6 {
            return Err(Error::invalid("archive root group too small"));
        }
        if !group.is_child_data(0)?
            || !group.is_child_data(1)?
            || !group.is_child_group(2)?
            || !group.is_child_data(3)?
            || !group.is_child_data(4)?
            || !group.is_child_data(5)?
        {
            return Err(Error::invalid("unexpected archive root layout"));
        }

        let archive_version = read_version_slot(group.data(0, 0)?.read_all()?)?;
        if !(0..=ARCHIVE_FORMAT_VERSION).contains(&archive_version) {
            return Err(Error::invalid(format!(
                "unsupported archive format version {archive_version}"
            )));
        }
        let library_version = read_version_slot(group.data(1, 0)?.read_all()?)?;

        let archive_metadata = {
            let bytes = group.data(3, 0)?.read_all()?;
            let s = std::str::from_utf8(&bytes)
                .map_err(|e| Error::invalid(format!("invalid UTF-8 in archive metadata: {e}")))?;
            MetaData::parse(s)
        };

        let (samplings, max_samples) = decode_time_samplings(&group.data(4, 0)?.read_all()?)?;
        let time_table = TimeSamplingTable::from_parts(samplings, max_samples);

        let metadata_pool = decode_metadata_pool(&group.data(5, 0)?.read_all()?)?;

        let ctx = Arc::new(ReadContext {
            time_table,
            metadata_pool,
        });

        let root_group = group.group(2, 0)?;
        let root_data = ObjectData::new(root_group, "", 0, ctx.clone())?;
        let root_header = ObjectHeader::with_meta_data("ABC", "/", archive_metadata);
        let root = Arc::new(ObjectReader::new(Arc::new(root_header), root_data));

        tracing::debug!(
            archive = %name,
            archive_version,
            library_version,
            time_samplings = ctx.time_table.len(),
            "opened archive"
        );

        Ok(Self {
            name,
            archive_version,
            library_version,
            ctx,
            root,
        })
    }

    /// Get the archive name/path.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The archive format version stored in slot 0.
    pub fn archive_version(&self) -> i32 {
        self.archive_version
    }

    /// The library version that wrote the archive.
    pub fn library_version(&self) -> i32 {
        self.library_version
    }

    /// The root object.
    pub fn root(&self) -> &Arc<ObjectReader> {
        &self.root
    }

    /// Archive-level metadata (also carried on the root object header).
    pub fn archive_metadata(&self) -> &MetaData {
        &self.root.header().meta_data
    }

    /// Number of time samplings in the archive table.
    pub fn num_time_samplings(&self) -> usize {
        self.ctx.time_table.len()
    }

    /// Resolve a time-sampling index.
    pub fn time_sampling(&self, index: u32) -> Result<&TimeSampling> {
        self.ctx.time_table.resolve(index)
    }

    /// Maximum sample count recorded for a sampling index.
    pub fn max_num_samples_for(&self, index: u32) -> Option<u32> {
        self.ctx.time_table.max_samples_for(index)
    }

    /// Walk a `/`-separated path from the root, materializing each step.
    pub fn find_object(&self, path: &str, thread_hint: usize) -> Result<Option<Arc<ObjectReader>>> {
        let mut current = self.root.clone();
        for part in path.split('/').filter(|s| !s.is_empty()) {
            match current.child_by_name(part, thread_hint)? {
                Some(child) => current = child,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }
}

/// The two leading root slots each hold one little-endian i32.
fn read_version_slot(bytes: Vec<u8>) -> Result<i32> {
    let arr: [u8; 4] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| Error::invalid("version slot is not 4 bytes"))?;
    Ok(i32::from_le_bytes(arr))
}
