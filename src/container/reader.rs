//! Vault container reader.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;
use parking_lot::Mutex;

use super::format::*;
use crate::util::{Error, Result};

/// Number of pooled file handles used when memory mapping is disabled.
const DEFAULT_POOL_SIZE: usize = 4;

/// Input streams for reading vault data.
///
/// Memory-mapped by default; the buffered fallback keeps a small pool of
/// file handles and routes each read through the caller's thread hint so
/// concurrent readers do not serialize on one descriptor.
pub struct RStreams {
    inner: StreamsInner,
    version: u16,
    frozen: bool,
    size: u64,
}

enum StreamsInner {
    /// Memory-mapped file (preferred for large files)
    Mmap(Mmap),
    /// Buffered file pool, indexed by thread hint
    Pool(Vec<Mutex<File>>),
}

impl RStreams {
    /// Open a file for reading with memory mapping.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_opts(path, true, DEFAULT_POOL_SIZE)
    }

    /// Open a file with optional memory mapping and pool size.
    pub fn open_opts(path: impl AsRef<Path>, use_mmap: bool, pool_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;

        let size = file.metadata()?.len();
        if size < HEADER_SIZE as u64 {
            return Err(Error::UnexpectedEof(size));
        }

        let inner = if use_mmap {
            // Safety: file is opened read-only
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
            StreamsInner::Mmap(mmap)
        } else {
            let mut pool = Vec::with_capacity(pool_size.max(1));
            pool.push(Mutex::new(file));
            for _ in 1..pool_size.max(1) {
                pool.push(Mutex::new(File::open(path)?));
            }
            StreamsInner::Pool(pool)
        };

        let (version, frozen) = match &inner {
            StreamsInner::Mmap(mmap) => Self::parse_header(mmap)?,
            StreamsInner::Pool(pool) => {
                let mut f = pool[0].lock();
                let mut header = [0u8; HEADER_SIZE];
                f.seek(SeekFrom::Start(0))?;
                f.read_exact(&mut header)?;
                Self::parse_header(&header)?
            }
        };

        Ok(Self {
            inner,
            version,
            frozen,
            size,
        })
    }

    /// Parse and validate the vault header.
    fn parse_header(data: &[u8]) -> Result<(u16, bool)> {
        if data.len() < HEADER_SIZE {
            return Err(Error::UnexpectedEof(data.len() as u64));
        }

        if &data[0..5] != VAULT_MAGIC {
            return Err(Error::InvalidMagic);
        }

        let frozen = data[FROZEN_OFFSET] == FROZEN_FLAG;
        let version = u16::from_le_bytes([data[VERSION_OFFSET], data[VERSION_OFFSET + 1]]);

        if version > CURRENT_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        Ok((version, frozen))
    }

    /// Check if the archive is frozen (finalized).
    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Get the container format version.
    #[inline]
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Get the total file size.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Get the root group position from the header.
    pub fn root_pos(&self) -> Result<u64> {
        self.read_u64(ROOT_POS_OFFSET as u64, 0)
    }

    /// Read bytes at a specific position.
    pub fn read_bytes(&self, pos: u64, len: usize, thread_hint: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_into(pos, &mut buf, thread_hint)?;
        Ok(buf)
    }

    /// Read bytes into an existing buffer.
    pub fn read_into(&self, pos: u64, buf: &mut [u8], thread_hint: usize) -> Result<()> {
        if pos + buf.len() as u64 > self.size {
            return Err(Error::UnexpectedEof(pos + buf.len() as u64));
        }

        match &self.inner {
            StreamsInner::Mmap(mmap) => {
                buf.copy_from_slice(&mmap[pos as usize..pos as usize + buf.len()]);
                Ok(())
            }
            StreamsInner::Pool(pool) => {
                let mut f = pool[thread_hint % pool.len()].lock();
                f.seek(SeekFrom::Start(pos))?;
                f.read_exact(buf)?;
                Ok(())
            }
        }
    }

    /// Read a u64 value at the given position.
    pub fn read_u64(&self, pos: u64, thread_hint: usize) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_into(pos, &mut buf, thread_hint)?;
        Ok(u64::from_le_bytes(buf))
    }
}

/// Vault archive reader.
pub struct RArchive {
    streams: Arc<RStreams>,
    root: RGroup,
}

impl RArchive {
    /// Open a vault file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_opts(path, true, DEFAULT_POOL_SIZE)
    }

    /// Open with explicit I/O options.
    pub fn open_opts(path: impl AsRef<Path>, use_mmap: bool, pool_size: usize) -> Result<Self> {
        let streams = Arc::new(RStreams::open_opts(path, use_mmap, pool_size)?);
        let root_pos = streams.root_pos()?;
        let root = RGroup::new(streams.clone(), root_pos, 0)?;
        Ok(Self { streams, root })
    }

    /// Check if the archive is frozen (finalized).
    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.streams.is_frozen()
    }

    /// Get the container format version.
    #[inline]
    pub fn version(&self) -> u16 {
        self.streams.version()
    }

    /// Get the root group.
    #[inline]
    pub fn root(&self) -> &RGroup {
        &self.root
    }
}

/// A group in the container hierarchy.
///
/// Groups hold an ordered, fixed list of children that are either nested
/// groups or data blocks.
#[derive(Clone)]
pub struct RGroup {
    streams: Arc<RStreams>,
    pos: u64,
    child_offsets: Vec<u64>,
}

impl RGroup {
    /// Create a group reader at the given position.
    pub fn new(streams: Arc<RStreams>, pos: u64, thread_hint: usize) -> Result<Self> {
        // Position 0 is the empty-group marker.
        let num_children = if pos == 0 {
            0
        } else {
            streams.read_u64(pos, thread_hint)?
        };

        if num_children > streams.size() / 8 {
            return Err(Error::InvalidContainerGroup(format!(
                "group at {} claims {} children",
                pos, num_children
            )));
        }

        let mut child_offsets = Vec::with_capacity(num_children as usize);
        for i in 0..num_children {
            child_offsets.push(streams.read_u64(pos + 8 + i * 8, thread_hint)?);
        }

        Ok(Self {
            streams,
            pos,
            child_offsets,
        })
    }

    /// Get the position of this group in the file.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Get the number of children.
    #[inline]
    pub fn num_children(&self) -> usize {
        self.child_offsets.len()
    }

    /// Check if this group has no children.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.child_offsets.is_empty()
    }

    /// Get the raw tagged offset for a child.
    pub fn child_offset(&self, index: usize) -> Result<u64> {
        self.child_offsets
            .get(index)
            .copied()
            .ok_or(Error::OutOfRange {
                index,
                count: self.child_offsets.len(),
            })
    }

    /// Check if the child at index is a group.
    pub fn is_child_group(&self, index: usize) -> Result<bool> {
        Ok(is_group_offset(self.child_offset(index)?))
    }

    /// Check if the child at index is data.
    pub fn is_child_data(&self, index: usize) -> Result<bool> {
        Ok(is_data_offset(self.child_offset(index)?))
    }

    /// Open a child group. The thread hint selects the pooled file handle
    /// used for this group's reads when not memory mapped.
    pub fn group(&self, index: usize, thread_hint: usize) -> Result<RGroup> {
        let offset = self.child_offset(index)?;
        if !is_group_offset(offset) {
            return Err(Error::TypeMismatch {
                expected: "group".to_string(),
                actual: "data".to_string(),
            });
        }
        RGroup::new(self.streams.clone(), extract_offset(offset), thread_hint)
    }

    /// Open a child data block.
    pub fn data(&self, index: usize, thread_hint: usize) -> Result<RData> {
        let offset = self.child_offset(index)?;
        if !is_data_offset(offset) {
            return Err(Error::TypeMismatch {
                expected: "data".to_string(),
                actual: "group".to_string(),
            });
        }
        RData::new(self.streams.clone(), extract_offset(offset), thread_hint)
    }
}

/// Data block in the container hierarchy.
pub struct RData {
    streams: Arc<RStreams>,
    pos: u64,
    size: u64,
    thread_hint: usize,
}

impl RData {
    /// Create a data reader at the given position.
    pub fn new(streams: Arc<RStreams>, pos: u64, thread_hint: usize) -> Result<Self> {
        // Position 0 is the empty-data marker.
        let size = if pos == 0 {
            0
        } else {
            streams.read_u64(pos, thread_hint)?
        };

        Ok(Self {
            streams,
            pos,
            size,
            thread_hint,
        })
    }

    /// Get the size of the data in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Check if this data block is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Get the position of the payload bytes (after the length field).
    #[inline]
    fn payload_pos(&self) -> u64 {
        self.pos + 8
    }

    /// Read all data as bytes.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        if self.size == 0 {
            return Ok(Vec::new());
        }
        self.streams
            .read_bytes(self.payload_pos(), self.size as usize, self.thread_hint)
    }

    /// Read data into an existing buffer.
    pub fn read_into(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() != self.size as usize {
            return Err(Error::other(format!(
                "buffer size {} does not match data size {}",
                buf.len(),
                self.size
            )));
        }
        if self.size == 0 {
            return Ok(());
        }
        self.streams
            .read_into(self.payload_pos(), buf, self.thread_hint)
    }
}
