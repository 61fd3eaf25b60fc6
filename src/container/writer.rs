//! Vault container writer.
//!
//! Write model: data blocks are appended to the stream the moment they are
//! added, group offset tables are written post-order when the archive
//! freezes, and the root position and frozen flag are patched into the file
//! header last. Group handles stay live for the whole write session, so a
//! parent can keep allocating sub-groups while children are still filling.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use byteorder::{LittleEndian, WriteBytesExt};
use parking_lot::Mutex;

use super::format::*;
use crate::util::{Error, Result};

/// Output stream for writing vault data.
pub struct WStream {
    writer: BufWriter<File>,
    pos: u64,
}

impl WStream {
    /// Create a new output stream for the given file path.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            writer: BufWriter::with_capacity(2 * 1024 * 1024, file),
            pos: 0,
        })
    }

    /// Get the current write position.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Write bytes and advance position.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.pos += data.len() as u64;
        Ok(())
    }

    /// Write a u64 value (little-endian).
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.writer.write_u64::<LittleEndian>(value)?;
        self.pos += 8;
        Ok(())
    }

    /// Write a u16 value (little-endian).
    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.writer.write_u16::<LittleEndian>(value)?;
        self.pos += 2;
        Ok(())
    }

    /// Write a u8 value.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.writer.write_u8(value)?;
        self.pos += 1;
        Ok(())
    }

    /// Seek to a position and return the new position.
    pub fn seek(&mut self, pos: u64) -> Result<u64> {
        self.writer.flush()?;
        let new_pos = self.writer.seek(SeekFrom::Start(pos))?;
        self.pos = new_pos;
        Ok(new_pos)
    }

    /// Seek to end and return the position.
    pub fn seek_end(&mut self) -> Result<u64> {
        self.writer.flush()?;
        let new_pos = self.writer.seek(SeekFrom::End(0))?;
        self.pos = new_pos;
        Ok(new_pos)
    }

    /// Flush the buffer to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Reference to an already-written data block (tagged offset).
///
/// Adding it to another slot references the same bytes without rewriting
/// them, which is how unchanged samples are deduplicated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WData {
    offset: u64,
}

impl WData {
    /// The empty-data marker.
    pub const EMPTY: Self = Self { offset: EMPTY_DATA };

    /// Check if this references the empty-data marker.
    #[inline]
    pub fn is_empty(&self) -> bool {
        is_empty_offset(self.offset)
    }
}

/// Shared handle to a writable group.
pub type WGroupHandle = Arc<WGroup>;

enum WChild {
    /// Nested group, closed post-order at freeze time.
    Group(WGroupHandle),
    /// Tagged offset of data already in the stream.
    Tagged(u64),
}

struct WGroupState {
    children: Vec<WChild>,
    /// Set once the offset table has been written.
    closed: Option<u64>,
}

/// A writable group in the container hierarchy.
pub struct WGroup {
    stream: Arc<Mutex<WStream>>,
    state: Mutex<WGroupState>,
}

impl WGroup {
    fn new(stream: Arc<Mutex<WStream>>) -> WGroupHandle {
        Arc::new(Self {
            stream,
            state: Mutex::new(WGroupState {
                children: Vec::new(),
                closed: None,
            }),
        })
    }

    /// Get the number of child slots.
    pub fn num_children(&self) -> usize {
        self.state.lock().children.len()
    }

    /// Allocate a nested group as the next child slot.
    pub fn add_group(&self) -> Result<WGroupHandle> {
        let mut state = self.state.lock();
        if state.closed.is_some() {
            return Err(Error::Frozen);
        }
        let child = WGroup::new(self.stream.clone());
        state.children.push(WChild::Group(child.clone()));
        Ok(child)
    }

    /// Append a data block as the next child slot. The bytes are written to
    /// the stream immediately; empty data becomes the empty-data marker.
    pub fn add_data(&self, data: &[u8]) -> Result<WData> {
        let mut state = self.state.lock();
        if state.closed.is_some() {
            return Err(Error::Frozen);
        }

        let wdata = if data.is_empty() {
            WData::EMPTY
        } else {
            let mut stream = self.stream.lock();
            let pos = stream.pos();
            stream.write_u64(data.len() as u64)?;
            stream.write_bytes(data)?;
            WData {
                offset: make_data_offset(pos),
            }
        };

        state.children.push(WChild::Tagged(wdata.offset));
        Ok(wdata)
    }

    /// Reference an already-written data block as the next child slot.
    pub fn add_existing_data(&self, data: &WData) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed.is_some() {
            return Err(Error::Frozen);
        }
        state.children.push(WChild::Tagged(data.offset));
        Ok(())
    }

    /// Close this group: close nested groups post-order, write the offset
    /// table, and return this group's tagged position. A group with no
    /// children becomes the empty-group marker. Idempotent.
    fn close(&self) -> Result<u64> {
        let mut state = self.state.lock();
        if let Some(pos) = state.closed {
            return Ok(pos);
        }

        let mut offsets = Vec::with_capacity(state.children.len());
        for child in &state.children {
            match child {
                WChild::Group(group) => offsets.push(make_group_offset(group.close()?)),
                WChild::Tagged(offset) => offsets.push(*offset),
            }
        }

        let pos = if offsets.is_empty() {
            EMPTY_GROUP
        } else {
            let mut stream = self.stream.lock();
            let pos = stream.pos();
            stream.write_u64(offsets.len() as u64)?;
            for offset in &offsets {
                stream.write_u64(*offset)?;
            }
            pos
        };

        state.closed = Some(pos);
        Ok(pos)
    }
}

/// Vault archive writer.
pub struct WArchive {
    stream: Arc<Mutex<WStream>>,
    root: WGroupHandle,
}

impl WArchive {
    /// Create a new vault file for writing. The header is written with the
    /// frozen flag clear and a placeholder root position.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let mut stream = WStream::create(path)?;

        stream.write_bytes(VAULT_MAGIC)?;
        stream.write_u8(NOT_FROZEN_FLAG)?;
        stream.write_u16(CURRENT_VERSION)?;
        stream.write_u64(0)?; // root position placeholder

        let stream = Arc::new(Mutex::new(stream));
        let root = WGroup::new(stream.clone());

        Ok(Self { stream, root })
    }

    /// Get the root group.
    #[inline]
    pub fn root(&self) -> &WGroupHandle {
        &self.root
    }

    /// Close every group bottom-up, patch the header with the root position
    /// and frozen flag, and flush. Consumes the archive; group handles kept
    /// by the caller reject further mutation.
    pub fn freeze(self) -> Result<()> {
        let root_pos = self.root.close()?;

        let mut stream = self.stream.lock();
        stream.seek(FROZEN_OFFSET as u64)?;
        stream.write_u8(FROZEN_FLAG)?;
        stream.seek(ROOT_POS_OFFSET as u64)?;
        stream.write_u64(root_pos)?;
        stream.seek_end()?;
        stream.flush()?;

        Ok(())
    }
}
