//! Header codec - the compact byte encoding of property and object
//! descriptors, the interned metadata pool, and the time-sampling table
//! wire format.
//!
//! Encoding and decoding round-trip byte-for-byte: every flag and
//! bookkeeping integer survives. Malformed or truncated header bytes fail
//! with `CorruptHeaderBlock`; an unrecognized element kind or zero extent
//! fails with `InvalidDataType` and is never coerced.

use std::collections::HashMap;

use crate::core::{MetaData, ObjectHeader, PropertyHeader, PropertyKind, TimeSampling, TimeSamplingType};
use crate::util::{Chrono, DataType, ElementKind, Error, Result};

/// Sentinel time-per-cycle marking acyclic sampling in the stored table.
pub const ACYCLIC_TIME_PER_CYCLE: Chrono = f64::MAX / 32.0;

/// Metadata pool index marking inline metadata.
const INLINE_METADATA: u8 = 0xff;

// Property info word bits. Bits 0-1 property kind, bits 2-3 size hint,
// bits 4-7 element kind, bits 12-19 extent, bits 20-27 metadata index.
const INFO_KIND_MASK: u32 = 0x0003;
const INFO_HINT_SHIFT: u32 = 2;
const INFO_POD_SHIFT: u32 = 4;
const INFO_HAS_TSIDX: u32 = 0x0100;
const INFO_EXPLICIT_CHANGED: u32 = 0x0200;
const INFO_HOMOGENOUS: u32 = 0x0400;
const INFO_CONSTANT: u32 = 0x0800;
const INFO_EXTENT_SHIFT: u32 = 12;
const INFO_METADATA_SHIFT: u32 = 20;

// ============================================================================
// Metadata pool
// ============================================================================

/// Archive-wide interning table for serialized metadata blobs.
///
/// Index 0 is always the empty metadata. At most 254 further entries of at
/// most 255 serialized bytes each; anything larger or later is stored inline
/// in the header record under the marker index 0xff.
pub struct MetaDataPool {
    entries: Vec<MetaData>,
    by_serialized: HashMap<String, usize>,
}

impl Default for MetaDataPool {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaDataPool {
    /// Create a pool with the reserved empty entry at index 0.
    pub fn new() -> Self {
        Self {
            entries: vec![MetaData::new()],
            by_serialized: HashMap::new(),
        }
    }

    /// Intern a metadata blob, returning its pool index or the inline marker.
    pub fn index(&mut self, md: &MetaData) -> u8 {
        let serialized = md.serialize();
        if serialized.is_empty() {
            return 0;
        }
        if let Some(&idx) = self.by_serialized.get(&serialized) {
            return idx as u8;
        }
        if self.entries.len() >= 255 || serialized.len() > 255 {
            return INLINE_METADATA;
        }
        let idx = self.entries.len();
        self.entries.push(md.clone());
        self.by_serialized.insert(serialized, idx);
        idx as u8
    }

    /// The interned entries, in index order.
    pub fn entries(&self) -> &[MetaData] {
        &self.entries
    }

    /// Serialize the pool (entry 0 is implied and not stored).
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for md in self.entries.iter().skip(1) {
            let serialized = md.serialize();
            buf.push(serialized.len() as u8);
            buf.extend_from_slice(serialized.as_bytes());
        }
        buf
    }
}

/// Decode the interned metadata pool. Entry 0 is always the empty metadata.
pub fn decode_metadata_pool(buf: &[u8]) -> Result<Vec<MetaData>> {
    let mut entries = vec![MetaData::new()];

    // 254 entries of at most 255 bytes each, plus length prefixes
    if buf.len() > 65536 {
        return Err(Error::invalid("indexed metadata pool too large"));
    }

    let mut pos = 0;
    while pos < buf.len() {
        let len = buf[pos] as usize;
        pos += 1;
        if pos + len > buf.len() {
            return Err(Error::invalid("indexed metadata entry truncated"));
        }
        let s = std::str::from_utf8(&buf[pos..pos + len])
            .map_err(|e| Error::invalid(format!("invalid UTF-8 in metadata pool: {e}")))?;
        pos += len;
        entries.push(MetaData::parse(s));
    }

    Ok(entries)
}

// ============================================================================
// Variable-width integers
// ============================================================================

/// Write a u32 using the record's size hint (1, 2 or 4 bytes).
fn write_with_hint(buf: &mut Vec<u8>, value: u32, hint: u8) {
    match hint {
        0 => buf.push(value as u8),
        1 => buf.extend_from_slice(&(value as u16).to_le_bytes()),
        _ => buf.extend_from_slice(&value.to_le_bytes()),
    }
}

/// Read a u32 using the record's size hint.
fn read_with_hint(buf: &[u8], pos: &mut usize, hint: u32) -> Result<u32> {
    let width = match hint {
        0 => 1,
        1 => 2,
        2 => 4,
        _ => return Err(Error::corrupt("invalid size hint")),
    };
    if *pos + width > buf.len() {
        return Err(Error::corrupt("truncated integer in header record"));
    }
    let value = match width {
        1 => buf[*pos] as u32,
        2 => u16::from_le_bytes([buf[*pos], buf[*pos + 1]]) as u32,
        _ => u32::from_le_bytes([buf[*pos], buf[*pos + 1], buf[*pos + 2], buf[*pos + 3]]),
    };
    *pos += width;
    Ok(value)
}

fn read_str<'a>(buf: &'a [u8], pos: &mut usize, len: usize, what: &str) -> Result<&'a str> {
    if *pos + len > buf.len() {
        return Err(Error::corrupt(format!("truncated {what}")));
    }
    let s = std::str::from_utf8(&buf[*pos..*pos + len])
        .map_err(|e| Error::corrupt(format!("invalid UTF-8 in {what}: {e}")))?;
    *pos += len;
    Ok(s)
}

// ============================================================================
// Property headers
// ============================================================================

/// Build the info word for one property record.
fn property_info(header: &PropertyHeader, meta_index: u8) -> u32 {
    let name_size = header.name.len() as u32;
    let meta_size = header.meta_data.serialize().len() as u32;
    let max_size = meta_size
        .max(name_size)
        .max(header.next_sample_index)
        .max(header.time_sampling_index);
    let size_hint: u32 = if max_size < 256 {
        0
    } else if max_size < 65536 {
        1
    } else {
        2
    };

    let mut info = size_hint << INFO_HINT_SHIFT;

    match header.property_kind {
        PropertyKind::Compound => {}
        PropertyKind::Scalar => info |= 1,
        PropertyKind::Array => info |= if header.is_scalar_like { 3 } else { 2 },
    }

    if header.property_kind != PropertyKind::Compound {
        info |= (header.data_type.kind.to_u8() as u32 & 0x0f) << INFO_POD_SHIFT;
        info |= (header.data_type.extent as u32 & 0xff) << INFO_EXTENT_SHIFT;

        if header.is_homogenous {
            info |= INFO_HOMOGENOUS;
        }
        if header.time_sampling_index != 0 {
            info |= INFO_HAS_TSIDX;
        }

        if header.is_constant() {
            info |= INFO_CONSTANT;
        } else if header.first_changed_index != 1
            || header.last_changed_index != header.next_sample_index.saturating_sub(1)
        {
            info |= INFO_EXPLICIT_CHANGED;
        }
    }

    info | ((meta_index as u32) << INFO_METADATA_SHIFT)
}

/// Encode an ordered sequence of property headers into one block.
pub fn encode_property_headers(headers: &[PropertyHeader], pool: &mut MetaDataPool) -> Vec<u8> {
    let mut buf = Vec::new();

    for header in headers {
        let meta_index = pool.index(&header.meta_data);
        let info = property_info(header, meta_index);
        buf.extend_from_slice(&info.to_le_bytes());

        let hint = ((info >> INFO_HINT_SHIFT) & 0x03) as u8;

        if header.property_kind != PropertyKind::Compound {
            write_with_hint(&mut buf, header.next_sample_index, hint);

            if (info & INFO_EXPLICIT_CHANGED) != 0 {
                write_with_hint(&mut buf, header.first_changed_index, hint);
                write_with_hint(&mut buf, header.last_changed_index, hint);
            }

            if (info & INFO_HAS_TSIDX) != 0 {
                write_with_hint(&mut buf, header.time_sampling_index, hint);
            }
        }

        write_with_hint(&mut buf, header.name.len() as u32, hint);
        buf.extend_from_slice(header.name.as_bytes());

        if meta_index == INLINE_METADATA {
            let serialized = header.meta_data.serialize();
            write_with_hint(&mut buf, serialized.len() as u32, hint);
            buf.extend_from_slice(serialized.as_bytes());
        }
    }

    buf
}

/// Decode a property header block into its ordered header list.
///
/// All-or-nothing: any malformed record fails the whole block.
pub fn decode_property_headers(buf: &[u8], pool: &[MetaData]) -> Result<Vec<PropertyHeader>> {
    let mut headers = Vec::new();
    let mut pos = 0;

    while pos < buf.len() {
        if pos + 4 > buf.len() {
            return Err(Error::corrupt("truncated property info word"));
        }
        let info = u32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]]);
        pos += 4;

        let kind_bits = info & INFO_KIND_MASK;
        let property_kind = match kind_bits {
            0 => PropertyKind::Compound,
            1 => PropertyKind::Scalar,
            _ => PropertyKind::Array,
        };
        let is_scalar_like = (kind_bits & 1) != 0;
        let hint = (info >> INFO_HINT_SHIFT) & 0x03;

        let mut header = match property_kind {
            PropertyKind::Compound => PropertyHeader::compound(""),
            PropertyKind::Scalar | PropertyKind::Array => {
                let kind = ElementKind::from_u8(((info >> INFO_POD_SHIFT) & 0x0f) as u8);
                let extent = ((info >> INFO_EXTENT_SHIFT) & 0xff) as u8;
                let data_type = DataType::new(kind, extent);
                if !data_type.is_valid() {
                    return Err(Error::InvalidDataType(format!(
                        "stored property carries {data_type:?}"
                    )));
                }

                let next_sample_index = read_with_hint(buf, &mut pos, hint)?;

                let (first_changed_index, last_changed_index) =
                    if (info & INFO_EXPLICIT_CHANGED) != 0 {
                        let first = read_with_hint(buf, &mut pos, hint)?;
                        let last = read_with_hint(buf, &mut pos, hint)?;
                        (first, last)
                    } else if (info & INFO_CONSTANT) != 0 {
                        (0, 0)
                    } else {
                        (1, next_sample_index.saturating_sub(1))
                    };

                let time_sampling_index = if (info & INFO_HAS_TSIDX) != 0 {
                    read_with_hint(buf, &mut pos, hint)?
                } else {
                    0
                };

                let mut h = match property_kind {
                    PropertyKind::Scalar => PropertyHeader::scalar("", data_type),
                    _ => PropertyHeader::array("", data_type),
                };
                h.is_scalar_like = is_scalar_like;
                h.is_homogenous = (info & INFO_HOMOGENOUS) != 0;
                h.next_sample_index = next_sample_index;
                h.first_changed_index = first_changed_index;
                h.last_changed_index = last_changed_index;
                h.time_sampling_index = time_sampling_index;
                h
            }
        };

        let name_size = read_with_hint(buf, &mut pos, hint)? as usize;
        if name_size == 0 {
            return Err(Error::corrupt("empty property name"));
        }
        header.name = read_str(buf, &mut pos, name_size, "property name")?.to_string();

        let meta_index = ((info >> INFO_METADATA_SHIFT) & 0xff) as usize;
        header.meta_data = if meta_index == INLINE_METADATA as usize {
            let meta_size = read_with_hint(buf, &mut pos, hint)? as usize;
            MetaData::parse(read_str(buf, &mut pos, meta_size, "property metadata")?)
        } else if meta_index < pool.len() {
            pool[meta_index].clone()
        } else {
            return Err(Error::corrupt(format!("metadata pool index {meta_index} out of range")));
        };

        headers.push(header);
    }

    Ok(headers)
}

// ============================================================================
// Object headers
// ============================================================================

/// Encode an ordered sequence of object headers into one block.
///
/// The derived `full_name` is not stored; it is rebuilt from the parent
/// path on decode.
pub fn encode_object_headers(headers: &[ObjectHeader], pool: &mut MetaDataPool) -> Vec<u8> {
    let mut buf = Vec::new();

    for header in headers {
        buf.extend_from_slice(&(header.name.len() as u32).to_le_bytes());
        buf.extend_from_slice(header.name.as_bytes());

        let meta_index = pool.index(&header.meta_data);
        buf.push(meta_index);
        if meta_index == INLINE_METADATA {
            let serialized = header.meta_data.serialize();
            buf.extend_from_slice(&(serialized.len() as u32).to_le_bytes());
            buf.extend_from_slice(serialized.as_bytes());
        }
    }

    buf
}

/// Decode an object header block, deriving full paths under `parent_path`.
pub fn decode_object_headers(
    buf: &[u8],
    parent_path: &str,
    pool: &[MetaData],
) -> Result<Vec<ObjectHeader>> {
    let mut headers = Vec::new();
    let mut pos = 0;

    while pos < buf.len() {
        if pos + 4 > buf.len() {
            return Err(Error::corrupt("truncated object name length"));
        }
        let name_size =
            u32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]]) as usize;
        pos += 4;
        if name_size == 0 {
            return Err(Error::corrupt("empty object name"));
        }
        let name = read_str(buf, &mut pos, name_size, "object name")?.to_string();

        if pos >= buf.len() {
            return Err(Error::corrupt("truncated object metadata index"));
        }
        let meta_index = buf[pos] as usize;
        pos += 1;

        let meta_data = if meta_index == INLINE_METADATA as usize {
            if pos + 4 > buf.len() {
                return Err(Error::corrupt("truncated object metadata length"));
            }
            let meta_size =
                u32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]]) as usize;
            pos += 4;
            MetaData::parse(read_str(buf, &mut pos, meta_size, "object metadata")?)
        } else if meta_index < pool.len() {
            pool[meta_index].clone()
        } else {
            return Err(Error::corrupt(format!("metadata pool index {meta_index} out of range")));
        };

        let full_name = if parent_path.is_empty() || parent_path == "/" {
            format!("/{name}")
        } else {
            format!("{parent_path}/{name}")
        };

        headers.push(ObjectHeader::with_meta_data(name, full_name, meta_data));
    }

    Ok(headers)
}

// ============================================================================
// Time-sampling table
// ============================================================================

/// Serialize the time-sampling table and per-sampling maximum sample counts.
pub fn encode_time_samplings(samplings: &[TimeSampling], max_samples: &[u32]) -> Vec<u8> {
    let mut buf = Vec::new();

    for (i, ts) in samplings.iter().enumerate() {
        let max_sample = max_samples.get(i).copied().unwrap_or(0);
        buf.extend_from_slice(&max_sample.to_le_bytes());

        let (tpc, times): (Chrono, &[Chrono]) = match &ts.sampling_type {
            TimeSamplingType::Uniform {
                time_per_cycle,
                start_time,
            } => (*time_per_cycle, std::slice::from_ref(start_time)),
            TimeSamplingType::Cyclic {
                time_per_cycle,
                times,
            } => (*time_per_cycle, times),
            TimeSamplingType::Acyclic { times } => (ACYCLIC_TIME_PER_CYCLE, times),
        };

        buf.extend_from_slice(&tpc.to_le_bytes());
        buf.extend_from_slice(&(times.len() as u32).to_le_bytes());
        for t in times {
            buf.extend_from_slice(&t.to_le_bytes());
        }
    }

    buf
}

/// Decode the time-sampling table and max sample counts.
pub fn decode_time_samplings(buf: &[u8]) -> Result<(Vec<TimeSampling>, Vec<u32>)> {
    let mut samplings = Vec::new();
    let mut max_samples = Vec::new();
    let mut pos = 0;

    while pos < buf.len() {
        if pos + 4 + 8 + 4 > buf.len() {
            return Err(Error::invalid("time sampling entry truncated"));
        }

        let max_sample = u32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]]);
        pos += 4;

        let tpc = Chrono::from_le_bytes(buf[pos..pos + 8].try_into().unwrap());
        pos += 8;

        let count =
            u32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]]) as usize;
        pos += 4;

        if count == 0 || pos + 8 * count > buf.len() {
            return Err(Error::invalid("time sampling times truncated"));
        }

        let mut times = Vec::with_capacity(count);
        for _ in 0..count {
            times.push(Chrono::from_le_bytes(buf[pos..pos + 8].try_into().unwrap()));
            pos += 8;
        }

        let ts = if tpc == ACYCLIC_TIME_PER_CYCLE {
            TimeSampling::acyclic(times)
        } else if count == 1 {
            TimeSampling::uniform(tpc, times[0])
        } else {
            TimeSampling::cyclic(tpc, times)
        };

        max_samples.push(max_sample);
        samplings.push(ts);
    }

    Ok((samplings, max_samples))
}

// ============================================================================
// Tests
// ============================================================================
