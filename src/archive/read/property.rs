//! Read-side property tree.
//!
//! A compound decodes its child header block once at node construction and
//! materializes typed reader nodes lazily, one per child sub-group, behind
//! a per-slot weak cache: while any caller holds a node, every lookup
//! returns the same instance; once all handles drop, the next lookup builds
//! a fresh node from the shared decoded header.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::archive::codec::decode_property_headers;
use crate::archive::read::ReadContext;
use crate::container::RGroup;
use crate::core::{PropertyHeader, PropertyKind, TimeSampling};
use crate::util::{Error, Result};

/// A live read-side property node: the closed set of the three kinds.
pub enum PropertyReader {
    Scalar(ScalarReader),
    Array(ArrayReader),
    Compound(CompoundReader),
}

impl PropertyReader {
    /// The decoded header this node was built from.
    pub fn header(&self) -> &PropertyHeader {
        match self {
            Self::Scalar(r) => r.header(),
            Self::Array(r) => r.header(),
            Self::Compound(r) => r.header(),
        }
    }

    /// The property name.
    pub fn name(&self) -> &str {
        &self.header().name
    }

    /// View as a scalar reader, if this is one.
    pub fn as_scalar(&self) -> Option<&ScalarReader> {
        match self {
            Self::Scalar(r) => Some(r),
            _ => None,
        }
    }

    /// View as an array reader, if this is one.
    pub fn as_array(&self) -> Option<&ArrayReader> {
        match self {
            Self::Array(r) => Some(r),
            _ => None,
        }
    }

    /// View as a compound reader, if this is one.
    pub fn as_compound(&self) -> Option<&CompoundReader> {
        match self {
            Self::Compound(r) => Some(r),
            _ => None,
        }
    }
}

/// Decoded state of one compound group, shared by every reader wrapping it.
pub(crate) struct CompoundData {
    group: Option<RGroup>,
    headers: Vec<Arc<PropertyHeader>>,
    by_name: HashMap<String, usize>,
    made: Vec<Mutex<Weak<PropertyReader>>>,
    ctx: Arc<ReadContext>,
}

impl CompoundData {
    /// Decode a compound's header block from the trailing data slot of its
    /// container group. All-or-nothing: a corrupt block fails construction
    /// rather than yielding a partial child list.
    pub(crate) fn new(group: RGroup, thread_hint: usize, ctx: Arc<ReadContext>) -> Result<Self> {
        let num_children = group.num_children();

        let headers = if num_children > 0 && group.is_child_data(num_children - 1)? {
            let block = group.data(num_children - 1, thread_hint)?.read_all()?;
            decode_property_headers(&block, &ctx.metadata_pool)?
        } else {
            Vec::new()
        };

        if !headers.is_empty() && headers.len() > num_children - 1 {
            return Err(Error::corrupt(format!(
                "header block lists {} properties but the group has {} slots",
                headers.len(),
                num_children
            )));
        }

        tracing::trace!(count = headers.len(), "decoded property headers");

        let mut by_name = HashMap::with_capacity(headers.len());
        for (i, header) in headers.iter().enumerate() {
            by_name.insert(header.name.clone(), i);
        }
        let made = headers.iter().map(|_| Mutex::new(Weak::new())).collect();

        Ok(Self {
            group: Some(group),
            headers: headers.into_iter().map(Arc::new).collect(),
            by_name,
            made,
            ctx,
        })
    }

    /// An empty compound, used when an object carries no property group.
    pub(crate) fn empty(ctx: Arc<ReadContext>) -> Self {
        Self {
            group: None,
            headers: Vec::new(),
            by_name: HashMap::new(),
            made: Vec::new(),
            ctx,
        }
    }
}

/// Reader for a compound property.
pub struct CompoundReader {
    header: Arc<PropertyHeader>,
    data: Arc<CompoundData>,
}

impl CompoundReader {
    pub(crate) fn new(header: Arc<PropertyHeader>, data: Arc<CompoundData>) -> Self {
        Self { header, data }
    }

    /// This compound's own header.
    pub fn header(&self) -> &PropertyHeader {
        &self.header
    }

    /// Number of child properties.
    pub fn num_properties(&self) -> usize {
        self.data.headers.len()
    }

    /// Decoded header of the child at `index`.
    pub fn property_header(&self, index: usize) -> Result<&PropertyHeader> {
        self.data
            .headers
            .get(index)
            .map(Arc::as_ref)
            .ok_or(Error::OutOfRange {
                index,
                count: self.data.headers.len(),
            })
    }

    /// Decoded header of the named child, if present.
    pub fn property_header_by_name(&self, name: &str) -> Option<&PropertyHeader> {
        let idx = *self.data.by_name.get(name)?;
        Some(&self.data.headers[idx])
    }

    /// Existing live reader for the named child. A pure cache probe; never
    /// materializes.
    pub fn get_property(&self, name: &str) -> Option<Arc<PropertyReader>> {
        let idx = *self.data.by_name.get(name)?;
        self.data.made[idx].lock().upgrade()
    }

    /// Materialize (or fetch the live instance of) the child at `index`.
    pub fn property(&self, index: usize, thread_hint: usize) -> Result<Arc<PropertyReader>> {
        let header = self
            .data
            .headers
            .get(index)
            .cloned()
            .ok_or(Error::OutOfRange {
                index,
                count: self.data.headers.len(),
            })?;

        let mut made = self.data.made[index].lock();
        if let Some(live) = made.upgrade() {
            return Ok(live);
        }

        let group = self
            .data
            .group
            .as_ref()
            .ok_or_else(|| Error::InvalidContainerGroup("compound has no backing group".into()))?
            .group(index, thread_hint)?;

        let node = match header.property_kind {
            PropertyKind::Scalar => PropertyReader::Scalar(ScalarReader::new(
                header,
                group,
                thread_hint,
                &self.data.ctx,
            )?),
            PropertyKind::Array => PropertyReader::Array(ArrayReader::new(
                header,
                group,
                thread_hint,
                &self.data.ctx,
            )?),
            PropertyKind::Compound => {
                let data = Arc::new(CompoundData::new(group, thread_hint, self.data.ctx.clone())?);
                PropertyReader::Compound(CompoundReader::new(header, data))
            }
        };

        let node = Arc::new(node);
        *made = Arc::downgrade(&node);
        Ok(node)
    }

    /// Materialize the named child, or `None` if no such property exists.
    pub fn property_by_name(
        &self,
        name: &str,
        thread_hint: usize,
    ) -> Result<Option<Arc<PropertyReader>>> {
        match self.data.by_name.get(name) {
            Some(&idx) => self.property(idx, thread_hint).map(Some),
            None => Ok(None),
        }
    }
}

/// Map a requested sample index onto the stored payload slot.
///
/// Constant properties store a single payload; trailing unchanged samples
/// store nothing past the last changed slot.
fn stored_slot(header: &PropertyHeader, index: usize) -> Result<usize> {
    let count = header.next_sample_index as usize;
    if index >= count {
        return Err(Error::SampleOutOfBounds { index, count });
    }
    if header.is_constant() {
        return Ok(0);
    }
    Ok(index.min(header.last_changed_index as usize))
}

/// Reader for a scalar property.
pub struct ScalarReader {
    header: Arc<PropertyHeader>,
    group: RGroup,
    sampling: TimeSampling,
    thread_hint: usize,
}

impl ScalarReader {
    fn new(
        header: Arc<PropertyHeader>,
        group: RGroup,
        thread_hint: usize,
        ctx: &ReadContext,
    ) -> Result<Self> {
        let sampling = ctx.time_table.resolve(header.time_sampling_index)?.clone();
        Ok(Self {
            header,
            group,
            sampling,
            thread_hint,
        })
    }

    /// The decoded header.
    pub fn header(&self) -> &PropertyHeader {
        &self.header
    }

    /// Number of samples.
    pub fn num_samples(&self) -> usize {
        self.header.next_sample_index as usize
    }

    /// All samples carry the same payload.
    pub fn is_constant(&self) -> bool {
        self.header.is_constant()
    }

    /// The resolved time sampling for this property.
    pub fn time_sampling(&self) -> &TimeSampling {
        &self.sampling
    }

    /// Read the payload of one sample.
    pub fn sample(&self, index: usize) -> Result<Vec<u8>> {
        let slot = stored_slot(&self.header, index)?;
        self.group.data(slot, self.thread_hint)?.read_all()
    }

    /// Read one sample into a caller buffer of exactly
    /// `data_type.num_bytes()`.
    pub fn sample_into(&self, index: usize, out: &mut [u8]) -> Result<()> {
        let slot = stored_slot(&self.header, index)?;
        self.group.data(slot, self.thread_hint)?.read_into(out)
    }

    /// Read one sample as a plain-old-data value.
    pub fn sample_value<T: bytemuck::Pod + Default>(&self, index: usize) -> Result<T> {
        let mut value = T::default();
        self.sample_into(index, bytemuck::bytes_of_mut(&mut value))?;
        Ok(value)
    }
}

/// Reader for an array property.
pub struct ArrayReader {
    header: Arc<PropertyHeader>,
    group: RGroup,
    sampling: TimeSampling,
    thread_hint: usize,
}

impl ArrayReader {
    fn new(
        header: Arc<PropertyHeader>,
        group: RGroup,
        thread_hint: usize,
        ctx: &ReadContext,
    ) -> Result<Self> {
        let sampling = ctx.time_table.resolve(header.time_sampling_index)?.clone();
        Ok(Self {
            header,
            group,
            sampling,
            thread_hint,
        })
    }

    /// The decoded header.
    pub fn header(&self) -> &PropertyHeader {
        &self.header
    }

    /// Number of samples.
    pub fn num_samples(&self) -> usize {
        self.header.next_sample_index as usize
    }

    /// All samples carry the same payload.
    pub fn is_constant(&self) -> bool {
        self.header.is_constant()
    }

    /// The resolved time sampling for this property.
    pub fn time_sampling(&self) -> &TimeSampling {
        &self.sampling
    }

    /// Read the flattened payload of one sample.
    pub fn sample(&self, index: usize) -> Result<Vec<u8>> {
        let slot = stored_slot(&self.header, index)?;
        self.group.data(slot * 2, self.thread_hint)?.read_all()
    }

    /// Dimensions of one sample. Rank-1 samples of non-string kinds store
    /// no dims block; their element count is recovered from the payload
    /// size.
    pub fn sample_dimensions(&self, index: usize) -> Result<Vec<u64>> {
        let slot = stored_slot(&self.header, index)?;
        let dims_data = self.group.data(slot * 2 + 1, self.thread_hint)?;

        if dims_data.is_empty() {
            let payload = self.group.data(slot * 2, self.thread_hint)?;
            let element = self.header.data_type.num_bytes() as u64;
            return Ok(vec![if element == 0 {
                0
            } else {
                payload.size() / element
            }]);
        }

        let bytes = dims_data.read_all()?;
        if bytes.len() % 8 != 0 {
            return Err(Error::invalid("dimensions block size not a multiple of 8"));
        }
        Ok(bytes
            .chunks_exact(8)
            .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
            .collect())
    }

    /// Total element count of one sample.
    pub fn sample_len(&self, index: usize) -> Result<usize> {
        Ok(self
            .sample_dimensions(index)?
            .iter()
            .product::<u64>() as usize)
    }

    /// Read one sample as a vector of plain-old-data elements.
    pub fn sample_slice<T: bytemuck::Pod + Clone>(&self, index: usize) -> Result<Vec<T>> {
        let bytes = self.sample(index)?;
        let slice: &[T] = bytemuck::try_cast_slice(&bytes)
            .map_err(|_| Error::invalid("sample payload does not cast to element type"))?;
        Ok(slice.to_vec())
    }
}
