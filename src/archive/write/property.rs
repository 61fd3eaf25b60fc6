//! Write-side property tree.
//!
//! A compound writer allocates one container sub-group per property at
//! creation time (creation order is the on-disk child order) and defers
//! byte-encoding of the header block until `write_headers`, because sample
//! bookkeeping is only final once all child samples have been written.
//!
//! Scalar and array writers append sample payloads to their own sub-group
//! as samples arrive. An unchanged sample writes no new payload: interior
//! repeats are later filled in as references to the previous payload, and
//! trailing repeats are recovered from the header bookkeeping alone.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::archive::codec::encode_property_headers;
use crate::archive::write::WriteContext;
use crate::container::{WData, WGroupHandle};
use crate::core::{MetaData, PropertyHeader};
use crate::util::{DataType, Error, Result};

/// A live write-side property node: the closed set of the three kinds.
#[derive(Clone)]
pub enum PropertyWriter {
    Scalar(Arc<ScalarWriter>),
    Array(Arc<ArrayWriter>),
    Compound(Arc<CompoundWriter>),
}

impl PropertyWriter {
    /// Snapshot of the node's header with current bookkeeping.
    pub fn header(&self) -> PropertyHeader {
        match self {
            Self::Scalar(w) => w.header(),
            Self::Array(w) => w.header(),
            Self::Compound(w) => w.header(),
        }
    }

    /// The property name.
    pub fn name(&self) -> String {
        self.header().name
    }
}

struct CompoundState {
    children: Vec<PropertyWriter>,
    by_name: HashMap<String, usize>,
    finalized: bool,
}

/// Writer for a compound property: a container of named child properties.
pub struct CompoundWriter {
    header: PropertyHeader,
    group: WGroupHandle,
    ctx: Arc<WriteContext>,
    state: Mutex<CompoundState>,
}

impl CompoundWriter {
    pub(crate) fn new(
        header: PropertyHeader,
        group: WGroupHandle,
        ctx: Arc<WriteContext>,
    ) -> Self {
        Self {
            header,
            group,
            ctx,
            state: Mutex::new(CompoundState {
                children: Vec::new(),
                by_name: HashMap::new(),
                finalized: false,
            }),
        }
    }

    /// This compound's own header.
    pub fn header(&self) -> PropertyHeader {
        self.header.clone()
    }

    /// Number of child properties created so far.
    pub fn num_properties(&self) -> usize {
        self.state.lock().children.len()
    }

    /// Header of the child at `index`, with current bookkeeping.
    pub fn property_header(&self, index: usize) -> Result<PropertyHeader> {
        let state = self.state.lock();
        state
            .children
            .get(index)
            .map(PropertyWriter::header)
            .ok_or(Error::OutOfRange {
                index,
                count: state.children.len(),
            })
    }

    /// Header of the named child, if present.
    pub fn property_header_by_name(&self, name: &str) -> Option<PropertyHeader> {
        let state = self.state.lock();
        let idx = *state.by_name.get(name)?;
        Some(state.children[idx].header())
    }

    /// Existing writer handle for the named child. A cache lookup only;
    /// never creates.
    pub fn get_property(&self, name: &str) -> Option<PropertyWriter> {
        let state = self.state.lock();
        let idx = *state.by_name.get(name)?;
        Some(state.children[idx].clone())
    }

    fn check_creation(state: &CompoundState, name: &str) -> Result<()> {
        if state.finalized {
            return Err(Error::Frozen);
        }
        if state.by_name.contains_key(name) {
            return Err(Error::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    fn check_data_type(data_type: DataType) -> Result<()> {
        if !data_type.is_valid() {
            return Err(Error::InvalidDataType(format!(
                "cannot create property with {data_type:?}"
            )));
        }
        Ok(())
    }

    /// Create a scalar child property bound to a fresh container sub-group.
    pub fn create_scalar_property(
        &self,
        name: &str,
        meta_data: MetaData,
        data_type: DataType,
        time_sampling_index: u32,
    ) -> Result<Arc<ScalarWriter>> {
        Self::check_data_type(data_type)?;
        self.ctx.time_table.lock().resolve(time_sampling_index)?;

        let mut state = self.state.lock();
        Self::check_creation(&state, name)?;

        let header = PropertyHeader::scalar(name, data_type)
            .with_time_sampling(time_sampling_index)
            .with_meta_data(meta_data);
        let writer = Arc::new(ScalarWriter {
            group: self.group.add_group()?,
            state: Mutex::new(LeafState::new(header)),
        });

        state.by_name.insert(name.to_string(), state.children.len());
        state.children.push(PropertyWriter::Scalar(writer.clone()));
        Ok(writer)
    }

    /// Create an array child property bound to a fresh container sub-group.
    pub fn create_array_property(
        &self,
        name: &str,
        meta_data: MetaData,
        data_type: DataType,
        time_sampling_index: u32,
    ) -> Result<Arc<ArrayWriter>> {
        Self::check_data_type(data_type)?;
        self.ctx.time_table.lock().resolve(time_sampling_index)?;

        let mut state = self.state.lock();
        Self::check_creation(&state, name)?;

        let header = PropertyHeader::array(name, data_type)
            .with_time_sampling(time_sampling_index)
            .with_meta_data(meta_data);
        let writer = Arc::new(ArrayWriter {
            group: self.group.add_group()?,
            state: Mutex::new(LeafState::new(header)),
        });

        state.by_name.insert(name.to_string(), state.children.len());
        state.children.push(PropertyWriter::Array(writer.clone()));
        Ok(writer)
    }

    /// Create a compound child property bound to a fresh container sub-group.
    pub fn create_compound_property(
        &self,
        name: &str,
        meta_data: MetaData,
    ) -> Result<Arc<CompoundWriter>> {
        let mut state = self.state.lock();
        Self::check_creation(&state, name)?;

        let header = PropertyHeader::compound(name).with_meta_data(meta_data);
        let writer = Arc::new(CompoundWriter::new(
            header,
            self.group.add_group()?,
            self.ctx.clone(),
        ));

        state.by_name.insert(name.to_string(), state.children.len());
        state.children.push(PropertyWriter::Compound(writer.clone()));
        Ok(writer)
    }

    /// Flush the header block: finalize compound children recursively,
    /// encode the ordered header list, and append it as the trailing data
    /// slot of this compound's group. A compound with zero children appends
    /// nothing. Further child creation fails once flushed.
    pub fn write_headers(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.finalized {
            return Ok(());
        }
        state.finalized = true;

        for child in &state.children {
            if let PropertyWriter::Compound(compound) = child {
                compound.write_headers()?;
            }
        }

        let headers: Vec<PropertyHeader> =
            state.children.iter().map(PropertyWriter::header).collect();

        {
            let mut table = self.ctx.time_table.lock();
            for header in &headers {
                if header.is_compound() {
                    continue;
                }
                let counted = if header.is_constant() && header.next_sample_index > 0 {
                    1
                } else {
                    header.next_sample_index
                };
                table.note_samples(header.time_sampling_index, counted);
            }
        }

        if headers.is_empty() {
            return Ok(());
        }

        tracing::trace!(compound = %self.header.name, count = headers.len(), "flushing property headers");

        let block = {
            let mut pool = self.ctx.metadata_pool.lock();
            encode_property_headers(&headers, &mut pool)
        };
        self.group.add_data(&block)?;
        Ok(())
    }
}

/// Shared bookkeeping of a scalar or array leaf writer.
struct LeafState {
    header: PropertyHeader,
    /// Payload and container reference of the most recently written sample.
    prev: Option<PrevSample>,
    /// Number of container child slots pushed so far (per-sample for
    /// scalars, pairs for arrays).
    stored: u32,
    /// Element count of the previous sample (arrays).
    prev_count: Option<usize>,
}

struct PrevSample {
    payload: Vec<u8>,
    data: WData,
    dims: Vec<u64>,
    dims_data: WData,
}

impl LeafState {
    fn new(header: PropertyHeader) -> Self {
        Self {
            header,
            prev: None,
            stored: 0,
            prev_count: None,
        }
    }

    fn mark_changed(&mut self, index: u32) {
        if index != 0 {
            if self.header.first_changed_index == 0 {
                self.header.first_changed_index = index;
            }
            self.header.last_changed_index = index;
        }
    }
}

/// Writer for a scalar property: one fixed-extent value per sample.
pub struct ScalarWriter {
    group: WGroupHandle,
    state: Mutex<LeafState>,
}

impl ScalarWriter {
    /// Snapshot of the header with current bookkeeping.
    pub fn header(&self) -> PropertyHeader {
        self.state.lock().header.clone()
    }

    /// Number of samples written so far.
    pub fn num_samples(&self) -> u32 {
        self.state.lock().header.next_sample_index
    }

    /// Write the next sample. The payload must be exactly
    /// `data_type.num_bytes()` long.
    pub fn set_sample(&self, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock();

        let expected = state.header.data_type.num_bytes();
        if !state.header.data_type.kind.is_string() && data.len() != expected {
            return Err(Error::TypeMismatch {
                expected: format!("{expected} byte sample"),
                actual: format!("{} bytes", data.len()),
            });
        }

        let index = state.header.next_sample_index;
        let changed = match &state.prev {
            None => true,
            Some(prev) => prev.payload != data,
        };

        if changed {
            // Interior repeats between the last stored slot and this index
            // reference the previous payload, keeping slot == sample index.
            if let Some(prev) = &state.prev {
                for _ in state.stored..index {
                    self.group.add_existing_data(&prev.data)?;
                }
            }
            let wdata = self.group.add_data(data)?;
            state.stored = index + 1;
            state.prev = Some(PrevSample {
                payload: data.to_vec(),
                data: wdata,
                dims: Vec::new(),
                dims_data: WData::EMPTY,
            });
            state.mark_changed(index);
        }

        state.header.next_sample_index = index + 1;
        Ok(())
    }

    /// Write the next sample from a plain-old-data value.
    pub fn set_sample_value<T: bytemuck::Pod>(&self, value: &T) -> Result<()> {
        self.set_sample(bytemuck::bytes_of(value))
    }
}

/// Writer for an array property: a variable-length sequence per sample.
pub struct ArrayWriter {
    group: WGroupHandle,
    state: Mutex<LeafState>,
}

impl ArrayWriter {
    /// Snapshot of the header with current bookkeeping.
    pub fn header(&self) -> PropertyHeader {
        self.state.lock().header.clone()
    }

    /// Number of samples written so far.
    pub fn num_samples(&self) -> u32 {
        self.state.lock().header.next_sample_index
    }

    /// Write the next sample: `data` holds `dims` elements flattened in
    /// row-major order.
    pub fn set_sample(&self, data: &[u8], dims: &[usize]) -> Result<()> {
        let mut state = self.state.lock();

        let count: usize = dims.iter().product();
        let element = state.header.data_type.num_bytes();
        if !state.header.data_type.kind.is_string() && count * element != data.len() {
            return Err(Error::TypeMismatch {
                expected: format!("{count} elements of {element} bytes"),
                actual: format!("{} bytes", data.len()),
            });
        }

        if state.header.is_scalar_like && count != 1 {
            state.header.is_scalar_like = false;
        }
        if let Some(prev_count) = state.prev_count {
            if prev_count != count {
                state.header.is_homogenous = false;
            }
        }
        state.prev_count = Some(count);

        let dims: Vec<u64> = dims.iter().map(|&d| d as u64).collect();
        let index = state.header.next_sample_index;
        let changed = match &state.prev {
            None => true,
            Some(prev) => prev.payload != data || prev.dims != dims,
        };

        if changed {
            if let Some(prev) = &state.prev {
                for _ in state.stored..index {
                    self.group.add_existing_data(&prev.data)?;
                    self.group.add_existing_data(&prev.dims_data)?;
                }
            }

            let wdata = self.group.add_data(data)?;

            // Rank-1 non-string dimensions are recoverable from the payload
            // size; store the empty marker instead of a dims block.
            let dims_data = if dims.len() <= 1 && !state.header.data_type.kind.is_string() {
                let empty = WData::EMPTY;
                self.group.add_existing_data(&empty)?;
                empty
            } else {
                let bytes: Vec<u8> = dims.iter().flat_map(|d| d.to_le_bytes()).collect();
                self.group.add_data(&bytes)?
            };

            state.stored = index + 1;
            state.prev = Some(PrevSample {
                payload: data.to_vec(),
                data: wdata,
                dims,
                dims_data,
            });
            state.mark_changed(index);
        }

        state.header.next_sample_index = index + 1;
        Ok(())
    }

    /// Write the next sample from a flat slice of plain-old-data elements.
    pub fn set_sample_slice<T: bytemuck::Pod>(&self, values: &[T]) -> Result<()> {
        let element = {
            let state = self.state.lock();
            state.header.data_type.num_bytes()
        };
        let bytes: &[u8] = bytemuck::cast_slice(values);
        let count = if element == 0 { 0 } else { bytes.len() / element };
        self.set_sample(bytes, &[count])
    }
}
