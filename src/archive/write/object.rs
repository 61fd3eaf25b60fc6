//! Write-side object tree.
//!
//! Every object group reserves slot 0 for the object's top-level property
//! compound; child objects occupy slots 1..=N in creation order and the
//! encoded child-header block lands in the trailing data slot on finalize.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::archive::codec::encode_object_headers;
use crate::archive::write::WriteContext;
use crate::archive::write::property::CompoundWriter;
use crate::container::WGroupHandle;
use crate::core::{MetaData, ObjectHeader, PropertyHeader};
use crate::util::{Error, Result};

struct ObjectState {
    children: Vec<Arc<ObjectWriter>>,
    by_name: HashMap<String, usize>,
    finalized: bool,
}

/// Writer for one object node, bound 1:1 to a container group.
pub struct ObjectWriter {
    header: ObjectHeader,
    group: WGroupHandle,
    ctx: Arc<WriteContext>,
    top: Arc<CompoundWriter>,
    state: Mutex<ObjectState>,
}

impl ObjectWriter {
    pub(crate) fn new(
        header: ObjectHeader,
        group: WGroupHandle,
        ctx: Arc<WriteContext>,
    ) -> Result<Self> {
        // Slot 0 is reserved for the property compound, allocated up front
        // so child objects always start at slot 1.
        let top_group = group.add_group()?;
        let top = Arc::new(CompoundWriter::new(
            PropertyHeader::compound(".prop"),
            top_group,
            ctx.clone(),
        ));

        Ok(Self {
            header,
            group,
            ctx,
            top,
            state: Mutex::new(ObjectState {
                children: Vec::new(),
                by_name: HashMap::new(),
                finalized: false,
            }),
        })
    }

    /// The object header.
    pub fn header(&self) -> &ObjectHeader {
        &self.header
    }

    /// The object name.
    pub fn name(&self) -> &str {
        &self.header.name
    }

    /// Full path from the archive root.
    pub fn full_name(&self) -> &str {
        &self.header.full_name
    }

    /// The object's top-level property compound.
    pub fn properties(&self) -> Arc<CompoundWriter> {
        self.top.clone()
    }

    /// Number of child objects created so far.
    pub fn num_children(&self) -> usize {
        self.state.lock().children.len()
    }

    /// Header of the child object at `index`.
    pub fn child_header(&self, index: usize) -> Result<ObjectHeader> {
        let state = self.state.lock();
        state
            .children
            .get(index)
            .map(|c| c.header.clone())
            .ok_or(Error::OutOfRange {
                index,
                count: state.children.len(),
            })
    }

    /// Header of the named child object, if present.
    pub fn child_header_by_name(&self, name: &str) -> Option<ObjectHeader> {
        let state = self.state.lock();
        let idx = *state.by_name.get(name)?;
        Some(state.children[idx].header.clone())
    }

    /// Existing child writer handle by name. A cache lookup only.
    pub fn get_child(&self, name: &str) -> Option<Arc<ObjectWriter>> {
        let state = self.state.lock();
        let idx = *state.by_name.get(name)?;
        Some(state.children[idx].clone())
    }

    /// Child writer handle by creation index.
    pub fn child(&self, index: usize) -> Result<Arc<ObjectWriter>> {
        let state = self.state.lock();
        state
            .children
            .get(index)
            .cloned()
            .ok_or(Error::OutOfRange {
                index,
                count: state.children.len(),
            })
    }

    /// Create a child object bound to a fresh container sub-group.
    pub fn create_child(&self, name: &str, meta_data: MetaData) -> Result<Arc<ObjectWriter>> {
        let mut state = self.state.lock();
        if state.finalized {
            return Err(Error::Frozen);
        }
        if state.by_name.contains_key(name) {
            return Err(Error::DuplicateName(name.to_string()));
        }

        let full_name = if self.header.full_name == "/" {
            format!("/{name}")
        } else {
            format!("{}/{name}", self.header.full_name)
        };
        let header = ObjectHeader::with_meta_data(name, full_name, meta_data);

        let child = Arc::new(ObjectWriter::new(
            header,
            self.group.add_group()?,
            self.ctx.clone(),
        )?);

        state.by_name.insert(name.to_string(), state.children.len());
        state.children.push(child.clone());
        Ok(child)
    }

    /// Flush this object's subtree: property headers first, then child
    /// objects recursively, then this object's encoded child-header block as
    /// the trailing data slot (nothing when there are no children). Further
    /// child creation fails once flushed.
    pub fn write_headers(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.finalized {
            return Ok(());
        }
        state.finalized = true;

        self.top.write_headers()?;

        for child in &state.children {
            child.write_headers()?;
        }

        if state.children.is_empty() {
            return Ok(());
        }

        tracing::trace!(object = %self.header.full_name, count = state.children.len(), "flushing object headers");

        let headers: Vec<ObjectHeader> =
            state.children.iter().map(|c| c.header.clone()).collect();
        let block = {
            let mut pool = self.ctx.metadata_pool.lock();
            encode_object_headers(&headers, &mut pool)
        };
        self.group.add_data(&block)?;
        Ok(())
    }
}
