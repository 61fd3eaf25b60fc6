//! Read-side object tree.
//!
//! An object group's trailing data slot decodes to the ordered child-header
//! batch; slot 0, when it is a group, is the object's top-level property
//! compound; child object `i` lives at slot `i + 1`. Child readers are
//! materialized lazily behind per-slot weak caches.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::archive::codec::decode_object_headers;
use crate::archive::read::ReadContext;
use crate::archive::read::property::{CompoundData, CompoundReader};
use crate::container::RGroup;
use crate::core::{MetaData, ObjectHeader, PropertyHeader};
use crate::util::{Error, Result};

struct ChildSlot {
    header: Arc<ObjectHeader>,
    made: Mutex<Weak<ObjectReader>>,
}

/// Decoded state of one object group.
pub(crate) struct ObjectData {
    group: RGroup,
    children: Vec<ChildSlot>,
    by_name: HashMap<String, usize>,
    props: Arc<CompoundData>,
    top: Mutex<Weak<CompoundReader>>,
    ctx: Arc<ReadContext>,
}

impl ObjectData {
    /// Decode the child-object headers and open the top property compound.
    /// A corrupt header block fails construction as a whole.
    pub(crate) fn new(
        group: RGroup,
        parent_path: &str,
        thread_hint: usize,
        ctx: Arc<ReadContext>,
    ) -> Result<Self> {
        let num_children = group.num_children();

        let headers = if num_children > 0 && group.is_child_data(num_children - 1)? {
            let block = group.data(num_children - 1, thread_hint)?.read_all()?;
            decode_object_headers(&block, parent_path, &ctx.metadata_pool)?
        } else {
            Vec::new()
        };

        // Child i occupies slot i + 1; the trailing slot holds the block.
        if !headers.is_empty() && headers.len() + 1 > num_children {
            return Err(Error::corrupt(format!(
                "header block lists {} children but the group has {} slots",
                headers.len(),
                num_children
            )));
        }

        let props = if num_children > 0 && group.is_child_group(0)? {
            let props_group = group.group(0, thread_hint)?;
            Arc::new(CompoundData::new(props_group, thread_hint, ctx.clone())?)
        } else {
            Arc::new(CompoundData::empty(ctx.clone()))
        };

        let mut by_name = HashMap::with_capacity(headers.len());
        for (i, header) in headers.iter().enumerate() {
            by_name.insert(header.name.clone(), i);
        }

        let children = headers
            .into_iter()
            .map(|header| ChildSlot {
                header: Arc::new(header),
                made: Mutex::new(Weak::new()),
            })
            .collect();

        Ok(Self {
            group,
            children,
            by_name,
            props,
            top: Mutex::new(Weak::new()),
            ctx,
        })
    }
}

/// Reader for one object node, bound 1:1 to a container group.
pub struct ObjectReader {
    header: Arc<ObjectHeader>,
    data: ObjectData,
}

impl ObjectReader {
    pub(crate) fn new(header: Arc<ObjectHeader>, data: ObjectData) -> Self {
        Self { header, data }
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

    /// The object's metadata.
    pub fn meta_data(&self) -> &MetaData {
        &self.header.meta_data
    }

    /// Number of child objects.
    pub fn num_children(&self) -> usize {
        self.data.children.len()
    }

    /// Decoded header of the child at `index`.
    pub fn child_header(&self, index: usize) -> Result<&ObjectHeader> {
        self.data
            .children
            .get(index)
            .map(|slot| slot.header.as_ref())
            .ok_or(Error::OutOfRange {
                index,
                count: self.data.children.len(),
            })
    }

    /// Decoded header of the named child, if present.
    pub fn child_header_by_name(&self, name: &str) -> Option<&ObjectHeader> {
        let idx = *self.data.by_name.get(name)?;
        Some(&self.data.children[idx].header)
    }

    /// Materialize (or fetch the live instance of) the child at `index`.
    pub fn child(&self, index: usize, thread_hint: usize) -> Result<Arc<ObjectReader>> {
        let slot = self.data.children.get(index).ok_or(Error::OutOfRange {
            index,
            count: self.data.children.len(),
        })?;

        let mut made = slot.made.lock();
        if let Some(live) = made.upgrade() {
            return Ok(live);
        }

        // Slot 0 is reserved for the property compound.
        let child_group = self.data.group.group(index + 1, thread_hint)?;
        let child_data = ObjectData::new(
            child_group,
            &slot.header.full_name,
            thread_hint,
            self.data.ctx.clone(),
        )?;

        let node = Arc::new(ObjectReader::new(slot.header.clone(), child_data));
        *made = Arc::downgrade(&node);
        Ok(node)
    }

    /// Materialize the named child, or `None` if no such object exists.
    pub fn child_by_name(
        &self,
        name: &str,
        thread_hint: usize,
    ) -> Result<Option<Arc<ObjectReader>>> {
        match self.data.by_name.get(name) {
            Some(&idx) => self.child(idx, thread_hint).map(Some),
            None => Ok(None),
        }
    }

    /// The object's top-level property compound, wrapped lazily and shared
    /// while referenced.
    pub fn properties(&self) -> Arc<CompoundReader> {
        let mut top = self.data.top.lock();
        if let Some(live) = top.upgrade() {
            return live;
        }

        let node = Arc::new(CompoundReader::new(
            Arc::new(PropertyHeader::compound(".prop")),
            self.data.props.clone(),
        ));
        *top = Arc::downgrade(&node);
        node
    }
}
