//! Headers for objects and properties.
//!
//! A header is the stored descriptor of one child node. On the write side it
//! is built in memory and becomes immutable once byte-encoded; on the read
//! side it is decoded once per container group and shared read-only by every
//! reader instantiated against it.

use crate::util::DataType;
use super::MetaData;

/// Header information for an object in the hierarchy.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectHeader {
    /// Name of this object (not full path).
    pub name: String,
    /// Full path from root (e.g. "/root/parent/child").
    pub full_name: String,
    /// Opaque metadata blob.
    pub meta_data: MetaData,
}

impl ObjectHeader {
    /// Create a new object header.
    pub fn new(name: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            full_name: full_name.into(),
            meta_data: MetaData::new(),
        }
    }

    /// Create with metadata.
    pub fn with_meta_data(
        name: impl Into<String>,
        full_name: impl Into<String>,
        meta_data: MetaData,
    ) -> Self {
        Self {
            name: name.into(),
            full_name: full_name.into(),
            meta_data,
        }
    }
}

/// The three property kinds. Every consumer matches exhaustively on this.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    /// Single fixed-extent value per sample.
    #[default]
    Scalar,
    /// Variable-length sequence of values per sample.
    Array,
    /// Container for named child properties; no samples of its own.
    Compound,
}

/// Header information for a property, including the sample bookkeeping the
/// writer maintains and the reader relies on to skip redundant payloads.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyHeader {
    /// Name of this property, unique among siblings.
    pub name: String,
    /// Property kind.
    pub property_kind: PropertyKind,
    /// Data type (element kind + extent). Unknown for compounds.
    pub data_type: DataType,
    /// Index into the archive time-sampling table (0 = identity).
    pub time_sampling_index: u32,
    /// Opaque metadata blob.
    pub meta_data: MetaData,
    /// Array property whose samples all hold exactly one element.
    pub is_scalar_like: bool,
    /// Array property whose per-sample element count never varies.
    pub is_homogenous: bool,
    /// Index the next written sample would receive; the sample count.
    pub next_sample_index: u32,
    /// First sample index whose payload differs from its predecessor.
    pub first_changed_index: u32,
    /// Last sample index whose payload differs from its predecessor.
    pub last_changed_index: u32,
}

impl PropertyHeader {
    /// Create a scalar property header.
    pub fn scalar(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            property_kind: PropertyKind::Scalar,
            data_type,
            time_sampling_index: 0,
            meta_data: MetaData::new(),
            is_scalar_like: true,
            is_homogenous: true,
            next_sample_index: 0,
            first_changed_index: 0,
            last_changed_index: 0,
        }
    }

    /// Create an array property header.
    pub fn array(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            property_kind: PropertyKind::Array,
            data_type,
            time_sampling_index: 0,
            meta_data: MetaData::new(),
            is_scalar_like: true,
            is_homogenous: true,
            next_sample_index: 0,
            first_changed_index: 0,
            last_changed_index: 0,
        }
    }

    /// Create a compound property header.
    pub fn compound(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            property_kind: PropertyKind::Compound,
            data_type: DataType::UNKNOWN,
            time_sampling_index: 0,
            meta_data: MetaData::new(),
            is_scalar_like: false,
            is_homogenous: false,
            next_sample_index: 0,
            first_changed_index: 0,
            last_changed_index: 0,
        }
    }

    /// Set time sampling index.
    pub fn with_time_sampling(mut self, index: u32) -> Self {
        self.time_sampling_index = index;
        self
    }

    /// Set metadata.
    pub fn with_meta_data(mut self, meta_data: MetaData) -> Self {
        self.meta_data = meta_data;
        self
    }

    /// Check if this is a scalar property.
    pub fn is_scalar(&self) -> bool {
        self.property_kind == PropertyKind::Scalar
    }

    /// Check if this is an array property.
    pub fn is_array(&self) -> bool {
        self.property_kind == PropertyKind::Array
    }

    /// Check if this is a compound property.
    pub fn is_compound(&self) -> bool {
        self.property_kind == PropertyKind::Compound
    }

    /// All written samples carry the same payload.
    pub fn is_constant(&self) -> bool {
        self.first_changed_index == 0 && self.last_changed_index == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::DataType;

    #[test]
    fn test_object_header() {
        let header = ObjectHeader::new("mesh", "/root/mesh");
        assert_eq!(header.name, "mesh");
        assert_eq!(header.full_name, "/root/mesh");
    }

    #[test]
    fn test_property_header_scalar() {
        let header = PropertyHeader::scalar("P", DataType::VEC3F);
        assert!(header.is_scalar());
        assert!(!header.is_array());
        assert_eq!(header.data_type, DataType::VEC3F);
        assert!(header.is_constant());
    }

    #[test]
    fn test_property_header_array() {
        let header = PropertyHeader::array("vertices", DataType::VEC3F).with_time_sampling(1);
        assert!(header.is_array());
        assert_eq!(header.time_sampling_index, 1);
    }

    #[test]
    fn test_property_header_compound() {
        let header = PropertyHeader::compound(".geom");
        assert!(header.is_compound());
        assert_eq!(header.data_type, DataType::UNKNOWN);
    }
}
