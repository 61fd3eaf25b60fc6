//! # scenevault
//!
//! Hierarchical, versioned, binary-container storage engine for
//! time-sampled scene-graph data. A tree of named objects, each carrying a
//! tree of typed properties with per-sample time indices, is mapped onto an
//! append-only grouped binary container; the tree is reconstructed lazily
//! on read and constructed incrementally on write.
//!
//! ## Modules
//!
//! - [`util`] - Basic types (element kinds, DataType, errors)
//! - [`core`] - Headers, metadata, time sampling
//! - [`container`] - Low-level grouped binary "vault" format
//! - [`archive`] - The persistence layer (codec, sampling table, read/write trees)
//!
//! ## Example
//!
//! ```no_run
//! use scenevault::archive::{ArchiveReader, ArchiveWriter};
//! use scenevault::core::MetaData;
//! use scenevault::util::DataType;
//!
//! # fn main() -> scenevault::util::Result<()> {
//! let writer = ArchiveWriter::create("scene.sv")?;
//! let shape = writer.root().create_child("shape", MetaData::new())?;
//! let p = shape
//!     .properties()
//!     .create_scalar_property("P", MetaData::new(), DataType::VEC3F, 0)?;
//! p.set_sample_value(&[0.0f32, 1.0, 2.0])?;
//! writer.close()?;
//!
//! let reader = ArchiveReader::open("scene.sv")?;
//! let shape = reader.root().child_by_name("shape", 0)?.unwrap();
//! assert_eq!(shape.properties().num_properties(), 1);
//! # Ok(())
//! # }
//! ```

pub mod util;
pub mod core;
pub mod container;
pub mod archive;

// Re-export commonly used types
pub use util::{DataType, ElementKind, Error, Result};
pub use archive::{ArchiveReader, ArchiveWriter};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::archive::{
        ArchiveReader, ArchiveWriter, ArrayReader, ArrayWriter, CompoundReader, CompoundWriter,
        ObjectReader, ObjectWriter, PropertyReader, PropertyWriter, ScalarReader, ScalarWriter,
    };
    pub use crate::core::{MetaData, ObjectHeader, PropertyHeader, PropertyKind, TimeSampling};
    pub use crate::util::{Chrono, DataType, ElementKind, Error, Result};
}
