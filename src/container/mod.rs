//! Low-level grouped binary container (the "vault" format).
//!
//! The container provides an ordered tree of groups, each group holding zero
//! or more child slots that are either nested groups or opaque byte blobs,
//! with indexed random access on read and an append-only write model.
//!
//! ## File Structure
//!
//! ```text
//! +------------------+
//! | Magic: "Vault"   |  5 bytes
//! +------------------+
//! | Frozen flag      |  1 byte (0x00 or 0xFF)
//! +------------------+
//! | Version          |  2 bytes (u16 LE)
//! +------------------+
//! | Root Group Pos   |  8 bytes (u64 LE)
//! +------------------+
//! | ... Data ...     |
//! +------------------+
//! ```
//!
//! A group is a u64 child count followed by that many u64 child offsets; a
//! data block is a u64 byte length followed by the bytes. Bit 63 of a child
//! offset distinguishes data (set) from group (clear).

mod format;
mod reader;
mod writer;

pub use format::*;
pub use reader::{RArchive, RData, RGroup, RStreams};
pub use writer::{WArchive, WData, WGroup, WGroupHandle, WStream};
