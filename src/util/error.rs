//! Error types for the scenevault library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for archive operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Invalid magic bytes at start of file
    #[error("Invalid vault file: expected magic bytes")]
    InvalidMagic,

    /// Unsupported container format version
    #[error("Unsupported container version: {0}")]
    UnsupportedVersion(u16),

    /// File is truncated or corrupted
    #[error("Unexpected end of file at position {0}")]
    UnexpectedEof(u64),

    /// Invalid data structure in file
    #[error("Invalid file structure: {0}")]
    InvalidStructure(String),

    /// Creating a child whose name already exists under the parent
    #[error("Duplicate child name: {0}")]
    DuplicateName(String),

    /// Zero extent or unrecognized/sentinel element kind
    #[error("Invalid data type: {0}")]
    InvalidDataType(String),

    /// Child or header index beyond the parent's count
    #[error("Index {index} out of range (count: {count})")]
    OutOfRange { index: usize, count: usize },

    /// Header bytes failed to decode
    #[error("Corrupt header block: {0}")]
    CorruptHeaderBlock(String),

    /// Time sampling index not present in the archive table
    #[error("Unknown time sampling index {index} (table size: {count})")]
    UnknownTimeSamplingIndex { index: u32, count: usize },

    /// An opened group handle is null or unusable
    #[error("Invalid container group: {0}")]
    InvalidContainerGroup(String),

    /// Type mismatch when reading container children
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Sample index out of bounds
    #[error("Sample index {index} out of bounds (count: {count})")]
    SampleOutOfBounds { index: usize, count: usize },

    /// Node or archive already finalized; no further children accepted
    #[error("Already finalized and cannot be modified")]
    Frozen,

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }

    /// Create a corrupt header block error.
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptHeaderBlock(msg.into())
    }
}

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::InvalidMagic;
        assert!(e.to_string().contains("magic"));

        let e = Error::OutOfRange { index: 5, count: 3 };
        assert!(e.to_string().contains("5"));
        assert!(e.to_string().contains("3"));

        let e = Error::DuplicateName("xform".to_string());
        assert!(e.to_string().contains("xform"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
