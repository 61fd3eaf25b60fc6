//! Primitive element kinds - the fundamental storage types for samples.

use bytemuck::{Pod, Zeroable};
use half::f16;
use std::fmt;

/// Primitive element kind - the base type of one component of a sample.
///
/// Each kind has a fixed size and well-defined binary representation.
/// `Unknown` is a sentinel and never valid in a stored header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ElementKind {
    /// Boolean (stored as u8: 0 = false, non-zero = true)
    Bool = 0,
    /// Unsigned 8-bit integer
    Uint8 = 1,
    /// Signed 8-bit integer
    Int8 = 2,
    /// Unsigned 16-bit integer
    Uint16 = 3,
    /// Signed 16-bit integer
    Int16 = 4,
    /// Unsigned 32-bit integer
    Uint32 = 5,
    /// Signed 32-bit integer
    Int32 = 6,
    /// Unsigned 64-bit integer
    Uint64 = 7,
    /// Signed 64-bit integer
    Int64 = 8,
    /// 16-bit floating point (IEEE 754 half precision)
    Float16 = 9,
    /// 32-bit floating point (IEEE 754 single precision)
    Float32 = 10,
    /// 64-bit floating point (IEEE 754 double precision)
    Float64 = 11,
    /// UTF-8 string
    String = 12,
    /// Wide string (stored as UTF-8 here)
    WideString = 13,
    /// Unknown/invalid sentinel
    #[default]
    Unknown = 127,
}

impl ElementKind {
    /// Number of recognized kinds (excluding the sentinel).
    pub const COUNT: usize = 14;

    /// Returns the size in bytes of a single element of this kind.
    /// For string kinds this is the in-memory handle size, not storage size.
    #[inline]
    pub const fn num_bytes(self) -> usize {
        match self {
            Self::Bool => 1,
            Self::Uint8 => 1,
            Self::Int8 => 1,
            Self::Uint16 => 2,
            Self::Int16 => 2,
            Self::Uint32 => 4,
            Self::Int32 => 4,
            Self::Uint64 => 8,
            Self::Int64 => 8,
            Self::Float16 => 2,
            Self::Float32 => 4,
            Self::Float64 => 8,
            Self::String => std::mem::size_of::<usize>(),
            Self::WideString => std::mem::size_of::<usize>(),
            Self::Unknown => 0,
        }
    }

    /// Returns the name of this kind as a string.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool_t",
            Self::Uint8 => "uint8_t",
            Self::Int8 => "int8_t",
            Self::Uint16 => "uint16_t",
            Self::Int16 => "int16_t",
            Self::Uint32 => "uint32_t",
            Self::Int32 => "int32_t",
            Self::Uint64 => "uint64_t",
            Self::Int64 => "int64_t",
            Self::Float16 => "float16_t",
            Self::Float32 => "float32_t",
            Self::Float64 => "float64_t",
            Self::String => "string",
            Self::WideString => "wstring",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Convert from the wire value.
    pub const fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Bool,
            1 => Self::Uint8,
            2 => Self::Int8,
            3 => Self::Uint16,
            4 => Self::Int16,
            5 => Self::Uint32,
            6 => Self::Int32,
            7 => Self::Uint64,
            8 => Self::Int64,
            9 => Self::Float16,
            10 => Self::Float32,
            11 => Self::Float64,
            12 => Self::String,
            13 => Self::WideString,
            _ => Self::Unknown,
        }
    }

    /// Convert to the wire value.
    #[inline]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Returns true if this is a numeric kind (int or float).
    #[inline]
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Uint8
                | Self::Int8
                | Self::Uint16
                | Self::Int16
                | Self::Uint32
                | Self::Int32
                | Self::Uint64
                | Self::Int64
                | Self::Float16
                | Self::Float32
                | Self::Float64
        )
    }

    /// Returns true if this is a string kind.
    #[inline]
    pub const fn is_string(self) -> bool {
        matches!(self, Self::String | Self::WideString)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// === Pod trait for type-safe sample conversions ===

/// Trait for Rust types that map onto a stored element kind.
pub trait SamplePod: Pod + Zeroable + Copy + Default {
    /// The corresponding element kind.
    const KIND: ElementKind;

    /// Size of this type in bytes.
    const SIZE: usize = std::mem::size_of::<Self>();
}

impl SamplePod for u8 {
    const KIND: ElementKind = ElementKind::Uint8;
}

impl SamplePod for i8 {
    const KIND: ElementKind = ElementKind::Int8;
}

impl SamplePod for u16 {
    const KIND: ElementKind = ElementKind::Uint16;
}

impl SamplePod for i16 {
    const KIND: ElementKind = ElementKind::Int16;
}

impl SamplePod for u32 {
    const KIND: ElementKind = ElementKind::Uint32;
}

impl SamplePod for i32 {
    const KIND: ElementKind = ElementKind::Int32;
}

impl SamplePod for u64 {
    const KIND: ElementKind = ElementKind::Uint64;
}

impl SamplePod for i64 {
    const KIND: ElementKind = ElementKind::Int64;
}

impl SamplePod for f32 {
    const KIND: ElementKind = ElementKind::Float32;
}

impl SamplePod for f64 {
    const KIND: ElementKind = ElementKind::Float64;
}

impl SamplePod for f16 {
    const KIND: ElementKind = ElementKind::Float16;
}

/// Boolean with guaranteed 1-byte storage.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct Bool(u8);

impl Bool {
    pub const TRUE: Self = Self(1);
    pub const FALSE: Self = Self(0);

    #[inline]
    pub const fn new(v: bool) -> Self {
        Self(v as u8)
    }

    #[inline]
    pub const fn get(self) -> bool {
        self.0 != 0
    }
}

impl From<bool> for Bool {
    #[inline]
    fn from(v: bool) -> Self {
        Self::new(v)
    }
}

impl From<Bool> for bool {
    #[inline]
    fn from(v: Bool) -> Self {
        v.get()
    }
}

impl fmt::Debug for Bool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl SamplePod for Bool {
    const KIND: ElementKind = ElementKind::Bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_sizes() {
        assert_eq!(ElementKind::Bool.num_bytes(), 1);
        assert_eq!(ElementKind::Uint8.num_bytes(), 1);
        assert_eq!(ElementKind::Int32.num_bytes(), 4);
        assert_eq!(ElementKind::Float32.num_bytes(), 4);
        assert_eq!(ElementKind::Float64.num_bytes(), 8);
        assert_eq!(ElementKind::Float16.num_bytes(), 2);
    }

    #[test]
    fn test_kind_wire_roundtrip() {
        for v in 0..14u8 {
            let kind = ElementKind::from_u8(v);
            assert_ne!(kind, ElementKind::Unknown);
            assert_eq!(kind.to_u8(), v);
        }
        assert_eq!(ElementKind::from_u8(99), ElementKind::Unknown);
    }

    #[test]
    fn test_bool_storage() {
        let t = Bool::new(true);
        let f = Bool::new(false);
        assert!(t.get());
        assert!(!f.get());
        assert_eq!(std::mem::size_of::<Bool>(), 1);
    }
}
