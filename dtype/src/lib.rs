//! Value types for the stratum executor IR.
//!
//! Every SSA value in a lowered module has a [`DType`]: a scalar, an opaque
//! pointer into host or device memory, or an aggregate of fields with a fixed
//! C-style byte layout (see [`layout`]).

pub mod ext;
pub mod layout;


use std::fmt;

pub use layout::{Layout, Leaf};

/// Address space a pointer refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumIter, strum::VariantArray, strum::AsRefStr)]
#[cfg_attr(any(test, feature = "proptest"), derive(proptest_derive::Arbitrary))]
pub enum AddrSpace {
    /// Host (CPU) memory.
    Host,
    /// Device (accelerator) memory.
    Device,
}

impl AddrSpace {
    pub const fn mnemonic(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Device => "device",
        }
    }
}

impl fmt::Display for AddrSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Scalar data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter, strum::VariantArray, strum::FromRepr)]
#[cfg_attr(any(test, feature = "proptest"), derive(proptest_derive::Arbitrary))]
#[repr(u8)]
pub enum ScalarDType {
    Bool = 0,

    Int8 = 1,
    UInt8 = 2,
    Int16 = 3,
    UInt16 = 4,
    Int32 = 5,
    UInt32 = 6,
    Int64 = 7,
    UInt64 = 8,

    Float16 = 9,
    BFloat16 = 10,
    Float32 = 11,
    Float64 = 12,

    /// Index type for sizes and offsets (64-bit).
    Index = 13,
}

impl ScalarDType {
    pub const fn bytes(&self) -> usize {
        match self {
            Self::Bool => 1,
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 => 4,
            Self::Int64 | Self::UInt64 => 8,
            Self::Float16 | Self::BFloat16 => 2,
            Self::Float32 => 4,
            Self::Float64 => 8,
            Self::Index => 8,
        }
    }

    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool)
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub const fn is_unsigned(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    pub const fn is_int(&self) -> bool {
        self.is_signed() || self.is_unsigned() || matches!(self, Self::Index)
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float16 | Self::BFloat16 | Self::Float32 | Self::Float64)
    }

    /// Half-width floats whose arithmetic depends on device support.
    pub const fn is_half(&self) -> bool {
        matches!(self, Self::Float16 | Self::BFloat16)
    }

    /// Short name used in textual IR and builtin symbol mangling.
    pub const fn mnemonic(&self) -> &'static str {
        match self {
            Self::Bool => "i1",
            Self::Int8 => "i8",
            Self::UInt8 => "u8",
            Self::Int16 => "i16",
            Self::UInt16 => "u16",
            Self::Int32 => "i32",
            Self::UInt32 => "u32",
            Self::Int64 => "i64",
            Self::UInt64 => "u64",
            Self::Float16 => "f16",
            Self::BFloat16 => "bf16",
            Self::Float32 => "f32",
            Self::Float64 => "f64",
            Self::Index => "index",
        }
    }
}

impl fmt::Display for ScalarDType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// An ordered list of fields with C struct layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Aggregate {
    fields: Vec<DType>,
}

impl Aggregate {
    pub fn new(fields: impl IntoIterator<Item = DType>) -> Self {
        Self { fields: fields.into_iter().collect() }
    }

    pub fn fields(&self) -> &[DType] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&DType> {
        self.fields.get(index)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Data type of an IR value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DType {
    /// Scalar type (single value).
    Scalar(ScalarDType),

    /// Opaque pointer into the given address space.
    Ptr(AddrSpace),

    /// Composite value made of scalar, pointer or nested aggregate fields.
    Aggregate(Aggregate),
}

impl From<ScalarDType> for DType {
    fn from(scalar: ScalarDType) -> Self {
        Self::Scalar(scalar)
    }
}

impl DType {
    // =========================================================================
    // Type Constructors
    // =========================================================================

    pub fn aggregate(fields: impl IntoIterator<Item = DType>) -> Self {
        Self::Aggregate(Aggregate::new(fields))
    }

    pub const fn ptr(addrspace: AddrSpace) -> Self {
        Self::Ptr(addrspace)
    }

    pub fn scalar(&self) -> Option<ScalarDType> {
        match self {
            Self::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_aggregate(&self) -> Option<&Aggregate> {
        match self {
            Self::Aggregate(agg) => Some(agg),
            _ => None,
        }
    }

    // =========================================================================
    // Type Properties
    // =========================================================================

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Self::Aggregate(_))
    }

    pub fn is_ptr(&self) -> bool {
        matches!(self, Self::Ptr(_))
    }

    pub fn is_bool(&self) -> bool {
        self.scalar().is_some_and(|s| s.is_bool())
    }

    pub fn is_int(&self) -> bool {
        self.scalar().is_some_and(|s| s.is_int())
    }

    pub fn is_float(&self) -> bool {
        self.scalar().is_some_and(|s| s.is_float())
    }

    /// Size in bytes including trailing padding.
    pub fn bytes(&self) -> usize {
        self.layout().size
    }

    pub fn align(&self) -> usize {
        self.layout().align
    }

    /// Name used when mangling builtin symbols (`f32`, `ptr_device`, `agg3`).
    pub fn mangle(&self) -> String {
        match self {
            Self::Scalar(s) => s.mnemonic().to_string(),
            Self::Ptr(space) => format!("ptr_{}", space.mnemonic()),
            Self::Aggregate(agg) => format!("agg{}", agg.len()),
        }
    }

    /// Follow a field path into nested aggregates.
    pub fn field_at(&self, path: &[usize]) -> Option<&DType> {
        let mut current = self;
        for &index in path {
            current = current.as_aggregate()?.field(index)?;
        }
        Some(current)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(s) => write!(f, "{s}"),
            Self::Ptr(space) => write!(f, "ptr<{}>", space.mnemonic()),
            Self::Aggregate(agg) => {
                f.write_str("{")?;
                for (i, field) in agg.fields().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{field}")?;
                }
                f.write_str("}")
            }
        }
    }
}

// Convenient constructors for common scalar types
#[allow(non_upper_case_globals)]
impl DType {
    pub const Bool: Self = Self::Scalar(ScalarDType::Bool);
    pub const Int8: Self = Self::Scalar(ScalarDType::Int8);
    pub const Int16: Self = Self::Scalar(ScalarDType::Int16);
    pub const Int32: Self = Self::Scalar(ScalarDType::Int32);
    pub const Int64: Self = Self::Scalar(ScalarDType::Int64);
    pub const UInt8: Self = Self::Scalar(ScalarDType::UInt8);
    pub const UInt16: Self = Self::Scalar(ScalarDType::UInt16);
    pub const UInt32: Self = Self::Scalar(ScalarDType::UInt32);
    pub const UInt64: Self = Self::Scalar(ScalarDType::UInt64);
    pub const Float16: Self = Self::Scalar(ScalarDType::Float16);
    pub const BFloat16: Self = Self::Scalar(ScalarDType::BFloat16);
    pub const Float32: Self = Self::Scalar(ScalarDType::Float32);
    pub const Float64: Self = Self::Scalar(ScalarDType::Float64);
    pub const Index: Self = Self::Scalar(ScalarDType::Index);
}
