//! Per-function ABI metadata consumed by the loader.

use std::fmt;

use stratum_dtype::DType;

/// Calling-convention tag attached to a function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CallingConvention {
    /// Original signature: aggregates passed by value.
    #[default]
    Unpacked,
    /// Aggregates passed as `(pointer, size)` pairs.
    Packed,
}

impl CallingConvention {
    pub const PACKED_TAG: &'static str = "executor.packed";

    pub fn tag(&self) -> Option<&'static str> {
        match self {
            Self::Unpacked => None,
            Self::Packed => Some(Self::PACKED_TAG),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    Scalar,
    Pointer,
    /// Pointer to a packed aggregate argument.
    AggregatePointer,
    /// Byte size accompanying the preceding aggregate pointer.
    AggregateSize,
    /// Aggregate passed by value (results only).
    Aggregate,
}

/// Size, alignment and role of one argument or result slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArgAbi {
    pub kind: ArgKind,
    pub size: usize,
    pub align: usize,
}

/// How one original parameter maps onto the packed signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgPacking {
    /// Passed unchanged as packed parameter `index`.
    Direct { index: usize },
    /// Passed as the `(pointer, size)` pair at `pointer` and `pointer + 1`.
    Aggregate { pointer: usize, dtype: DType },
}

impl ArgPacking {
    pub fn width(&self) -> usize {
        match self {
            Self::Direct { .. } => 1,
            Self::Aggregate { .. } => 2,
        }
    }
}

/// Where a buffer a function touches lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BufferSource {
    /// Module global; `offset` into its storage segment once resolved.
    Global { name: String, offset: Option<usize> },
    /// Per-call stack allocation.
    Stack,
}

/// Size hint for a buffer the loader has to provide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferHint {
    pub source: BufferSource,
    /// `None` when the size is only known at runtime.
    pub size: Option<usize>,
    pub align: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub cconv: CallingConvention,
    pub args: Vec<ArgAbi>,
    pub results: Vec<ArgAbi>,
    pub buffer_hints: Vec<BufferHint>,
    /// One entry per original parameter, empty until arguments are packed.
    pub packing: Vec<ArgPacking>,
}

impl Metadata {
    pub fn is_packed(&self) -> bool {
        self.cconv == CallingConvention::Packed || !self.packing.is_empty()
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Scalar => "scalar",
            Self::Pointer => "ptr",
            Self::AggregatePointer => "agg_ptr",
            Self::AggregateSize => "agg_size",
            Self::Aggregate => "agg",
        })
    }
}

impl fmt::Display for ArgAbi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {})", self.kind, self.size, self.align)
    }
}

impl fmt::Display for BufferHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            BufferSource::Global { name, offset: Some(offset) } => write!(f, "global @{name}+{offset}")?,
            BufferSource::Global { name, offset: None } => write!(f, "global @{name}")?,
            BufferSource::Stack => f.write_str("stack")?,
        }
        match self.size {
            Some(size) => write!(f, " {size}B align {}", self.align),
            None => write!(f, " ?B align {}", self.align),
        }
    }
}
