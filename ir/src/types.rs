//! Type definitions for IR operations.
//!
//! Values, constants and the operator enums used by [`Op`](crate::Op).

use std::fmt;

use stratum_dtype::{DType, ScalarDType};

/// SSA value identifier, unique within one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// A typed SSA value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Value {
    pub id: ValueId,
    pub dtype: DType,
}

impl Value {
    pub fn new(id: ValueId, dtype: DType) -> Self {
        Self { id, dtype }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.dtype)
    }
}

/// Constant value that can be materialized by a `Const` op.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

/// Helper macro to cast to target width and back to storage type (for proper truncation/extension).
macro_rules! cast_via {
    ($v:expr, $target:ty, $storage:ty) => {
        ($v as $target) as $storage
    };
}

impl ConstValue {
    pub const fn zero(dtype: ScalarDType) -> Self {
        use ScalarDType::*;
        match dtype {
            Bool => Self::Bool(false),
            Int8 | Int16 | Int32 | Int64 | Index => Self::Int(0),
            UInt8 | UInt16 | UInt32 | UInt64 => Self::UInt(0),
            Float16 | BFloat16 | Float32 | Float64 => Self::Float(0.0),
        }
    }

    /// Whether this constant can be materialized as `dtype`.
    pub fn fits(&self, dtype: ScalarDType) -> bool {
        match self {
            Self::Bool(_) => dtype.is_bool(),
            Self::Int(_) => dtype.is_signed() || dtype == ScalarDType::Index,
            Self::UInt(_) => dtype.is_unsigned() || dtype == ScalarDType::Index,
            Self::Float(_) => dtype.is_float(),
        }
    }

    /// Convert to `dtype`, truncating integers to its width.
    pub fn cast(self, dtype: ScalarDType) -> Self {
        use ScalarDType::*;
        let int = match self {
            Self::Bool(v) => v as i64,
            Self::Int(v) => v,
            Self::UInt(v) => v as i64,
            Self::Float(v) => v as i64,
        };
        match dtype {
            Bool => Self::Bool(int != 0 || matches!(self, Self::Float(v) if v != 0.0)),
            Int8 => Self::Int(cast_via!(int, i8, i64)),
            Int16 => Self::Int(cast_via!(int, i16, i64)),
            Int32 => Self::Int(cast_via!(int, i32, i64)),
            Int64 | Index => Self::Int(int),
            UInt8 => Self::UInt(cast_via!(int, u8, u64)),
            UInt16 => Self::UInt(cast_via!(int, u16, u64)),
            UInt32 => Self::UInt(cast_via!(int, u32, u64)),
            UInt64 => Self::UInt(int as u64),
            Float16 | BFloat16 | Float32 | Float64 => match self {
                Self::Float(v) => Self::Float(v),
                Self::UInt(v) => Self::Float(v as f64),
                _ => Self::Float(int as f64),
            },
        }
    }
}

macro_rules! const_from {
    ($variant:ident <- $($ty:ty),*) => {
        $(impl From<$ty> for ConstValue {
            fn from(value: $ty) -> Self {
                Self::$variant(value.into())
            }
        })*
    };
}

const_from!(Int <- i8, i16, i32, i64);
const_from!(UInt <- u8, u16, u32, u64);
const_from!(Float <- f32, f64);
const_from!(Bool <- bool);

impl From<usize> for ConstValue {
    fn from(value: usize) -> Self {
        Self::UInt(value as u64)
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// Unary operation types.
///
/// All unary operations preserve the input dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumIter, strum::VariantArray, strum::AsRefStr, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum UnaryOp {
    /// Negation: -x
    Neg,
    /// Logical or bitwise not: !x (int/bool only)
    Not,
    /// Square root (float only)
    Sqrt,
    /// Natural exponential: e^x (float only)
    Exp,
    /// Natural logarithm (float only)
    Log,
    /// Absolute value
    Abs,
}

/// Binary operation types.
///
/// Arithmetic and bitwise operations preserve the operand dtype.
/// Comparison operations (CmpLt, CmpEq, CmpNe) always return `DType::Bool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumIter, strum::VariantArray, strum::AsRefStr, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Division, truncating toward zero for integers.
    Div,
    /// C-style remainder (sign of the dividend).
    Rem,
    Max,
    Min,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    CmpLt,
    CmpEq,
    CmpNe,
}

impl BinaryOp {
    pub const fn is_comparison(&self) -> bool {
        matches!(self, Self::CmpLt | Self::CmpEq | Self::CmpNe)
    }

    pub const fn is_bitwise(&self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Xor | Self::Shl | Self::Shr)
    }
}

/// Composite operations that expand into primitive sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumIter, strum::VariantArray, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum FusedOp {
    /// a * b + c
    MulAdd,
    /// min(max(x, lo), hi)
    Clamp,
    /// a + (b - a) * t
    Lerp,
    /// x * x
    Square,
}

impl FusedOp {
    /// Number of operands the op takes.
    pub const fn arity(&self) -> usize {
        match self {
            Self::MulAdd | Self::Clamp | Self::Lerp => 3,
            Self::Square => 1,
        }
    }
}

/// Size of a local allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocSize {
    /// Known at compile time, in bytes.
    Static(usize),
    /// Runtime byte count held by an integer value.
    Dynamic(ValueId),
}

impl AllocSize {
    pub fn as_static(&self) -> Option<usize> {
        match self {
            Self::Static(bytes) => Some(*bytes),
            Self::Dynamic(_) => None,
        }
    }
}

impl fmt::Display for AllocSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(bytes) => write!(f, "{bytes}"),
            Self::Dynamic(value) => write!(f, "{value}"),
        }
    }
}
