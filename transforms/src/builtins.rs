//! Catalog of runtime support builtins.
//!
//! Every primitive op is lowered to a call into the runtime support library.
//! Symbols are `_executor_<op>_<type>` (e.g. `_executor_add_f32`,
//! `_executor_load_ptr_host`); aggregate packing helpers are untyped
//! (`_executor_pack_aggregate`, `_executor_unpack_aggregate`).

use std::collections::HashMap;

use enumset::{EnumSet, EnumSetType, enum_set};
use stratum_device::DeviceDescriptor;
use stratum_dtype::DType;
use stratum_ir::{BinaryOp, UnaryOp};
use strum::VariantArray;

use crate::error::{NoBuiltinSnafu, Result, UnsupportedOnDeviceSnafu};

pub const BUILTIN_PREFIX: &str = "_executor_";

/// Operation a builtin implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinKind {
    Unary(UnaryOp),
    Binary(BinaryOp),
    Select,
    Load,
    Store,
    Alloc,
    Dealloc,
    MakeAggregate,
    Extract,
    StorageBase,
    PtrAdd,
    PackAggregate,
    UnpackAggregate,
}

impl BuiltinKind {
    pub fn stem(&self) -> &'static str {
        match self {
            Self::Unary(op) => (*op).into(),
            Self::Binary(op) => (*op).into(),
            Self::Select => "select",
            Self::Load => "load",
            Self::Store => "store",
            Self::Alloc => "alloc",
            Self::Dealloc => "dealloc",
            Self::MakeAggregate => "make_aggregate",
            Self::Extract => "extract",
            Self::StorageBase => "storage_base",
            Self::PtrAdd => "ptr_add",
            Self::PackAggregate => "pack_aggregate",
            Self::UnpackAggregate => "unpack_aggregate",
        }
    }

    /// Whether the symbol carries a type suffix.
    pub fn is_typed(&self) -> bool {
        !matches!(self, Self::PackAggregate | Self::UnpackAggregate)
    }
}

/// Coarse classification of the dtype a builtin operates on.
#[derive(Debug, Hash, EnumSetType)]
pub enum TypeClass {
    Bool,
    Signed,
    Unsigned,
    Index,
    Float,
    /// f16 and bf16, whose availability depends on the device.
    Half,
    Pointer,
    Aggregate,
}

impl TypeClass {
    pub fn of(dtype: &DType) -> Self {
        match dtype {
            DType::Scalar(s) if s.is_bool() => Self::Bool,
            DType::Scalar(s) if s.is_signed() => Self::Signed,
            DType::Scalar(s) if s.is_unsigned() => Self::Unsigned,
            DType::Scalar(s) if s.is_half() => Self::Half,
            DType::Scalar(s) if s.is_float() => Self::Float,
            DType::Scalar(_) => Self::Index,
            DType::Ptr(_) => Self::Pointer,
            DType::Aggregate(_) => Self::Aggregate,
        }
    }
}

const INTS: EnumSet<TypeClass> = enum_set!(TypeClass::Signed | TypeClass::Unsigned | TypeClass::Index);
const FLOATS: EnumSet<TypeClass> = enum_set!(TypeClass::Float | TypeClass::Half);
const NUMERIC: EnumSet<TypeClass> =
    enum_set!(TypeClass::Signed | TypeClass::Unsigned | TypeClass::Index | TypeClass::Float | TypeClass::Half);
const SCALARS: EnumSet<TypeClass> = enum_set!(
    TypeClass::Bool | TypeClass::Signed | TypeClass::Unsigned | TypeClass::Index | TypeClass::Float | TypeClass::Half
);
const VALUES: EnumSet<TypeClass> = enum_set!(
    TypeClass::Bool
        | TypeClass::Signed
        | TypeClass::Unsigned
        | TypeClass::Index
        | TypeClass::Float
        | TypeClass::Half
        | TypeClass::Pointer
);
const POINTER: EnumSet<TypeClass> = enum_set!(TypeClass::Pointer);
const AGGREGATE: EnumSet<TypeClass> = enum_set!(TypeClass::Aggregate);

/// Which builtins exist, per type class.
#[derive(Debug, Clone, Default)]
pub struct BuiltinRegistry {
    entries: HashMap<BuiltinKind, EnumSet<TypeClass>>,
}

impl BuiltinRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The builtins shipped with the runtime support library.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        for op in UnaryOp::VARIANTS {
            let classes = match op {
                UnaryOp::Neg | UnaryOp::Abs => FLOATS | TypeClass::Signed | TypeClass::Index,
                UnaryOp::Not => INTS | TypeClass::Bool,
                UnaryOp::Sqrt | UnaryOp::Exp | UnaryOp::Log => FLOATS,
            };
            registry.register(BuiltinKind::Unary(*op), classes);
        }
        for op in BinaryOp::VARIANTS {
            let classes = match op {
                BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => INTS | TypeClass::Bool,
                BinaryOp::Shl | BinaryOp::Shr => INTS,
                BinaryOp::CmpEq | BinaryOp::CmpNe => SCALARS,
                _ => NUMERIC,
            };
            registry.register(BuiltinKind::Binary(*op), classes);
        }
        for kind in [BuiltinKind::Select, BuiltinKind::Load, BuiltinKind::Store] {
            registry.register(kind, VALUES);
        }
        for kind in [BuiltinKind::Alloc, BuiltinKind::Dealloc, BuiltinKind::StorageBase, BuiltinKind::PtrAdd] {
            registry.register(kind, POINTER);
        }
        registry.register(BuiltinKind::Extract, VALUES | AGGREGATE);
        for kind in [BuiltinKind::MakeAggregate, BuiltinKind::PackAggregate, BuiltinKind::UnpackAggregate] {
            registry.register(kind, AGGREGATE);
        }
        registry
    }

    /// Add (or widen) support for `kind` on `classes`.
    pub fn register(&mut self, kind: BuiltinKind, classes: impl Into<EnumSet<TypeClass>>) {
        *self.entries.entry(kind).or_default() |= classes.into();
    }

    pub fn remove(&mut self, kind: BuiltinKind) {
        self.entries.remove(&kind);
    }

    pub fn supports(&self, kind: BuiltinKind, dtype: &DType) -> bool {
        self.entries.get(&kind).is_some_and(|classes| classes.contains(TypeClass::of(dtype)))
    }

    /// Symbol of the builtin implementing `kind` on `dtype` for `device`.
    pub fn resolve(&self, kind: BuiltinKind, dtype: &DType, device: &DeviceDescriptor) -> Result<String> {
        snafu::ensure!(self.supports(kind, dtype), NoBuiltinSnafu { op: kind.stem(), dtype: dtype.clone() });
        if let Some(scalar) = dtype.scalar() {
            snafu::ensure!(device.supports(scalar), UnsupportedOnDeviceSnafu { dtype: scalar, device: device.to_string() });
        }
        Ok(symbol(kind, dtype))
    }
}

/// Mangled symbol for `kind` on `dtype`, without checking support.
pub fn symbol(kind: BuiltinKind, dtype: &DType) -> String {
    if kind.is_typed() {
        format!("{BUILTIN_PREFIX}{}_{}", kind.stem(), dtype.mangle())
    } else {
        format!("{BUILTIN_PREFIX}{}", kind.stem())
    }
}
