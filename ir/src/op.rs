//! Operation enum and implementation.
//!
//! An [`Operation`] is one [`Op`] plus the SSA values it defines. Operands
//! refer to values by [`ValueId`]; a function body is an ordered list of
//! operations in which every operand is defined earlier (or is a parameter).

use smallvec::{SmallVec, smallvec};
use stratum_dtype::{AddrSpace, DType};

use crate::types::*;

/// Operation type with typed operands.
///
/// - Primitive ops (unary, binary, select, memory, aggregate, addressing)
///   are lowered one-to-one to runtime builtins.
/// - Fused ops expand into primitives first.
/// - `Const`, `Call`, `Builtin` and `Return` are structural and never lowered.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Const(ConstValue),

    // Arithmetic
    Unary {
        op: UnaryOp,
        src: ValueId,
    },
    Binary {
        op: BinaryOp,
        lhs: ValueId,
        rhs: ValueId,
    },
    Select {
        cond: ValueId,
        on_true: ValueId,
        on_false: ValueId,
    },
    Fused {
        op: FusedOp,
        operands: SmallVec<[ValueId; 3]>,
    },

    // Memory
    Alloc {
        size: AllocSize,
        align: usize,
        space: AddrSpace,
    },
    Dealloc {
        ptr: ValueId,
    },
    /// Load the result's dtype from `ptr + offset`.
    Load {
        ptr: ValueId,
        offset: usize,
    },
    /// Store `value` at `ptr + offset`.
    Store {
        ptr: ValueId,
        offset: usize,
        value: ValueId,
    },

    // Aggregates
    MakeAggregate {
        fields: SmallVec<[ValueId; 4]>,
    },
    Extract {
        src: ValueId,
        path: SmallVec<[usize; 4]>,
    },

    // Addressing
    /// Address of a module-scoped global.
    GlobalRef {
        name: String,
    },
    /// Base address of the module storage segment for `space`.
    StorageBase {
        space: AddrSpace,
    },
    PtrAdd {
        base: ValueId,
        offset: usize,
    },

    // Structural
    Call {
        callee: String,
        args: SmallVec<[ValueId; 4]>,
    },
    /// Call into the runtime support library.
    Builtin {
        name: String,
        args: SmallVec<[ValueId; 4]>,
        immediates: SmallVec<[u64; 2]>,
    },
    Return {
        values: SmallVec<[ValueId; 2]>,
    },
}

impl Op {
    /// Operands in positional order.
    pub fn operands(&self) -> SmallVec<[ValueId; 4]> {
        match self {
            Self::Const(_) | Self::GlobalRef { .. } | Self::StorageBase { .. } => SmallVec::new(),
            Self::Alloc { size, .. } => match size {
                AllocSize::Static(_) => SmallVec::new(),
                AllocSize::Dynamic(value) => smallvec![*value],
            },
            Self::Unary { src, .. } => smallvec![*src],
            Self::Binary { lhs, rhs, .. } => smallvec![*lhs, *rhs],
            Self::Select { cond, on_true, on_false } => smallvec![*cond, *on_true, *on_false],
            Self::Fused { operands, .. } => operands.iter().copied().collect(),
            Self::Dealloc { ptr } | Self::Load { ptr, .. } => smallvec![*ptr],
            Self::Store { ptr, value, .. } => smallvec![*ptr, *value],
            Self::MakeAggregate { fields } => fields.clone(),
            Self::Extract { src, .. } => smallvec![*src],
            Self::PtrAdd { base, .. } => smallvec![*base],
            Self::Call { args, .. } | Self::Builtin { args, .. } => args.clone(),
            Self::Return { values } => values.iter().copied().collect(),
        }
    }

    /// Rewrite every operand in place.
    pub fn map_operands<F>(&mut self, mut f: F)
    where
        F: FnMut(ValueId) -> ValueId,
    {
        let mut apply = |value: &mut ValueId| *value = f(*value);
        match self {
            Self::Const(_) | Self::GlobalRef { .. } | Self::StorageBase { .. } => {}
            Self::Alloc { size, .. } => {
                if let AllocSize::Dynamic(value) = size {
                    apply(value);
                }
            }
            Self::Unary { src, .. } | Self::Extract { src, .. } => apply(src),
            Self::Binary { lhs, rhs, .. } => {
                apply(lhs);
                apply(rhs);
            }
            Self::Select { cond, on_true, on_false } => {
                apply(cond);
                apply(on_true);
                apply(on_false);
            }
            Self::Fused { operands, .. } => operands.iter_mut().for_each(apply),
            Self::Dealloc { ptr } | Self::Load { ptr, .. } => apply(ptr),
            Self::Store { ptr, value, .. } => {
                apply(ptr);
                apply(value);
            }
            Self::MakeAggregate { fields } => fields.iter_mut().for_each(apply),
            Self::PtrAdd { base, .. } => apply(base),
            Self::Call { args, .. } | Self::Builtin { args, .. } => args.iter_mut().for_each(apply),
            Self::Return { values } => values.iter_mut().for_each(apply),
        }
    }

    /// Free of side effects, so removable when its results are unused.
    pub fn is_pure(&self) -> bool {
        matches!(
            self,
            Self::Const(_)
                | Self::Unary { .. }
                | Self::Binary { .. }
                | Self::Select { .. }
                | Self::Fused { .. }
                | Self::Load { .. }
                | Self::MakeAggregate { .. }
                | Self::Extract { .. }
                | Self::GlobalRef { .. }
                | Self::StorageBase { .. }
                | Self::PtrAdd { .. }
        )
    }

    /// Lowered one-to-one to a runtime builtin.
    pub fn is_primitive(&self) -> bool {
        !matches!(
            self,
            Self::Const(_)
                | Self::Fused { .. }
                | Self::GlobalRef { .. }
                | Self::Call { .. }
                | Self::Builtin { .. }
                | Self::Return { .. }
        )
    }

    pub fn is_terminator(&self) -> bool {
        matches!(self, Self::Return { .. })
    }

    /// Short name used by the printer.
    pub fn mnemonic(&self) -> &str {
        match self {
            Self::Const(_) => "const",
            Self::Unary { op, .. } => op.as_ref(),
            Self::Binary { op, .. } => op.as_ref(),
            Self::Select { .. } => "select",
            Self::Fused { op, .. } => op.as_ref(),
            Self::Alloc { .. } => "alloc",
            Self::Dealloc { .. } => "dealloc",
            Self::Load { .. } => "load",
            Self::Store { .. } => "store",
            Self::MakeAggregate { .. } => "make_aggregate",
            Self::Extract { .. } => "extract",
            Self::GlobalRef { .. } => "global_ref",
            Self::StorageBase { .. } => "storage_base",
            Self::PtrAdd { .. } => "ptr_add",
            Self::Call { .. } => "call",
            Self::Builtin { .. } => "builtin",
            Self::Return { .. } => "return",
        }
    }
}

/// An op together with the values it defines.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub op: Op,
    pub results: SmallVec<[Value; 1]>,
}

impl Operation {
    pub fn new(op: Op, results: impl IntoIterator<Item = Value>) -> Self {
        Self { op, results: results.into_iter().collect() }
    }

    /// Operation with exactly one result.
    pub fn with_result(op: Op, result: Value) -> Self {
        Self { op, results: smallvec![result] }
    }

    /// Operation without results.
    pub fn effect(op: Op) -> Self {
        Self { op, results: SmallVec::new() }
    }

    /// The single result, if the op has exactly one.
    pub fn result(&self) -> Option<&Value> {
        match self.results.as_slice() {
            [value] => Some(value),
            _ => None,
        }
    }

    pub fn operands(&self) -> SmallVec<[ValueId; 4]> {
        self.op.operands()
    }

    pub fn defines(&self, id: ValueId) -> bool {
        self.results.iter().any(|value| value.id == id)
    }

    /// Aggregate-typed load or store.
    pub fn is_aggregate_access(&self, dtype_of: impl Fn(ValueId) -> Option<DType>) -> bool {
        match &self.op {
            Op::Load { .. } => self.results.iter().any(|value| value.dtype.is_aggregate()),
            Op::Store { value, .. } => dtype_of(*value).is_some_and(|dtype| dtype.is_aggregate()),
            _ => false,
        }
    }
}
