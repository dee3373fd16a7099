//! Lowering of primitive ops to runtime builtin calls.
//!
//! | op | type key | args | immediates |
//! |----|----------|------|------------|
//! | unary, binary | first operand | operands | |
//! | select | result | operands | |
//! | load | result | `ptr` | `offset` |
//! | store | stored value | `ptr, value` | `offset` |
//! | alloc | result | dynamic size | `size, align` or `align` |
//! | dealloc | pointer | `ptr` | |
//! | make_aggregate, extract | result | operands | field path for extract |
//! | storage_base, ptr_add | result | operands | `offset` for ptr_add |

use enumset::{EnumSet, enum_set};
use smallvec::{SmallVec, smallvec};
use snafu::OptionExt;
use stratum_dtype::DType;
use stratum_ir::{AllocSize, BufferHint, BufferSource, Function, Module, Op, Stage, ValueId};
use stratum_status::Status;

use crate::builtins::BuiltinKind;
use crate::context::PassContext;
use crate::error::*;
use crate::pass::Pass;

#[derive(Debug, Clone, Copy, Default)]
pub struct LowerToRuntimeBuiltins;

impl Pass for LowerToRuntimeBuiltins {
    fn name(&self) -> &'static str {
        "lower-to-runtime-builtins"
    }

    fn stage(&self) -> Stage {
        Stage::BuiltinsLowered
    }

    fn requires(&self) -> EnumSet<Stage> {
        enum_set!(Stage::AggregatesDecomposed | Stage::OpsExpanded | Stage::GlobalsLowered)
    }

    #[tracing::instrument(skip_all, fields(module = %module.name, device = %ctx.device))]
    fn run(&self, module: &mut Module, ctx: &PassContext<'_>) -> Result<(), Status> {
        for function in module.definitions_mut() {
            lower_function(function, ctx)?;
        }
        Ok(())
    }
}

fn lower_function(function: &mut Function, ctx: &PassContext<'_>) -> Result<()> {
    let types = function.value_types();
    let dtype_of = |value: ValueId| {
        types.get(&value).cloned().context(UnknownValueSnafu { function: function.name.clone(), value })
    };

    let mut lowered = 0;
    let mut hints = Vec::new();
    for operation in &mut function.body {
        let leftover = match &operation.op {
            Op::Const(_) | Op::Call { .. } | Op::Return { .. } | Op::Builtin { .. } => continue,
            Op::Fused { op, .. } => Some(format!("fused op {}", op.as_ref())),
            Op::GlobalRef { name } => Some(format!("global_ref @{name}")),
            _ if operation.is_aggregate_access(|value| types.get(&value).cloned()) => {
                Some(format!("aggregate {}", operation.op.mnemonic()))
            }
            _ => None,
        };
        if let Some(op) = leftover {
            return LeftoverSnafu { function: function.name.clone(), op, stage: "lower-to-runtime-builtins" }.fail();
        }

        let result = operation.result().map(|value| value.dtype.clone());
        let result_key = || {
            result
                .clone()
                .context(MissingResultSnafu { function: function.name.clone(), op: operation.op.mnemonic() })
        };
        let (kind, key, immediates): (BuiltinKind, DType, SmallVec<[u64; 2]>) = match &operation.op {
            Op::Unary { op, src } => (BuiltinKind::Unary(*op), dtype_of(*src)?, SmallVec::new()),
            Op::Binary { op, lhs, .. } => (BuiltinKind::Binary(*op), dtype_of(*lhs)?, SmallVec::new()),
            Op::Select { .. } => (BuiltinKind::Select, result_key()?, SmallVec::new()),
            Op::Load { offset, .. } => (BuiltinKind::Load, result_key()?, smallvec![*offset as u64]),
            Op::Store { offset, value, .. } => (BuiltinKind::Store, dtype_of(*value)?, smallvec![*offset as u64]),
            Op::Alloc { size, align, .. } => {
                hints.push(BufferHint { source: BufferSource::Stack, size: size.as_static(), align: *align });
                let immediates = match size {
                    AllocSize::Static(bytes) => smallvec![*bytes as u64, *align as u64],
                    AllocSize::Dynamic(_) => smallvec![*align as u64],
                };
                (BuiltinKind::Alloc, result_key()?, immediates)
            }
            Op::Dealloc { ptr } => (BuiltinKind::Dealloc, dtype_of(*ptr)?, SmallVec::new()),
            Op::MakeAggregate { .. } => (BuiltinKind::MakeAggregate, result_key()?, SmallVec::new()),
            Op::Extract { path, .. } => {
                (BuiltinKind::Extract, result_key()?, path.iter().map(|index| *index as u64).collect())
            }
            Op::StorageBase { .. } => (BuiltinKind::StorageBase, result_key()?, SmallVec::new()),
            Op::PtrAdd { offset, .. } => (BuiltinKind::PtrAdd, result_key()?, smallvec![*offset as u64]),
            _ => continue,
        };

        let name = ctx.builtins.resolve(kind, &key, ctx.device)?;
        let args = operation.op.operands();
        operation.op = Op::Builtin { name, args, immediates };
        lowered += 1;
    }

    tracing::debug!(function = %function.name, lowered, stack_buffers = hints.len(), "lowered to builtins");
    function.metadata.buffer_hints.extend(hints);
    Ok(())
}
