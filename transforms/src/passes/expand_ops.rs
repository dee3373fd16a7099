//! Expansion of fused ops into primitive sequences.

use std::collections::HashMap;

use stratum_dtype::DType;
use stratum_ir::{BinaryOp, FusedOp, Function, Module, Op, Operation, Stage, Value, ValueId};
use stratum_status::Status;

use crate::context::PassContext;
use crate::error::*;
use crate::pass::Pass;

#[derive(Debug, Clone, Copy, Default)]
pub struct ExpandOps;

impl Pass for ExpandOps {
    fn name(&self) -> &'static str {
        "expand-ops"
    }

    fn stage(&self) -> Stage {
        Stage::OpsExpanded
    }

    #[tracing::instrument(skip_all, fields(module = %module.name))]
    fn run(&self, module: &mut Module, _ctx: &PassContext<'_>) -> Result<(), Status> {
        for function in module.definitions_mut() {
            expand_function(function)?;
        }
        Ok(())
    }
}

fn expand_function(function: &mut Function) -> Result<()> {
    let types = function.value_types();
    let body = std::mem::take(&mut function.body);
    let mut out = Vec::with_capacity(body.len());
    let mut expanded = 0;

    for operation in body {
        let Op::Fused { op, operands } = &operation.op else {
            out.push(operation);
            continue;
        };
        let fail = |reason: String| FusedOperandsSnafu { function: function.name.clone(), op: *op, reason };
        let Some(result) = operation.result().cloned() else {
            return fail("fused op defines no single result".into()).fail();
        };
        for operand in operands {
            match types.get(operand) {
                Some(dtype) if *dtype == result.dtype => {}
                Some(dtype) => return fail(format!("operand {operand} is {dtype}, result is {}", result.dtype)).fail(),
                None => return fail(format!("operand {operand} is undefined")).fail(),
            }
        }

        let mut emitter = Emitter { function: &mut *function, out: &mut out, dtype: &result.dtype };
        expand(&mut emitter, *op, operands, result.clone())?;
        expanded += 1;
    }

    function.body = out;
    tracing::debug!(function = %function.name, expanded, "fused ops expanded");
    Ok(())
}

struct Emitter<'a> {
    function: &'a mut Function,
    out: &'a mut Vec<Operation>,
    dtype: &'a DType,
}

impl Emitter<'_> {
    fn binary(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        let value = self.function.fresh_value(self.dtype.clone());
        let id = value.id;
        self.out.push(Operation::with_result(Op::Binary { op, lhs, rhs }, value));
        id
    }

    /// The last op of an expansion defines the fused op's result.
    fn finish(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId, result: Value) {
        self.out.push(Operation::with_result(Op::Binary { op, lhs, rhs }, result));
    }
}

/// Operand count is checked here: any shape without an expansion fails.
fn expand(emitter: &mut Emitter<'_>, op: FusedOp, operands: &[ValueId], result: Value) -> Result<()> {
    match (op, operands) {
        (FusedOp::MulAdd, &[a, b, c]) => {
            let product = emitter.binary(BinaryOp::Mul, a, b);
            emitter.finish(BinaryOp::Add, product, c, result);
        }
        (FusedOp::Clamp, &[x, lo, hi]) => {
            let floor = emitter.binary(BinaryOp::Max, x, lo);
            emitter.finish(BinaryOp::Min, floor, hi, result);
        }
        (FusedOp::Lerp, &[a, b, t]) => {
            let delta = emitter.binary(BinaryOp::Sub, b, a);
            let scaled = emitter.binary(BinaryOp::Mul, delta, t);
            emitter.finish(BinaryOp::Add, a, scaled, result);
        }
        (FusedOp::Square, &[x]) => emitter.finish(BinaryOp::Mul, x, x, result),
        _ => {
            return FusedOperandsSnafu {
                function: emitter.function.name.clone(),
                op,
                reason: format!("expected {} operand(s), got {}", op.arity(), operands.len()),
            }
            .fail();
        }
    }
    Ok(())
}
