//! Rewrite aggregate parameters into `(pointer, size)` pairs.
//!
//! Scalars and pointers keep their position relative to each other; every
//! aggregate parameter becomes two consecutive parameters, the pointer into
//! device memory and the byte size. Internal functions unpack the aggregate
//! at entry under the original parameter's id, so their bodies are unchanged.
//! Call sites pack each aggregate argument and pass its size as a constant.

use std::collections::HashMap;

use smallvec::{SmallVec, smallvec};
use snafu::{OptionExt, ensure};
use stratum_dtype::DType;
use stratum_ir::{ArgPacking, ConstValue, Function, Module, Op, Operation, Stage, ValueId};
use stratum_status::Status;

use crate::builtins::BuiltinKind;
use crate::config::IndexBitwidth;
use crate::context::PassContext;
use crate::error::*;
use crate::pass::Pass;

#[derive(Debug, Clone, Copy, Default)]
pub struct PackArguments;

impl Pass for PackArguments {
    fn name(&self) -> &'static str {
        "pack-arguments"
    }

    fn stage(&self) -> Stage {
        Stage::ArgumentsPacked
    }

    fn requires(&self) -> enumset::EnumSet<Stage> {
        Stage::BuiltinsLowered.into()
    }

    #[tracing::instrument(skip_all, fields(module = %module.name))]
    fn run(&self, module: &mut Module, ctx: &PassContext<'_>) -> Result<(), Status> {
        Ok(pack_module(module, ctx)?)
    }
}

struct Packer<'a> {
    /// Original parameter types of every function.
    signatures: HashMap<String, Vec<DType>>,
    pointer: DType,
    bitwidth: IndexBitwidth,
    ctx: &'a PassContext<'a>,
}

fn pack_module(module: &mut Module, ctx: &PassContext<'_>) -> Result<()> {
    ensure!(!module.has_stage(Stage::ArgumentsPacked), AlreadyPackedSnafu { name: module.name.clone() });
    for function in &module.functions {
        ensure!(!function.metadata.is_packed(), AlreadyPackedSnafu { name: function.name.clone() });
    }

    let packer = Packer {
        signatures: module
            .functions
            .iter()
            .map(|function| (function.name.clone(), function.signature.param_types().cloned().collect()))
            .collect(),
        pointer: DType::ptr(ctx.device.memory_space()),
        bitwidth: ctx.options.index_bitwidth,
        ctx,
    };

    for function in &mut module.functions {
        if !function.is_external() {
            packer.pack_call_sites(function)?;
        }
        packer.pack_signature(function)?;
    }
    Ok(())
}

impl Packer<'_> {
    fn builtin(&self, kind: BuiltinKind, dtype: &DType) -> Result<String> {
        self.ctx.builtins.resolve(kind, dtype, self.ctx.device)
    }

    fn pack_signature(&self, function: &mut Function) -> Result<()> {
        let original = std::mem::take(&mut function.signature.params);
        let mut params = Vec::with_capacity(original.len());
        let mut packing = Vec::with_capacity(original.len());
        let mut unpack = Vec::new();

        for param in original {
            if !param.dtype.is_aggregate() {
                packing.push(ArgPacking::Direct { index: params.len() });
                params.push(param);
                continue;
            }
            let pointer = function.fresh_value(self.pointer.clone());
            let size = function.fresh_value(self.bitwidth.size_dtype());
            packing.push(ArgPacking::Aggregate { pointer: params.len(), dtype: param.dtype.clone() });
            unpack.push(Operation::with_result(
                Op::Builtin {
                    name: self.builtin(BuiltinKind::UnpackAggregate, &param.dtype)?,
                    args: smallvec![pointer.id, size.id],
                    immediates: SmallVec::new(),
                },
                param,
            ));
            params.extend([pointer, size]);
        }

        tracing::debug!(
            function = %function.name,
            params = params.len(),
            aggregates = unpack.len(),
            "signature packed"
        );
        function.signature.params = params;
        function.metadata.packing = packing;
        if !function.is_external() {
            function.body.splice(0..0, unpack);
        }
        Ok(())
    }

    fn pack_call_sites(&self, function: &mut Function) -> Result<()> {
        let body = std::mem::take(&mut function.body);
        let mut out = Vec::with_capacity(body.len());
        for mut operation in body {
            if let Op::Call { callee, args } = &mut operation.op {
                let params = self
                    .signatures
                    .get(callee.as_str())
                    .context(UnknownCalleeSnafu { caller: function.name.clone(), callee: callee.clone() })?;
                ensure!(
                    args.len() == params.len(),
                    CallAritySnafu {
                        caller: function.name.clone(),
                        callee: callee.clone(),
                        expected: params.len(),
                        actual: args.len(),
                    }
                );
                let mut packed: SmallVec<[ValueId; 4]> = SmallVec::with_capacity(args.len());
                for (arg, dtype) in args.iter().zip(params) {
                    if dtype.is_aggregate() {
                        let [pointer, size] = self.pack(function, &mut out, *arg, dtype)?;
                        packed.extend([pointer, size]);
                    } else {
                        packed.push(*arg);
                    }
                }
                *args = packed;
            }
            out.push(operation);
        }
        function.body = out;
        Ok(())
    }

    /// Emit the pointer and size arguments standing for aggregate `arg`.
    fn pack(
        &self,
        function: &mut Function,
        out: &mut Vec<Operation>,
        arg: ValueId,
        dtype: &DType,
    ) -> Result<[ValueId; 2]> {
        let pointer = function.fresh_value(self.pointer.clone());
        let size = function.fresh_value(self.bitwidth.size_dtype());
        let ids = [pointer.id, size.id];
        out.push(Operation::with_result(
            Op::Builtin {
                name: self.builtin(BuiltinKind::PackAggregate, dtype)?,
                args: smallvec![arg],
                immediates: SmallVec::new(),
            },
            pointer,
        ));
        out.push(Operation::with_result(Op::Const(self.size_constant(dtype.bytes())), size));
        Ok(ids)
    }

    fn size_constant(&self, bytes: usize) -> ConstValue {
        match self.bitwidth {
            IndexBitwidth::W32 => ConstValue::Int(bytes as i64),
            IndexBitwidth::W64 => ConstValue::UInt(bytes as u64),
        }
    }
}

/// Parameter count of `function` after packing.
pub fn packed_arity(function: &Function) -> usize {
    function.metadata.packing.iter().map(ArgPacking::width).sum()
}
