//! Final pass: calling convention, argument ABI and buffer hints.

use std::collections::HashMap;

use snafu::{OptionExt, ensure};
use stratum_dtype::DType;
use stratum_ir::{
    ArgAbi, ArgKind, ArgPacking, BufferSource, CallingConvention, Function, Module, Op, Stage, StorageLayout,
};
use stratum_status::Status;

use crate::context::PassContext;
use crate::error::*;
use crate::pass::Pass;
use crate::passes::pack_arguments::packed_arity;

#[derive(Debug, Clone, Copy, Default)]
pub struct PopulateFunctionMetadata;

impl Pass for PopulateFunctionMetadata {
    fn name(&self) -> &'static str {
        "populate-function-metadata"
    }

    fn stage(&self) -> Stage {
        Stage::MetadataPopulated
    }

    fn requires(&self) -> enumset::EnumSet<Stage> {
        Stage::ArgumentsPacked.into()
    }

    #[tracing::instrument(skip_all, fields(module = %module.name))]
    fn run(&self, module: &mut Module, _ctx: &PassContext<'_>) -> Result<(), Status> {
        Ok(populate_module(module)?)
    }
}

fn populate_module(module: &mut Module) -> Result<()> {
    let arities: HashMap<String, usize> =
        module.functions.iter().map(|function| (function.name.clone(), packed_arity(function))).collect();

    for function in &module.functions {
        check_call_sites(function, &arities)?;
    }
    for function in &mut module.functions {
        populate_function(function, module.storage.as_ref())?;
    }
    Ok(())
}

/// Every call passes exactly as many arguments as the callee declares.
fn check_call_sites(function: &Function, arities: &HashMap<String, usize>) -> Result<()> {
    for operation in &function.body {
        let Op::Call { callee, args } = &operation.op else { continue };
        let actual = args.len();
        let expected = *arities
            .get(callee)
            .context(UnknownCalleeSnafu { caller: function.name.clone(), callee: callee.clone() })?;
        ensure!(
            actual == expected,
            PackedAritySnafu { caller: function.name.clone(), callee: callee.clone(), expected, actual }
        );
    }
    Ok(())
}

fn populate_function(function: &mut Function, storage: Option<&StorageLayout>) -> Result<()> {
    let mismatch = || PackingMismatchSnafu { function: function.name.clone() };
    ensure!(packed_arity(function) == function.signature.params.len(), mismatch());

    let params = &function.signature.params;
    let mut args = Vec::with_capacity(params.len());
    for packing in &function.metadata.packing {
        match packing {
            ArgPacking::Direct { index } => {
                let param = params.get(*index).context(mismatch())?;
                args.push(abi(&param.dtype));
            }
            ArgPacking::Aggregate { pointer, .. } => {
                let (Some(ptr), Some(size)) = (params.get(*pointer), params.get(pointer + 1)) else {
                    return mismatch().fail();
                };
                args.push(ArgAbi { kind: ArgKind::AggregatePointer, ..abi(&ptr.dtype) });
                args.push(ArgAbi { kind: ArgKind::AggregateSize, ..abi(&size.dtype) });
            }
        }
    }
    let results = function.signature.results.iter().map(abi).collect();

    for hint in &mut function.metadata.buffer_hints {
        if let BufferSource::Global { name, offset } = &mut hint.source {
            let placement = storage
                .and_then(|storage| storage.placement(name))
                .context(MissingPlacementSnafu { name: name.clone() })?;
            *offset = Some(placement.offset);
        }
    }

    function.metadata.cconv = CallingConvention::Packed;
    function.metadata.args = args;
    function.metadata.results = results;
    tracing::debug!(
        function = %function.name,
        args = function.metadata.args.len(),
        hints = function.metadata.buffer_hints.len(),
        "metadata populated"
    );
    Ok(())
}

fn abi(dtype: &DType) -> ArgAbi {
    let layout = dtype.layout();
    let kind = match dtype {
        DType::Scalar(_) => ArgKind::Scalar,
        DType::Ptr(_) => ArgKind::Pointer,
        DType::Aggregate(_) => ArgKind::Aggregate,
    };
    ArgAbi { kind, size: layout.size, align: layout.align }
}
