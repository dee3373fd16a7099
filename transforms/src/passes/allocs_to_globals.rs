//! Promotion of fixed-size local allocations to module globals.
//!
//! A static `alloc` whose address never leaves its (non-recursive) function
//! is replaced by a `global_ref` to a fresh zero-initialized global named
//! `<function>.alloc<N>`. Its `dealloc`s disappear with it.

use std::collections::HashSet;

use snafu::ResultExt;
use stratum_dtype::layout::align_up;
use stratum_ir::{
    AllocSize, BufferHint, BufferSource, Function, GlobalDecl, Module, Op, Stage, ValueId,
};
use stratum_status::{Status, StatusKind};

use crate::analysis::{escaping_allocations, recursive_functions};
use crate::context::PassContext;
use crate::error::*;
use crate::pass::Pass;
use crate::passes::lower_globals::check_alignment;

#[derive(Debug, Clone, Copy, Default)]
pub struct AllocsToGlobals;

impl Pass for AllocsToGlobals {
    fn name(&self) -> &'static str {
        "allocs-to-globals"
    }

    fn stage(&self) -> Stage {
        Stage::GlobalsHoisted
    }

    #[tracing::instrument(skip_all, fields(module = %module.name))]
    fn run(&self, module: &mut Module, ctx: &PassContext<'_>) -> Result<(), Status> {
        Ok(hoist_module(module, ctx)?)
    }
}

fn hoist_module(module: &mut Module, ctx: &PassContext<'_>) -> Result<()> {
    let recursive = recursive_functions(module);
    let space = ctx.device.memory_space();
    let mut existing = 0;
    for global in module.globals.iter().filter(|global| global.space == space) {
        check_alignment(global)?;
        existing += align_up(global.size, global.align);
    }
    let mut budget = Budget {
        remaining: ctx.allocator.available().min(ctx.device.available_for_globals()).saturating_sub(existing),
    };

    let mut hoisted_total = 0;
    for function in module.functions.iter_mut().filter(|function| !function.is_external()) {
        if recursive.contains(&function.name) {
            tracing::debug!(function = %function.name, "recursive; allocations stay local");
            continue;
        }
        let globals = hoist_function(function, &module.globals, &mut budget, ctx)?;
        hoisted_total += globals.len();
        module.globals.extend(globals);
    }
    tracing::debug!(hoisted = hoisted_total, remaining = budget.remaining, "allocations hoisted");
    Ok(())
}

/// Bytes of device memory still free for hoisted globals.
struct Budget {
    remaining: usize,
}

fn hoist_function(
    function: &mut Function,
    existing: &[GlobalDecl],
    budget: &mut Budget,
    ctx: &PassContext<'_>,
) -> Result<Vec<GlobalDecl>> {
    let escaping = escaping_allocations(function);
    let space = ctx.device.memory_space();
    let mut globals: Vec<GlobalDecl> = Vec::new();
    let mut hoisted: HashSet<ValueId> = HashSet::new();

    for operation in &mut function.body {
        let Op::Alloc { size: AllocSize::Static(size), align, space: alloc_space } = operation.op else {
            continue;
        };
        let Some(ptr) = operation.result().map(|value| value.id) else {
            continue;
        };
        if escaping.contains(&ptr) {
            tracing::debug!(function = %function.name, %ptr, "address escapes; kept local");
            continue;
        }
        if alloc_space != space || size == 0 {
            continue;
        }
        if let Some(limit) = ctx.options.hoist_limit
            && size > limit
        {
            tracing::debug!(function = %function.name, %ptr, size, limit, "above hoist limit; kept local");
            continue;
        }
        if let Err(status) = ctx.allocator.validate_request(size, align) {
            if !status.is(StatusKind::OutOfMemory) {
                return Err(status).context(AllocatorSnafu);
            }
            tracing::warn!(function = %function.name, %ptr, size, %status, "cannot hoist allocation");
            continue;
        }
        let footprint = align_up(size, align);
        if footprint > budget.remaining {
            tracing::warn!(
                function = %function.name,
                %ptr,
                size,
                remaining = budget.remaining,
                "module storage exhausted; allocation kept local"
            );
            continue;
        }
        budget.remaining -= footprint;

        let taken = |name: &str| {
            existing.iter().chain(globals.iter()).any(|global: &GlobalDecl| global.name == name)
        };
        let name = (globals.len()..)
            .map(|n| format!("{}.alloc{n}", function.name))
            .find(|name| !taken(name))
            .unwrap_or_default();

        tracing::debug!(function = %function.name, %ptr, global = %name, size, align, "hoisted");
        operation.op = Op::GlobalRef { name: name.clone() };
        function.metadata.buffer_hints.push(BufferHint {
            source: BufferSource::Global { name: name.clone(), offset: None },
            size: Some(size),
            align,
        });
        globals.push(GlobalDecl { origin: Some(function.name.clone()), ..GlobalDecl::zeroed(name, size, align, space) });
        hoisted.insert(ptr);
    }

    function.body.retain(|operation| !matches!(operation.op, Op::Dealloc { ptr } if hoisted.contains(&ptr)));
    Ok(globals)
}
