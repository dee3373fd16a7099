//! Lay out module storage and resolve global references to addresses.
//!
//! Globals are placed per address space in declaration order, each at the
//! next offset aligned to its own alignment. Every `global_ref @g` becomes
//! `storage_base <space>` followed by `ptr_add <offset of g>`.

use enumset::EnumSet;
use snafu::{OptionExt, ensure};
use stratum_dtype::layout::align_up;
use stratum_dtype::DType;
use stratum_ir::{GlobalDecl, Module, Op, Operation, Placement, Stage, StorageLayout, StorageSegment};
use stratum_status::Status;

use crate::context::PassContext;
use crate::error::*;
use crate::pass::Pass;

#[derive(Debug, Clone, Copy, Default)]
pub struct LowerGlobals;

impl Pass for LowerGlobals {
    fn name(&self) -> &'static str {
        "lower-globals"
    }

    fn stage(&self) -> Stage {
        Stage::GlobalsLowered
    }

    fn requires(&self) -> EnumSet<Stage> {
        Stage::GlobalsHoisted.into()
    }

    #[tracing::instrument(skip_all, fields(module = %module.name))]
    fn run(&self, module: &mut Module, _ctx: &PassContext<'_>) -> Result<(), Status> {
        Ok(lower_module(module)?)
    }
}

/// Storage layout of `globals`.
pub fn layout_storage(globals: &[GlobalDecl]) -> Result<StorageLayout> {
    let mut layout = StorageLayout::default();
    for global in globals {
        check_alignment(global)?;
        let index = match layout.segments.iter().position(|segment| segment.space == global.space) {
            Some(index) => index,
            None => {
                layout.segments.push(StorageSegment { space: global.space, size: 0, align: 1 });
                layout.segments.len() - 1
            }
        };
        let segment = &mut layout.segments[index];
        let offset = align_up(segment.size, global.align);
        segment.size = offset + global.size;
        segment.align = segment.align.max(global.align);
        layout.placements.push(Placement { name: global.name.clone(), space: global.space, offset });
    }
    Ok(layout)
}

/// `align_up` is only defined for power-of-two alignments.
pub(crate) fn check_alignment(global: &GlobalDecl) -> Result<()> {
    ensure!(
        global.align.is_power_of_two(),
        GlobalAlignmentSnafu { name: global.name.clone(), align: global.align }
    );
    Ok(())
}

fn lower_module(module: &mut Module) -> Result<()> {
    let layout = layout_storage(&module.globals)?;
    for segment in &layout.segments {
        tracing::debug!(space = %segment.space, size = segment.size, align = segment.align, "storage segment");
    }

    for function in module.definitions_mut() {
        let body = std::mem::take(&mut function.body);
        let mut out = Vec::with_capacity(body.len());
        for operation in body {
            let Op::GlobalRef { name } = &operation.op else {
                out.push(operation);
                continue;
            };
            let placement = layout
                .placement(name)
                .context(UndeclaredGlobalSnafu { function: function.name.clone(), name: name.clone() })?;
            let Some(result) = operation.result().cloned() else { continue };

            let base = function.fresh_value(DType::ptr(placement.space));
            let base_id = base.id;
            out.push(Operation::with_result(Op::StorageBase { space: placement.space }, base));
            out.push(Operation::with_result(Op::PtrAdd { base: base_id, offset: placement.offset }, result));
        }
        function.body = out;
    }

    module.storage = Some(layout);
    Ok(())
}
