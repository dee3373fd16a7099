use stratum_dtype::{AddrSpace, DType};
use stratum_ir::{FunctionBuilder, GlobalDecl, Module, Op, Placement, Stage, StorageSegment};
use stratum_status::StatusKind;

use crate::PipelineOptions;
use crate::passes::{AllocsToGlobals, LowerGlobals, layout_storage};
use crate::test::Harness;

fn globals() -> Vec<GlobalDecl> {
    vec![
        GlobalDecl::zeroed("a", 10, 4, AddrSpace::Host),
        GlobalDecl::zeroed("b", 8, 8, AddrSpace::Host),
        GlobalDecl::zeroed("c", 4, 4, AddrSpace::Device),
        GlobalDecl::zeroed("d", 1, 1, AddrSpace::Host),
    ]
}

#[test]
fn test_layout_per_space() {
    let layout = layout_storage(&globals()).unwrap();
    assert_eq!(
        layout.segments,
        [
            StorageSegment { space: AddrSpace::Host, size: 25, align: 8 },
            StorageSegment { space: AddrSpace::Device, size: 4, align: 4 },
        ]
    );
    let offsets: Vec<_> = layout.placements.iter().map(|Placement { name, offset, .. }| (name.as_str(), *offset)).collect();
    assert_eq!(offsets, [("a", 0), ("b", 16), ("c", 0), ("d", 24)]);
}

#[test]
fn test_global_refs_become_addresses() {
    let mut f = FunctionBuilder::new("f", [DType::Int32], []);
    let x = f.param(0).unwrap();
    let b = f.global_ref("b", AddrSpace::Host);
    f.store(b, 0, x).unwrap();
    let c = f.global_ref("c", AddrSpace::Device);
    f.store(c, 0, x).unwrap();
    f.ret(&[]).unwrap();

    let mut module = Module::new("m").with_function(f.finish());
    module.globals = globals();
    Harness::host().apply(&LowerGlobals, &mut module).unwrap();

    let function = module.function("f").unwrap();
    assert_eq!(function.count_ops(|op| matches!(op, Op::GlobalRef { .. })), 0);
    assert_eq!(function.body[0].op, Op::StorageBase { space: AddrSpace::Host });
    assert!(matches!(function.body[1].op, Op::PtrAdd { offset: 16, .. }));
    assert!(function.body[1].defines(b));
    assert_eq!(function.body[3].op, Op::StorageBase { space: AddrSpace::Device });
    assert!(matches!(function.body[4].op, Op::PtrAdd { offset: 0, .. }));
    assert!(function.body[4].defines(c));
    assert_eq!(module.storage.as_ref().unwrap().segments.len(), 2);
}

#[test]
fn test_undeclared_global() {
    let mut f = FunctionBuilder::new("f", [], []);
    f.global_ref("missing", AddrSpace::Host);
    f.ret(&[]).unwrap();
    let mut module = Module::new("m").with_function(f.finish());

    let status = Harness::host().apply(&LowerGlobals, &mut module).unwrap_err();
    assert_eq!(status.kind(), StatusKind::InternalError);
    assert!(status.message().contains("missing"), "{status}");
}

#[test]
fn test_requires_hoisting_first() {
    let mut f = FunctionBuilder::new("f", [], []);
    f.alloc(64, 8, AddrSpace::Host);
    f.ret(&[]).unwrap();
    let module = Module::new("m").with_function(f.finish());
    let harness = Harness::host();

    let status = harness.run(vec![Box::new(LowerGlobals)], module.clone()).unwrap_err();
    assert_eq!(status.kind(), StatusKind::InternalError);
    assert!(status.message().starts_with("lower-globals"), "{status}");
    assert!(status.message().contains("GlobalsHoisted"), "{status}");

    let lowered = harness.run(vec![Box::new(AllocsToGlobals), Box::new(LowerGlobals)], module).unwrap();
    assert!(lowered.storage.is_some());
}

#[test]
fn test_layout_rejects_bad_alignment() {
    let error = layout_storage(&[GlobalDecl::zeroed("g", 16, 0, AddrSpace::Host)]).unwrap_err();
    assert_eq!(error.kind(), StatusKind::InvalidArgument);
}

#[test]
fn test_bad_global_alignment_is_a_status() {
    let mut f = FunctionBuilder::new("f", [], []);
    f.ret(&[]).unwrap();
    let mut module = Module::new("m").with_function(f.finish());
    module.globals.push(GlobalDecl::zeroed("g", 16, 0, AddrSpace::Host));

    let verified = Harness::host();
    let status = verified.run_all(module.clone()).unwrap_err();
    assert_eq!(status.kind(), StatusKind::InvalidArgument);
    assert!(status.message().starts_with("input module"), "{status}");

    let unverified = Harness::host().with_options(PipelineOptions::builder().verify_each_pass(false).build());
    let status = unverified.run_all(module.clone()).unwrap_err();
    assert_eq!(status.kind(), StatusKind::InvalidArgument);
    assert!(status.message().starts_with("allocs-to-globals"), "{status}");

    module.globals[0].align = 3;
    module.stages.insert(Stage::GlobalsHoisted);
    let status = unverified.run(vec![Box::new(LowerGlobals)], module).unwrap_err();
    assert_eq!(status.kind(), StatusKind::InvalidArgument);
    assert!(status.message().starts_with("lower-globals"), "{status}");
}
