use stratum_dtype::{AddrSpace, DType};
use stratum_ir::{BufferSource, FunctionBuilder, GlobalDecl, Initializer, Module, Op};
use stratum_status::StatusKind;
use tracing_test::traced_test;

use crate::passes::AllocsToGlobals;
use crate::test::{Harness, host};
use crate::PipelineOptions;

fn is_alloc(op: &Op) -> bool {
    matches!(op, Op::Alloc { .. })
}

/// `f` with one local scratch buffer per entry of `sizes`.
fn scratch(sizes: &[usize]) -> Module {
    let mut f = FunctionBuilder::new("f", [DType::Float32], []);
    let x = f.param(0).unwrap();
    for size in sizes {
        let buf = f.alloc(*size, 16, AddrSpace::Host);
        f.store(buf, 0, x).unwrap();
        f.dealloc(buf).unwrap();
    }
    f.ret(&[]).unwrap();
    Module::new("m").with_function(f.finish())
}

#[test]
fn test_hoists_non_escaping_static_allocation() {
    let harness = Harness::host();
    let mut module = scratch(&[1024]);
    harness.apply(&AllocsToGlobals, &mut module).unwrap();

    let f = module.function("f").unwrap();
    assert_eq!(f.count_ops(is_alloc), 0);
    assert_eq!(f.count_ops(|op| matches!(op, Op::Dealloc { .. })), 0);
    assert!(matches!(&f.body[0].op, Op::GlobalRef { name } if name == "f.alloc0"));

    let global = module.global("f.alloc0").unwrap();
    assert_eq!((global.size, global.align, global.space), (1024, 16, AddrSpace::Host));
    assert_eq!(global.init, Initializer::Zeroed);
    assert_eq!(global.origin.as_deref(), Some("f"));

    let hint = &f.metadata.buffer_hints[0];
    assert_eq!(hint.source, BufferSource::Global { name: "f.alloc0".into(), offset: None });
    assert_eq!(hint.size, Some(1024));
}

#[test]
fn test_ineligible_allocations_stay_local() {
    let mut f = FunctionBuilder::new("f", [DType::Index], [DType::ptr(AddrSpace::Host)]);
    let n = f.param(0).unwrap();
    let dynamic = f.alloc_dynamic(n, 8, AddrSpace::Host).unwrap();
    f.dealloc(dynamic).unwrap();
    let device = f.alloc(64, 8, AddrSpace::Device);
    f.dealloc(device).unwrap();
    let returned = f.alloc(64, 8, AddrSpace::Host);
    f.ret(&[returned]).unwrap();

    let mut r = FunctionBuilder::new("r", [], []);
    r.alloc(64, 8, AddrSpace::Host);
    r.call("r", &[], []).unwrap();
    r.ret(&[]).unwrap();

    let mut module = Module::new("m").with_function(f.finish()).with_function(r.finish());
    Harness::host().apply(&AllocsToGlobals, &mut module).unwrap();

    assert!(module.globals.is_empty());
    assert_eq!(module.function("f").unwrap().count_ops(is_alloc), 3);
    assert_eq!(module.function("f").unwrap().count_ops(|op| matches!(op, Op::Dealloc { .. })), 2);
    assert_eq!(module.function("r").unwrap().count_ops(is_alloc), 1);
}

#[test]
fn test_global_names_are_unique() {
    let mut module = scratch(&[32, 32]);
    module.globals.push(GlobalDecl::zeroed("f.alloc0", 4, 4, AddrSpace::Host));
    Harness::host().apply(&AllocsToGlobals, &mut module).unwrap();

    let names: Vec<_> = module.globals.iter().map(|global| global.name.as_str()).collect();
    assert_eq!(names, ["f.alloc0", "f.alloc1", "f.alloc2"]);
}

#[test]
fn test_hoist_limit() {
    let harness = Harness::host().with_options(PipelineOptions::builder().hoist_limit(512).build());
    let mut module = scratch(&[1024, 256]);
    harness.apply(&AllocsToGlobals, &mut module).unwrap();

    assert_eq!(module.globals.len(), 1);
    assert_eq!(module.globals[0].size, 256);
    assert_eq!(module.function("f").unwrap().count_ops(is_alloc), 1);
}

#[traced_test]
#[test]
fn test_capacity_keeps_allocations_local() {
    let harness = Harness::new(host(4096));
    let mut module = scratch(&[8192, 3000, 3000]);
    harness.apply(&AllocsToGlobals, &mut module).unwrap();

    assert_eq!(module.globals.len(), 1);
    assert_eq!(module.globals[0].size, 3000);
    assert_eq!(module.function("f").unwrap().count_ops(is_alloc), 2);
    assert!(logs_contain("cannot hoist allocation"));
    assert!(logs_contain("module storage exhausted"));
}

#[test]
fn test_invalid_alignment_fails() {
    let mut f = FunctionBuilder::new("f", [], []);
    f.alloc(64, 3, AddrSpace::Host);
    f.ret(&[]).unwrap();
    let mut module = Module::new("m").with_function(f.finish());

    let status = Harness::host().apply(&AllocsToGlobals, &mut module).unwrap_err();
    assert_eq!(status.kind(), StatusKind::InvalidArgument);
}
