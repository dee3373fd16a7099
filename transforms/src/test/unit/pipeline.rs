use std::collections::HashMap;

use stratum_dtype::{AddrSpace, DType};
use stratum_ir::{CallingConvention, Function, FunctionBuilder, FusedOp, Module, Op, UnaryOp};
use stratum_status::StatusKind;
use tracing_test::traced_test;

use crate::test::Harness;
use crate::{BuiltinKind, Pipeline, PipelineOptions, standard_passes};

/// `scale(pair, f32)` plus a caller staging a pair in a 1 KiB scratch buffer.
fn program() -> Module {
    let pair = DType::aggregate([DType::Float32, DType::Float32]);

    let mut g = FunctionBuilder::new("scale", [pair, DType::Float32], [DType::Float32]);
    let [p, k] = [g.param(0).unwrap(), g.param(1).unwrap()];
    let x = g.extract(p, &[0]).unwrap();
    let y = g.fused(FusedOp::MulAdd, &[x, k, k]).unwrap();
    g.ret(&[y]).unwrap();

    let mut f = FunctionBuilder::new("main", [DType::Float32], [DType::Float32]);
    let a = f.param(0).unwrap();
    let scratch = f.alloc(1024, 16, AddrSpace::Host);
    let value = f.make_aggregate(&[a, a]).unwrap();
    f.store(scratch, 0, value).unwrap();
    let staged = f.load(scratch, 0, DType::aggregate([DType::Float32, DType::Float32])).unwrap();
    let squared = f.fused(FusedOp::Square, &[a]).unwrap();
    let result = f.call("scale", &[staged, squared], [DType::Float32]).unwrap();
    f.ret(&result).unwrap();

    Module::new("program").with_function(g.finish()).with_function(f.finish())
}

#[test]
fn test_full_lowering() {
    let module = Harness::host().run_all(program()).unwrap();
    assert!(module.is_finalized());
    assert_eq!(module.stages.len(), 7);

    let storage = module.storage.as_ref().unwrap();
    assert_eq!(storage.segment(AddrSpace::Host).unwrap().size, 1024);
    assert_eq!(module.globals.len(), 1);

    for function in &module.functions {
        assert_eq!(function.metadata.cconv, CallingConvention::Packed, "{function}");
        assert_eq!(function.metadata.args.len(), function.signature.params.len());
        assert_eq!(function.count_ops(|op| matches!(op, Op::Alloc { .. })), 0, "{function}");
        assert_eq!(function.count_ops(|op| op.is_primitive()), 0, "{function}");
        assert!(runtime_calls(function) > 0, "{function}");
        assert_eq!(function.count_ops(|op| matches!(op, Op::Fused { .. })), 0, "{function}");
        assert_eq!(function.count_ops(|op| matches!(op, Op::GlobalRef { .. })), 0, "{function}");
    }

    let scale = module.function("scale").unwrap();
    assert_eq!(scale.signature.params.len(), 3);
}

fn runtime_calls(function: &Function) -> usize {
    function.count_ops(|op| matches!(op, Op::Builtin { name, .. } if !name.ends_with("pack_aggregate")))
}

#[test]
fn test_one_builtin_per_primitive_op() {
    let harness = Harness::host();
    let mut passes = standard_passes();
    let lowering = passes.split_off(4);

    let before = harness.run(passes, program()).unwrap();
    let primitives: HashMap<String, usize> = before
        .functions
        .iter()
        .map(|function| (function.name.clone(), function.count_ops(Op::is_primitive)))
        .collect();
    assert_eq!(primitives["scale"], 3, "extract, mul, add");
    assert_eq!(primitives["main"], 8, "storage_base, ptr_add, 2 stores, 2 loads, make_aggregate, mul");

    let after = harness.run(lowering, before).unwrap();
    assert!(after.is_finalized());
    for function in &after.functions {
        assert_eq!(runtime_calls(function), primitives[&function.name], "{function}");
        assert_eq!(function.count_ops(|op| matches!(op, Op::Store { .. } | Op::Load { .. })), 0);
    }
}

#[test]
fn test_pass_order() {
    let harness = Harness::host();
    let pipeline = Pipeline::new(harness.ctx());
    assert_eq!(
        pipeline.pass_names(),
        [
            "allocs-to-globals",
            "decompose-aggregate-loads-and-stores",
            "expand-ops",
            "lower-globals",
            "lower-to-runtime-builtins",
            "pack-arguments",
            "populate-function-metadata",
        ]
    );
}

#[test]
fn test_finalized_module_rejected() {
    let harness = Harness::host();
    let module = harness.run_all(program()).unwrap();

    let status = harness.run_all(module).unwrap_err();
    assert_eq!(status.kind(), StatusKind::InternalError);
    assert!(status.message().contains("finalized"), "{status}");
}

#[test]
fn test_malformed_input() {
    let mut module = program();
    module.function_mut("main").unwrap().body.swap(1, 2);

    let status = Harness::host().run_all(module).unwrap_err();
    assert_eq!(status.kind(), StatusKind::InvalidArgument);
    assert!(status.message().starts_with("input module"), "{status}");
}

#[traced_test]
#[test]
fn test_failure_aborts_pipeline() {
    let mut harness = Harness::host();
    harness.builtins.remove(BuiltinKind::Unary(UnaryOp::Neg));

    let mut f = FunctionBuilder::new("f", [DType::Float32], [DType::Float32]);
    let x = f.param(0).unwrap();
    let y = f.unary(UnaryOp::Neg, x).unwrap();
    f.ret(&[y]).unwrap();

    let status = harness.run_all(Module::new("m").with_function(f.finish())).unwrap_err();
    assert_eq!(status.kind(), StatusKind::Unimplemented);
    assert!(status.message().starts_with("lower-to-runtime-builtins"), "{status}");
    assert!(logs_contain("pass failed; aborting"));
    assert!(!logs_contain("pack-arguments"));
}

#[traced_test]
#[test]
fn test_dump_ir() {
    let harness = Harness::host().with_options(PipelineOptions::builder().dump_ir(true).build());
    harness.run_all(program()).unwrap();
    for name in Pipeline::new(harness.ctx()).pass_names() {
        assert!(logs_contain(&format!("after {name}:")), "{name}");
    }
}
