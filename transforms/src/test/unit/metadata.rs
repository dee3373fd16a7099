use std::collections::HashMap;

use stratum_dtype::{AddrSpace, DType};
use stratum_ir::{
    ArgAbi, ArgKind, BufferHint, BufferSource, CallingConvention, FunctionBuilder, Module, Op,
};
use stratum_status::StatusKind;

use crate::passes::{PopulateFunctionMetadata, packed_arity};
use crate::standard_passes;
use crate::test::Harness;

fn abi(kind: ArgKind, size: usize, align: usize) -> ArgAbi {
    ArgAbi { kind, size, align }
}

fn calls() -> Module {
    let pair = DType::aggregate([DType::Float32, DType::Int32]);
    let mut g = FunctionBuilder::new("callee", [pair, DType::Float32], [DType::Float32]);
    let x = g.param(1).unwrap();
    g.ret(&[x]).unwrap();

    let mut f = FunctionBuilder::new("caller", [DType::Float32, DType::Int32], [DType::Float32]);
    let [a, b] = [f.param(0).unwrap(), f.param(1).unwrap()];
    let first = f.alloc(100, 4, AddrSpace::Host);
    f.store(first, 0, a).unwrap();
    let second = f.alloc(8, 8, AddrSpace::Host);
    f.store(second, 0, b).unwrap();
    let value = f.make_aggregate(&[a, b]).unwrap();
    let result = f.call("callee", &[value, a], [DType::Float32]).unwrap();
    f.ret(&result).unwrap();

    Module::new("m").with_function(g.finish()).with_function(f.finish())
}

/// Everything up to, not including, metadata population.
fn packed(harness: &Harness) -> Module {
    let mut passes = standard_passes();
    passes.truncate(6);
    harness.run(passes, calls()).unwrap()
}

#[test]
fn test_argument_abi() {
    let module = Harness::host().run_all(calls()).unwrap();

    let callee = &module.function("callee").unwrap().metadata;
    assert_eq!(callee.cconv, CallingConvention::Packed);
    assert_eq!(
        callee.args,
        [abi(ArgKind::AggregatePointer, 8, 8), abi(ArgKind::AggregateSize, 8, 8), abi(ArgKind::Scalar, 4, 4)]
    );
    assert_eq!(callee.results, [abi(ArgKind::Scalar, 4, 4)]);

    let caller = &module.function("caller").unwrap().metadata;
    assert_eq!(caller.args, [abi(ArgKind::Scalar, 4, 4), abi(ArgKind::Scalar, 4, 4)]);
}

#[test]
fn test_call_sites_match_packed_arity() {
    let module = Harness::host().run_all(calls()).unwrap();
    let arities: HashMap<_, _> =
        module.functions.iter().map(|function| (function.name.as_str(), packed_arity(function))).collect();

    for function in &module.functions {
        assert_eq!(function.signature.params.len(), packed_arity(function));
        for operation in &function.body {
            if let Op::Call { callee, args } = &operation.op {
                assert_eq!(args.len(), arities[callee.as_str()], "{function}");
            }
        }
    }
}

#[test]
fn test_global_hints_resolved() {
    let module = Harness::host().run_all(calls()).unwrap();
    let hints: Vec<_> = module
        .function("caller")
        .unwrap()
        .metadata
        .buffer_hints
        .iter()
        .map(|hint| (hint.source.clone(), hint.size))
        .collect();
    assert_eq!(
        hints,
        [
            (BufferSource::Global { name: "caller.alloc0".into(), offset: Some(0) }, Some(100)),
            (BufferSource::Global { name: "caller.alloc1".into(), offset: Some(104) }, Some(8)),
        ]
    );
}

#[test]
fn test_packed_arity_mismatch() {
    let harness = Harness::host();
    let mut module = packed(&harness);
    for operation in &mut module.function_mut("caller").unwrap().body {
        if let Op::Call { args, .. } = &mut operation.op {
            args.pop();
        }
    }

    let status = harness.apply(&PopulateFunctionMetadata, &mut module).unwrap_err();
    assert_eq!(status.kind(), StatusKind::InternalError);
    assert!(status.message().contains("which declares 3"), "{status}");
}

#[test]
fn test_missing_placement() {
    let harness = Harness::host();
    let mut module = packed(&harness);
    module.function_mut("callee").unwrap().metadata.buffer_hints.push(BufferHint {
        source: BufferSource::Global { name: "ghost".into(), offset: None },
        size: Some(4),
        align: 4,
    });

    let status = harness.apply(&PopulateFunctionMetadata, &mut module).unwrap_err();
    assert_eq!(status.kind(), StatusKind::InternalError);
    assert!(status.message().contains("ghost"), "{status}");
}
