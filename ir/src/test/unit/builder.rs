use stratum_dtype::{AddrSpace, DType};
use test_case::test_case;

use crate::error::Error;
use crate::{BinaryOp, ConstValue, FunctionBuilder, FusedOp, Op, UnaryOp};

fn builder() -> FunctionBuilder {
    FunctionBuilder::new("f", [DType::Float32, DType::Int32, DType::Bool], [])
}

#[test]
fn test_binary_result_types() {
    let mut f = builder();
    let [x, i] = [f.param(0).unwrap(), f.param(1).unwrap()];

    let sum = f.binary(BinaryOp::Add, x, x).unwrap();
    let lt = f.binary(BinaryOp::CmpLt, i, i).unwrap();

    assert_eq!(f.dtype(sum).unwrap(), &DType::Float32);
    assert_eq!(f.dtype(lt).unwrap(), &DType::Bool);
}

#[test]
fn test_binary_dtype_mismatch() {
    let mut f = builder();
    let [x, i] = [f.param(0).unwrap(), f.param(1).unwrap()];
    let error = f.binary(BinaryOp::Add, x, i).unwrap_err();
    assert!(matches!(error, Error::DTypeMismatch { .. }));
}

#[test_case(BinaryOp::And; "and")]
#[test_case(BinaryOp::Shl; "shl")]
#[test_case(BinaryOp::Xor; "xor")]
fn test_bitwise_on_float_rejected(op: BinaryOp) {
    let mut f = builder();
    let x = f.param(0).unwrap();
    assert!(matches!(f.binary(op, x, x), Err(Error::InvalidDTypeForBinaryOp { .. })));
}

#[test_case(UnaryOp::Sqrt, 1 => false; "sqrt of int")]
#[test_case(UnaryOp::Sqrt, 0 => true; "sqrt of float")]
#[test_case(UnaryOp::Not, 0 => false; "not of float")]
#[test_case(UnaryOp::Not, 2 => true; "not of bool")]
#[test_case(UnaryOp::Neg, 1 => true; "neg of int")]
fn test_unary_validity(op: UnaryOp, param: usize) -> bool {
    let mut f = builder();
    let src = f.param(param).unwrap();
    f.unary(op, src).is_ok()
}

#[test]
fn test_fused_arity() {
    let mut f = builder();
    let x = f.param(0).unwrap();
    let error = f.fused(FusedOp::MulAdd, &[x, x]).unwrap_err();
    assert_eq!(error, Error::FusedArity { operation: FusedOp::MulAdd, expected: 3, actual: 2 });
    assert!(f.fused(FusedOp::Square, &[x]).is_ok());
}

#[test]
fn test_select_requires_bool() {
    let mut f = builder();
    let [x, i, b] = [f.param(0).unwrap(), f.param(1).unwrap(), f.param(2).unwrap()];
    assert!(matches!(f.select(i, x, x), Err(Error::SelectConditionNotBool { .. })));
    assert!(f.select(b, x, x).is_ok());
}

#[test]
fn test_memory_ops_need_pointer() {
    let mut f = builder();
    let x = f.param(0).unwrap();
    assert!(matches!(f.load(x, 0, DType::Float32), Err(Error::NotAPointer { .. })));

    let buf = f.alloc(64, 16, AddrSpace::Host);
    f.store(buf, 4, x).unwrap();
    let loaded = f.load(buf, 4, DType::Float32).unwrap();
    assert_eq!(f.dtype(loaded).unwrap(), &DType::Float32);
    assert_eq!(f.dtype(buf).unwrap(), &DType::ptr(AddrSpace::Host));
}

#[test]
fn test_dynamic_alloc_size_must_be_integer() {
    let mut f = builder();
    let [x, i] = [f.param(0).unwrap(), f.param(1).unwrap()];
    assert!(matches!(f.alloc_dynamic(x, 8, AddrSpace::Host), Err(Error::AllocSizeNotInteger { .. })));
    assert!(f.alloc_dynamic(i, 8, AddrSpace::Host).is_ok());
}

#[test]
fn test_aggregate_construction_and_extract() {
    let mut f = builder();
    let [x, i] = [f.param(0).unwrap(), f.param(1).unwrap()];
    let inner = f.make_aggregate(&[x, i]).unwrap();
    let outer = f.make_aggregate(&[i, inner]).unwrap();

    assert_eq!(
        f.dtype(outer).unwrap(),
        &DType::aggregate([DType::Int32, DType::aggregate([DType::Float32, DType::Int32])])
    );
    let leaf = f.extract(outer, &[1, 0]).unwrap();
    assert_eq!(f.dtype(leaf).unwrap(), &DType::Float32);

    assert!(matches!(f.extract(outer, &[2]), Err(Error::InvalidFieldPath { .. })));
    assert!(matches!(f.extract(outer, &[]), Err(Error::InvalidFieldPath { .. })));
}

#[test]
fn test_constant_must_fit() {
    let mut f = builder();
    assert!(f.constant(ConstValue::Float(1.0), DType::Float32).is_ok());
    assert!(f.constant(ConstValue::UInt(4), DType::Index).is_ok());
    assert!(matches!(f.constant(ConstValue::Float(1.0), DType::Int32), Err(Error::ConstDTypeMismatch { .. })));
    assert!(matches!(
        f.constant(ConstValue::Int(1), DType::ptr(AddrSpace::Host)),
        Err(Error::ConstDTypeMismatch { .. })
    ));
}

#[test]
fn test_unknown_value_and_param() {
    let mut f = builder();
    assert!(matches!(f.param(9), Err(Error::ParamOutOfRange { index: 9, .. })));
    assert!(matches!(f.ret(&[crate::ValueId(100)]), Err(Error::UnknownValue { .. })));
}

#[test]
fn test_call_results_are_fresh_values() {
    let mut f = builder();
    let x = f.param(0).unwrap();
    let results = f.call("g", &[x], [DType::Float32, DType::Int32]).unwrap();
    assert_eq!(results.len(), 2);
    assert_ne!(results[0], results[1]);

    let function = f.finish();
    let call = function.body.last().unwrap();
    assert!(matches!(&call.op, Op::Call { callee, args } if callee == "g" && args.as_slice() == [x]));
    assert_eq!(call.results.len(), 2);
}

#[test]
fn test_literal_types_from_rust_value() {
    let mut f = builder();
    for (value, dtype) in [
        (f.literal(1.5f32).unwrap(), DType::Float32),
        (f.literal(-3i16).unwrap(), DType::Int16),
        (f.literal(8usize).unwrap(), DType::Index),
        (f.literal(true).unwrap(), DType::Bool),
    ] {
        assert_eq!(f.dtype(value).unwrap(), &dtype);
    }
}
