use std::collections::HashMap;

use stratum_dtype::{AddrSpace, DType};

use crate::{BinaryOp, ConstValue, Function, FunctionBuilder, Op, ValueId};

#[test]
fn test_dead_pure_ops_removed() {
    let mut f = FunctionBuilder::new("f", [DType::Int32], [DType::Int32]);
    let x = f.param(0).unwrap();
    let unused = f.binary(BinaryOp::Mul, x, x).unwrap();
    f.binary(BinaryOp::Add, unused, x).unwrap();
    let kept = f.binary(BinaryOp::Sub, x, x).unwrap();
    f.ret(&[kept]).unwrap();

    let mut function = f.finish();
    assert_eq!(function.eliminate_dead_code(), 2);
    assert_eq!(function.body.len(), 2);
    assert_eq!(function.eliminate_dead_code(), 0);
}

#[test]
fn test_side_effects_survive_dce() {
    let mut f = FunctionBuilder::new("f", [DType::Int32], []);
    let x = f.param(0).unwrap();
    let buf = f.alloc(4, 4, AddrSpace::Host);
    f.store(buf, 0, x).unwrap();
    f.call("sink", &[], []).unwrap();
    f.ret(&[]).unwrap();

    let mut function = f.finish();
    assert_eq!(function.eliminate_dead_code(), 0);
    assert_eq!(function.body.len(), 4);
}

#[test]
fn test_substitute_follows_chains() {
    let mut f = FunctionBuilder::new("f", [DType::Int32, DType::Int32, DType::Int32], [DType::Int32]);
    let [a, b, c] = [f.param(0).unwrap(), f.param(1).unwrap(), f.param(2).unwrap()];
    let sum = f.binary(BinaryOp::Add, a, a).unwrap();
    f.ret(&[sum]).unwrap();

    let mut function = f.finish();
    function.substitute(&HashMap::from([(a, b), (b, c)]));
    assert!(matches!(function.body[0].op, Op::Binary { lhs, rhs, .. } if lhs == c && rhs == c));
}

#[test]
fn test_fresh_values_do_not_collide() {
    let mut f = FunctionBuilder::new("f", [DType::Float32], []);
    f.constant(ConstValue::Float(2.0), DType::Float32).unwrap();
    let mut function = f.finish();

    let fresh = function.fresh_value(DType::Float32);
    assert!(!function.value_types().contains_key(&fresh.id));
    assert_eq!(fresh.id, ValueId(2));
}

#[test]
fn test_declare_is_external() {
    let function = Function::declare("ext", [DType::Int64], [DType::Int64]);
    assert!(function.is_external());
    assert!(function.body.is_empty());
    assert_eq!(function.signature.params.len(), 1);
}
