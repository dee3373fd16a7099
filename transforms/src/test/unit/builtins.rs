use stratum_dtype::{AddrSpace, DType};
use stratum_ir::{BinaryOp, UnaryOp};
use stratum_status::{Status, StatusKind};
use test_case::test_case;

use crate::builtins::symbol;
use crate::test::{cuda, host};
use crate::{BuiltinKind, BuiltinRegistry, TypeClass};

#[test_case(BuiltinKind::Binary(BinaryOp::Add), DType::Float32 => "_executor_add_f32"; "add")]
#[test_case(BuiltinKind::Binary(BinaryOp::CmpLt), DType::Index => "_executor_cmp_lt_index"; "compare")]
#[test_case(BuiltinKind::Unary(UnaryOp::Sqrt), DType::Float64 => "_executor_sqrt_f64"; "sqrt")]
#[test_case(BuiltinKind::Load, DType::Int32 => "_executor_load_i32"; "load")]
#[test_case(BuiltinKind::PtrAdd, DType::ptr(AddrSpace::Device) => "_executor_ptr_add_ptr_device"; "pointer")]
#[test_case(BuiltinKind::MakeAggregate, DType::aggregate([DType::Int8, DType::Bool]) => "_executor_make_aggregate_agg2"; "aggregate")]
#[test_case(BuiltinKind::PackAggregate, DType::aggregate([DType::Int8]) => "_executor_pack_aggregate"; "untyped")]
fn test_symbol(kind: BuiltinKind, dtype: DType) -> String {
    symbol(kind, &dtype)
}

#[test_case(DType::Bool => TypeClass::Bool)]
#[test_case(DType::Int16 => TypeClass::Signed)]
#[test_case(DType::UInt64 => TypeClass::Unsigned)]
#[test_case(DType::Index => TypeClass::Index)]
#[test_case(DType::BFloat16 => TypeClass::Half)]
#[test_case(DType::Float32 => TypeClass::Float)]
#[test_case(DType::ptr(AddrSpace::Host) => TypeClass::Pointer)]
fn test_type_class(dtype: DType) -> TypeClass {
    TypeClass::of(&dtype)
}

#[test]
fn test_standard_coverage() {
    let registry = BuiltinRegistry::standard();
    assert!(registry.supports(BuiltinKind::Unary(UnaryOp::Not), &DType::Bool));
    assert!(!registry.supports(BuiltinKind::Unary(UnaryOp::Sqrt), &DType::Int32));
    assert!(!registry.supports(BuiltinKind::Unary(UnaryOp::Neg), &DType::UInt8));
    assert!(registry.supports(BuiltinKind::Binary(BinaryOp::Xor), &DType::Bool));
    assert!(!registry.supports(BuiltinKind::Binary(BinaryOp::Shl), &DType::Float32));
    assert!(!registry.supports(BuiltinKind::Binary(BinaryOp::Add), &DType::Bool));
    assert!(registry.supports(BuiltinKind::Store, &DType::ptr(AddrSpace::Device)));
    assert!(!registry.supports(BuiltinKind::Load, &DType::aggregate([DType::Int8])));
}

#[test]
fn test_resolve_checks_registry_and_device() {
    let mut registry = BuiltinRegistry::standard();
    let gpu = cuda(5, 0);

    let status: Status = registry.resolve(BuiltinKind::Binary(BinaryOp::Add), &DType::Float16, &gpu).unwrap_err().into();
    assert_eq!(status.kind(), StatusKind::Unimplemented);
    assert!(status.message().contains("f16"), "{status}");
    assert_eq!(
        registry.resolve(BuiltinKind::Binary(BinaryOp::Add), &DType::Float16, &host(1024)).unwrap(),
        "_executor_add_f16"
    );

    registry.remove(BuiltinKind::Binary(BinaryOp::Add));
    let status: Status = registry.resolve(BuiltinKind::Binary(BinaryOp::Add), &DType::Int32, &gpu).unwrap_err().into();
    assert_eq!(status.kind(), StatusKind::Unimplemented);

    registry.register(BuiltinKind::Binary(BinaryOp::Add), TypeClass::Signed);
    assert!(registry.resolve(BuiltinKind::Binary(BinaryOp::Add), &DType::Int32, &gpu).is_ok());
    assert!(registry.resolve(BuiltinKind::Binary(BinaryOp::Add), &DType::UInt32, &gpu).is_err());
}
