use smallvec::SmallVec;
use snafu::Snafu;
use stratum_dtype::DType;
use stratum_status::{Status, StatusKind};

use crate::types::{BinaryOp, FusedOp, UnaryOp, ValueId};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    // =========================================================================
    // Builder Guards
    // =========================================================================
    /// Operand dtypes of a binary, select or fused op disagree.
    #[snafu(display("dtype mismatch: cannot combine {lhs} and {rhs}"))]
    DTypeMismatch { lhs: DType, rhs: DType },

    #[snafu(display("invalid dtype for {operation:?}: {dtype}"))]
    InvalidDTypeForUnaryOp { operation: UnaryOp, dtype: DType },

    #[snafu(display("invalid dtype for {operation:?}: {dtypes:?}"))]
    InvalidDTypeForBinaryOp { operation: BinaryOp, dtypes: SmallVec<[DType; 2]> },

    #[snafu(display("{operation:?} takes {expected} operand(s), got {actual}"))]
    FusedArity { operation: FusedOp, expected: usize, actual: usize },

    /// Load, store, dealloc and pointer arithmetic need a pointer operand.
    #[snafu(display("{value} has dtype {dtype}, expected a pointer"))]
    NotAPointer { value: ValueId, dtype: DType },

    #[snafu(display("select condition must be bool, got {actual}"))]
    SelectConditionNotBool { actual: DType },

    #[snafu(display("dynamic allocation size must be an integer, got {actual}"))]
    AllocSizeNotInteger { actual: DType },

    #[snafu(display("constant {value} does not fit {dtype}"))]
    ConstDTypeMismatch { value: String, dtype: DType },

    #[snafu(display("field path {path:?} is invalid for {dtype}"))]
    InvalidFieldPath { path: Vec<usize>, dtype: DType },

    #[snafu(display("function '{function}' has no parameter {index}"))]
    ParamOutOfRange { function: String, index: usize },

    #[snafu(display("value {value} is not defined in function '{function}'"))]
    UnknownValue { function: String, value: ValueId },

    // =========================================================================
    // Verifier
    // =========================================================================
    #[snafu(display("duplicate function '{name}'"))]
    DuplicateFunction { name: String },

    #[snafu(display("duplicate global '{name}'"))]
    DuplicateGlobal { name: String },

    /// A value id is produced by more than one op or parameter.
    #[snafu(display("{value} is defined more than once in '{function}'"))]
    Redefinition { function: String, value: ValueId },

    #[snafu(display("{value} is used before it is defined in '{function}'"))]
    UseBeforeDef { function: String, value: ValueId },

    #[snafu(display("global '{name}' declares {declared} bytes but its initializer has {actual}"))]
    InitializerSize { name: String, declared: usize, actual: usize },

    #[snafu(display("global '{name}' has alignment {align}, which is not a power of two"))]
    GlobalAlignment { name: String, align: usize },

    #[snafu(display("'{caller}' calls unknown function '{callee}'"))]
    UnknownCallee { caller: String, callee: String },

    #[snafu(display("'{caller}' calls '{callee}' with {actual} argument(s), expected {expected}"))]
    CallArity { caller: String, callee: String, expected: usize, actual: usize },

    #[snafu(display("'{function}' returns {actual} value(s), signature declares {expected}"))]
    ReturnArity { function: String, expected: usize, actual: usize },

    #[snafu(display("external function '{function}' has a body"))]
    ExternalWithBody { function: String },
}

impl Error {
    pub fn kind(&self) -> StatusKind {
        StatusKind::InvalidArgument
    }
}

impl From<Error> for Status {
    fn from(error: Error) -> Self {
        Status::new(error.kind(), error.to_string())
    }
}
