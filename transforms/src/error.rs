use snafu::Snafu;
use stratum_dtype::{AddrSpace, DType, ScalarDType};
use stratum_ir::{FusedOp, ValueId};
use stratum_status::{Status, StatusKind};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    // =========================================================================
    // Pipeline Ordering
    // =========================================================================
    #[snafu(display("{pass} requires {missing} to have run first"))]
    MissingStage { pass: &'static str, missing: String },

    #[snafu(display("module '{module}' is finalized; no further passes may run"))]
    Finalized { module: String },

    #[snafu(display("arguments of '{name}' are already packed"))]
    AlreadyPacked { name: String },

    #[snafu(display("packing of '{function}' disagrees with its signature"))]
    PackingMismatch { function: String },

    /// An op kind that an earlier pass should have eliminated.
    #[snafu(display("'{function}' still contains {op} after {stage}"))]
    Leftover { function: String, op: String, stage: &'static str },

    /// The module failed verification after a pass.
    #[snafu(display("module is malformed: {source}"))]
    Malformed { source: stratum_ir::Error },

    // =========================================================================
    // Lowering
    // =========================================================================
    #[snafu(display("'{function}' references undeclared global '{name}'"))]
    UndeclaredGlobal { function: String, name: String },

    #[snafu(display("global '{name}' has no storage placement"))]
    MissingPlacement { name: String },

    #[snafu(display("{op} in '{function}' defines no result"))]
    MissingResult { function: String, op: String },

    #[snafu(display("{value} in '{function}' has no known dtype"))]
    UnknownValue { function: String, value: ValueId },

    #[snafu(display("field path {path:?} selects no leaf of {dtype}"))]
    EmptyLeafRange { path: Vec<usize>, dtype: DType },

    #[snafu(display("no runtime builtin for {op} on {dtype}"))]
    NoBuiltin { op: String, dtype: DType },

    #[snafu(display("{device} does not support {dtype} arithmetic"))]
    UnsupportedOnDevice { dtype: ScalarDType, device: String },

    #[snafu(display("{op:?} in '{function}': {reason}"))]
    FusedOperands { function: String, op: FusedOp, reason: String },

    // =========================================================================
    // Calls
    // =========================================================================
    #[snafu(display("global '{name}' has alignment {align}, which is not a power of two"))]
    GlobalAlignment { name: String, align: usize },

    #[snafu(display("'{caller}' calls unknown function '{callee}'"))]
    UnknownCallee { caller: String, callee: String },

    #[snafu(display("'{caller}' calls '{callee}' with {actual} argument(s), expected {expected}"))]
    CallArity { caller: String, callee: String, expected: usize, actual: usize },

    /// Call site disagrees with the callee's packed signature.
    #[snafu(display("'{caller}' passes {actual} packed argument(s) to '{callee}', which declares {expected}"))]
    PackedArity { caller: String, callee: String, expected: usize, actual: usize },

    // =========================================================================
    // Storage
    // =========================================================================
    /// Rolling back a partial reservation frees the whole namespace.
    #[snafu(display("module '{module}' already holds {live} storage allocation(s)"))]
    StorageReserved { module: String, live: usize },

    #[snafu(display("module '{module}' has no storage layout"))]
    NoStorageLayout { module: String },

    #[snafu(display("{space} storage cannot be placed on {device}"))]
    StorageSpace { space: AddrSpace, device: String },

    /// Failure reported by the allocator service.
    #[snafu(display("{source}"))]
    Allocator { source: Status },
}

impl Error {
    pub fn kind(&self) -> StatusKind {
        match self {
            Self::MissingStage { .. }
            | Self::Finalized { .. }
            | Self::AlreadyPacked { .. }
            | Self::PackingMismatch { .. }
            | Self::Leftover { .. }
            | Self::Malformed { .. }
            | Self::UndeclaredGlobal { .. }
            | Self::MissingPlacement { .. }
            | Self::UnknownValue { .. }
            | Self::MissingResult { .. }
            | Self::EmptyLeafRange { .. }
            | Self::PackedArity { .. } => StatusKind::InternalError,
            Self::NoBuiltin { .. } | Self::UnsupportedOnDevice { .. } => StatusKind::Unimplemented,
            Self::FusedOperands { .. }
            | Self::GlobalAlignment { .. }
            | Self::UnknownCallee { .. }
            | Self::CallArity { .. }
            | Self::NoStorageLayout { .. }
            | Self::StorageReserved { .. }
            | Self::StorageSpace { .. } => StatusKind::InvalidArgument,
            Self::Allocator { source } => source.kind(),
        }
    }
}

impl From<Error> for Status {
    fn from(error: Error) -> Self {
        match error {
            Error::Allocator { source } => source,
            other => Status::new(other.kind(), other.to_string()),
        }
    }
}
