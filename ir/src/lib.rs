//! Intermediate representation consumed by the executor transforms.
//!
//! # Module Organization
//!
//! - [`types`] - Value ids, constants and operator enums
//! - [`op`] - [`Op`] and [`Operation`]
//! - [`function`] - [`Function`], signatures and the checked [`FunctionBuilder`]
//! - [`metadata`] - Per-function ABI metadata for the loader
//! - [`module`] - [`Module`], globals, storage layout and lowering stages
//! - [`verify`] - Structural well-formedness checks
//! - [`print`] - Textual IR

pub mod error;
pub mod function;
pub mod metadata;
pub mod module;
pub mod op;
pub mod print;
pub mod types;
pub mod verify;

#[cfg(test)]
pub mod test;

pub use error::{Error, Result};
pub use function::{Function, FunctionBuilder, Linkage, Signature};
pub use metadata::{ArgAbi, ArgKind, ArgPacking, BufferHint, BufferSource, CallingConvention, Metadata};
pub use module::{GlobalDecl, Initializer, Module, Placement, Stage, StorageLayout, StorageSegment};
pub use op::{Op, Operation};
pub use types::{AllocSize, BinaryOp, ConstValue, FusedOp, UnaryOp, Value, ValueId};
pub use verify::verify_module;

pub use stratum_dtype::{AddrSpace, DType, ScalarDType};
