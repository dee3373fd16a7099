//! Executor lowering pipeline.
//!
//! Takes a [`Module`](stratum_ir::Module) as produced by the frontend and
//! lowers it into the form the executor loader consumes: static allocations
//! hoisted into module storage, aggregates accessed leaf by leaf, every
//! primitive op a runtime builtin call, aggregate arguments packed as
//! `(pointer, size)` pairs and ABI metadata on every function.
//!
//! # Module Organization
//!
//! - [`pipeline`] - [`Pipeline`], the pass driver
//! - [`pass`] - the [`Pass`] trait
//! - [`passes`] - the seven lowering passes
//! - [`builtins`] - runtime builtin catalog and symbol mangling
//! - [`analysis`] - call-graph and escape analyses
//! - [`storage`] - device memory for lowered module globals
//! - [`config`] - [`PipelineOptions`]

pub mod analysis;
pub mod builtins;
pub mod config;
pub mod context;
pub mod error;
pub mod pass;
pub mod passes;
pub mod pipeline;
pub mod storage;

#[cfg(test)]
pub mod test;

pub use builtins::{BUILTIN_PREFIX, BuiltinKind, BuiltinRegistry, TypeClass};
pub use config::{IndexBitwidth, PipelineOptions};
pub use context::PassContext;
pub use error::{Error, Result};
pub use pass::Pass;
pub use pipeline::{Pipeline, standard_passes};
pub use storage::ModuleStorage;
