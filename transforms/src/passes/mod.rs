//! The lowering passes, in pipeline order.
//!
//! 1. [`AllocsToGlobals`] - promote non-escaping static allocations
//! 2. [`DecomposeAggregates`] - per-leaf loads and stores
//! 3. [`ExpandOps`] - fused ops to primitive sequences
//! 4. [`LowerGlobals`] - storage layout, global refs to addresses
//! 5. [`LowerToRuntimeBuiltins`] - primitive ops to builtin calls
//! 6. [`PackArguments`] - aggregate parameters to `(pointer, size)` pairs
//! 7. [`PopulateFunctionMetadata`] - calling convention and ABI for the loader

pub mod allocs_to_globals;
pub mod decompose_aggregates;
pub mod expand_ops;
pub mod lower_builtins;
pub mod lower_globals;
pub mod pack_arguments;
pub mod populate_metadata;

pub use allocs_to_globals::AllocsToGlobals;
pub use decompose_aggregates::{DecomposeAggregates, decompose_function};
pub use expand_ops::ExpandOps;
pub use lower_builtins::LowerToRuntimeBuiltins;
pub use lower_globals::{LowerGlobals, layout_storage};
pub use pack_arguments::{PackArguments, packed_arity};
pub use populate_metadata::PopulateFunctionMetadata;
