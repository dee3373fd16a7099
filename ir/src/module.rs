//! Modules, globals and storage layout.

use enumset::{EnumSet, EnumSetType};
use stratum_dtype::AddrSpace;

use crate::function::Function;

/// Lowering stages a module has been through, in pipeline order.
#[derive(Debug, Hash, PartialOrd, Ord, EnumSetType, strum::EnumIter, strum::AsRefStr)]
pub enum Stage {
    GlobalsHoisted,
    AggregatesDecomposed,
    OpsExpanded,
    GlobalsLowered,
    BuiltinsLowered,
    ArgumentsPacked,
    /// Terminal stage: the module is ready for the loader.
    MetadataPopulated,
}

/// Initial contents of a global.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Initializer {
    Zeroed,
    Bytes(Vec<u8>),
}

impl Initializer {
    /// Number of bytes the initializer provides, `None` for zero-fill.
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Zeroed => None,
            Self::Bytes(bytes) => Some(bytes.len()),
        }
    }
}

/// A module-scoped storage slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GlobalDecl {
    pub name: String,
    pub size: usize,
    pub align: usize,
    pub space: AddrSpace,
    pub init: Initializer,
    /// Function the slot was promoted from, if any.
    pub origin: Option<String>,
}

impl GlobalDecl {
    pub fn zeroed(name: impl Into<String>, size: usize, align: usize, space: AddrSpace) -> Self {
        Self { name: name.into(), size, align, space, init: Initializer::Zeroed, origin: None }
    }
}

/// One contiguous region of module storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageSegment {
    pub space: AddrSpace,
    pub size: usize,
    pub align: usize,
}

/// Placement of one global inside its segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Placement {
    pub name: String,
    pub space: AddrSpace,
    pub offset: usize,
}

/// Module storage: one segment per address space in use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageLayout {
    pub segments: Vec<StorageSegment>,
    pub placements: Vec<Placement>,
}

impl StorageLayout {
    pub fn placement(&self, name: &str) -> Option<&Placement> {
        self.placements.iter().find(|placement| placement.name == name)
    }

    pub fn segment(&self, space: AddrSpace) -> Option<&StorageSegment> {
        self.segments.iter().find(|segment| segment.space == space)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    /// Also the allocation namespace of the module's globals.
    pub name: String,
    pub functions: Vec<Function>,
    pub globals: Vec<GlobalDecl>,
    pub storage: Option<StorageLayout>,
    pub stages: EnumSet<Stage>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), functions: Vec::new(), globals: Vec::new(), storage: None, stages: EnumSet::empty() }
    }

    pub fn with_function(mut self, function: Function) -> Self {
        self.functions.push(function);
        self
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|function| function.name == name)
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|function| function.name == name)
    }

    pub fn global(&self, name: &str) -> Option<&GlobalDecl> {
        self.globals.iter().find(|global| global.name == name)
    }

    /// Functions with a body.
    pub fn definitions_mut(&mut self) -> impl Iterator<Item = &mut Function> {
        self.functions.iter_mut().filter(|function| !function.is_external())
    }

    pub fn has_stage(&self, stage: Stage) -> bool {
        self.stages.contains(stage)
    }

    /// The module has been through the whole pipeline.
    pub fn is_finalized(&self) -> bool {
        self.has_stage(Stage::MetadataPopulated)
    }
}
