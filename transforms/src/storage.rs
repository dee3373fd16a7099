//! Backing memory for a lowered module's globals.

use snafu::{OptionExt, ResultExt, ensure};
use stratum_device::{AllocationHandle, AllocatorService, Scope};
use stratum_dtype::AddrSpace;
use stratum_ir::Module;
use stratum_status::Status;

use crate::error::*;

/// One global allocation per storage segment of a module.
///
/// Allocations are made under `Scope::Global { module }` and live until
/// [`release`](Self::release).
#[derive(Debug)]
pub struct ModuleStorage {
    module: String,
    segments: Vec<(AddrSpace, AllocationHandle)>,
}

impl ModuleStorage {
    /// Allocate every non-empty segment of `module`'s storage layout.
    ///
    /// The module's namespace must hold no live storage. On failure, segments
    /// already allocated by this call are released.
    #[tracing::instrument(skip_all, fields(module = %module.name))]
    pub fn reserve(module: &Module, allocator: &AllocatorService) -> Result<Self, Status> {
        let live = allocator.module_allocations(&module.name);
        if live > 0 {
            return Err(StorageReservedSnafu { module: module.name.clone(), live }.build().into());
        }
        let storage = Self::reserve_inner(module, allocator);
        if storage.is_err() {
            let released = allocator.release_module(&module.name);
            tracing::debug!(released, "storage reservation rolled back");
        }
        Ok(storage?)
    }

    fn reserve_inner(module: &Module, allocator: &AllocatorService) -> Result<Self> {
        let layout = module.storage.as_ref().context(NoStorageLayoutSnafu { module: module.name.clone() })?;
        let device = allocator.device();

        let mut segments = Vec::with_capacity(layout.segments.len());
        for segment in layout.segments.iter().filter(|segment| segment.size > 0) {
            ensure!(
                segment.space == device.memory_space(),
                StorageSpaceSnafu { space: segment.space, device: device.to_string() }
            );
            let handle = allocator
                .allocate(Scope::global(module.name.clone()), segment.size, segment.align)
                .context(AllocatorSnafu)?;
            tracing::debug!(space = %segment.space, size = segment.size, address = handle.address(), "segment reserved");
            segments.push((segment.space, handle));
        }
        Ok(Self { module: module.name.clone(), segments })
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// Base address of the segment for `space`.
    pub fn base_address(&self, space: AddrSpace) -> Option<usize> {
        self.segments.iter().find(|(segment, _)| *segment == space).map(|(_, handle)| handle.address())
    }

    /// Total bytes reserved.
    pub fn size(&self) -> usize {
        self.segments.iter().map(|(_, handle)| handle.size()).sum()
    }

    /// Free the module's storage. Returns the number of allocations released.
    pub fn release(self, allocator: &AllocatorService) -> usize {
        allocator.release_module(&self.module)
    }
}
