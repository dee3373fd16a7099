//! Scoped host/device memory allocation.
//!
//! The [`AllocatorService`] hands out [`AllocationHandle`]s for one device.
//! Every handle has exactly one owning scope:
//!
//! - [`Scope::Global`] allocations belong to a module namespace and live until
//!   [`AllocatorService::release_module`] is called for that module.
//! - [`Scope::Stack`] allocations belong to a [`StackFrame`] and are released
//!   when the frame is dropped, on every exit path, unless released earlier.
//!
//! Capacity checks compare a request against the device's total memory minus
//! the bytes currently live. The check before allocating is advisory: the
//! ledger is re-validated when the backend's buffer is recorded, and the
//! buffer is returned if another caller consumed the capacity meanwhile.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use stratum_status::Status;

use crate::allocator::{Allocator, BufferOptions, CachingAllocator, CpuAllocator, RawBuffer};
#[cfg(not(feature = "cuda"))]
use crate::error::BackendUnavailableSnafu;
use crate::error::{
    GlobalReleaseSnafu, InactiveFrameSnafu, InvalidAlignmentSnafu, OutOfMemorySnafu, Result, UnknownAllocationSnafu, ZeroSizeSnafu,
};
use crate::info::{DeviceDescriptor, DeviceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(u64);

/// Lifetime domain of an allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Module lifetime, namespaced by module name.
    Global { module: String },
    /// Lifetime of one call frame.
    Stack(FrameId),
}

impl Scope {
    pub fn global(module: impl Into<String>) -> Self {
        Self::Global { module: module.into() }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global { .. })
    }
}

/// Token for one live allocation.
///
/// Handles are neither `Clone` nor `Copy`: [`AllocatorService::release`]
/// consumes the handle, so a region cannot be released twice through it.
#[derive(Debug, PartialEq, Eq)]
pub struct AllocationHandle {
    id: HandleId,
    scope: Scope,
    size: usize,
    alignment: usize,
    address: usize,
}

impl AllocationHandle {
    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Address of the region in the device's address space.
    pub fn address(&self) -> usize {
        self.address
    }
}

/// Ledger counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    pub bytes_in_use: usize,
    pub peak_bytes: usize,
    pub live_allocations: usize,
}

#[derive(Debug)]
struct LiveAllocation {
    raw: RawBuffer,
    scope: Scope,
}

#[derive(Debug, Default)]
struct Ledger {
    stats: AllocatorStats,
    live: HashMap<HandleId, LiveAllocation>,
    modules: HashMap<String, Vec<HandleId>>,
    frames: HashMap<FrameId, Vec<HandleId>>,
}

/// Allocation service for one device.
#[derive(Debug)]
pub struct AllocatorService {
    device: Arc<DeviceDescriptor>,
    /// Backend for module-lifetime allocations.
    global_backend: Arc<dyn Allocator>,
    /// Backend for frame-lifetime allocations (caches freed blocks).
    stack_backend: Arc<dyn Allocator>,
    ledger: Mutex<Ledger>,
    next_handle: AtomicU64,
    next_frame: AtomicU64,
}

impl AllocatorService {
    /// Service backed by the default allocator for the device's kind.
    pub fn new(device: Arc<DeviceDescriptor>) -> Result<Self, Status> {
        let backend: Box<dyn Allocator> = match device.kind {
            DeviceKind::Host => Box::new(CpuAllocator),
            #[cfg(feature = "cuda")]
            DeviceKind::Cuda => Box::new(crate::allocator::CudaAllocator::new(device.id)?),
            #[cfg(not(feature = "cuda"))]
            DeviceKind::Cuda => return Err(BackendUnavailableSnafu { kind: device.kind.to_string() }.build().into()),
        };
        Ok(Self::with_backend(device, backend))
    }

    /// Service backed by a caller-provided allocator.
    pub fn with_backend(device: Arc<DeviceDescriptor>, backend: Box<dyn Allocator>) -> Self {
        let global_backend: Arc<dyn Allocator> = Arc::from(backend);
        let stack_backend: Arc<dyn Allocator> = Arc::new(CachingAllocator::new(Box::new(Shared(global_backend.clone()))));
        Self {
            device,
            global_backend,
            stack_backend,
            ledger: Mutex::new(Ledger::default()),
            next_handle: AtomicU64::new(0),
            next_frame: AtomicU64::new(0),
        }
    }

    pub fn device(&self) -> &Arc<DeviceDescriptor> {
        &self.device
    }

    /// Bytes the device can still hand out according to the ledger.
    pub fn available(&self) -> usize {
        self.device.total_memory.saturating_sub(self.ledger.lock().stats.bytes_in_use)
    }

    pub fn stats(&self) -> AllocatorStats {
        self.ledger.lock().stats
    }

    /// Advisory check that a request would currently succeed.
    pub fn validate_request(&self, size: usize, alignment: usize) -> Result<(), Status> {
        self.check_shape(size, alignment)?;
        self.check_capacity(size, self.available())?;
        Ok(())
    }

    fn check_shape(&self, size: usize, alignment: usize) -> Result<()> {
        let max = self.device.max_alignment;
        snafu::ensure!(alignment.is_power_of_two() && alignment <= max, InvalidAlignmentSnafu { alignment, max });
        snafu::ensure!(size > 0, ZeroSizeSnafu);
        Ok(())
    }

    fn check_capacity(&self, requested: usize, available: usize) -> Result<()> {
        snafu::ensure!(
            requested <= available,
            OutOfMemorySnafu { device: self.device.to_string(), requested, available }
        );
        Ok(())
    }

    /// Allocate `size` bytes aligned to `alignment`, owned by `scope`.
    #[tracing::instrument(skip(self), fields(device = %self.device))]
    pub fn allocate(&self, scope: Scope, size: usize, alignment: usize) -> Result<AllocationHandle, Status> {
        Ok(self.allocate_inner(scope, size, alignment)?)
    }

    fn allocate_inner(&self, scope: Scope, size: usize, alignment: usize) -> Result<AllocationHandle> {
        self.check_shape(size, alignment)?;
        self.check_capacity(size, self.available())?;
        if let Scope::Stack(frame) = &scope {
            snafu::ensure!(self.ledger.lock().frames.contains_key(frame), InactiveFrameSnafu { frame: frame.0 });
        }

        let (backend, options) = match scope {
            Scope::Global { .. } => (&self.global_backend, BufferOptions { zero_init: true }),
            Scope::Stack(_) => (&self.stack_backend, BufferOptions::default()),
        };
        let raw = backend.alloc(size, alignment, &options)?;

        let mut ledger = self.ledger.lock();
        let available = self.device.total_memory.saturating_sub(ledger.stats.bytes_in_use);
        if let Err(error) = self.check_capacity(size, available) {
            drop(ledger);
            backend.free(raw);
            return Err(error);
        }

        // The frame may have been dropped while the backend was allocating.
        if let Scope::Stack(frame) = &scope
            && !ledger.frames.contains_key(frame)
        {
            drop(ledger);
            backend.free(raw);
            return InactiveFrameSnafu { frame: frame.0 }.fail();
        }

        let id = HandleId(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let address = raw.address();
        match &scope {
            Scope::Global { module } => ledger.modules.entry(module.clone()).or_default().push(id),
            Scope::Stack(frame) => ledger.frames.entry(*frame).or_default().push(id),
        }
        ledger.live.insert(id, LiveAllocation { raw, scope: scope.clone() });
        ledger.stats.bytes_in_use += size;
        ledger.stats.peak_bytes = ledger.stats.peak_bytes.max(ledger.stats.bytes_in_use);
        ledger.stats.live_allocations += 1;
        tracing::debug!(handle = %id, size, alignment, in_use = ledger.stats.bytes_in_use, "allocated");

        Ok(AllocationHandle { id, scope, size, alignment, address })
    }

    /// Release a stack allocation before its frame exits.
    ///
    /// Global allocations cannot be released individually; see
    /// [`release_module`](Self::release_module).
    pub fn release(&self, handle: AllocationHandle) -> Result<(), Status> {
        Ok(self.release_inner(handle)?)
    }

    fn release_inner(&self, handle: AllocationHandle) -> Result<()> {
        if let Scope::Global { module } = &handle.scope {
            return GlobalReleaseSnafu { id: handle.id.0, module: module.clone() }.fail();
        }

        let mut ledger = self.ledger.lock();
        let live = Self::take(&mut ledger, handle.id).ok_or_else(|| UnknownAllocationSnafu { id: handle.id.0 }.build())?;
        if let Scope::Stack(frame) = &live.scope
            && let Some(ids) = ledger.frames.get_mut(frame)
        {
            ids.retain(|id| *id != handle.id);
        }
        drop(ledger);

        self.stack_backend.free(live.raw);
        Ok(())
    }

    /// Number of live global allocations in `module`'s namespace.
    pub fn module_allocations(&self, module: &str) -> usize {
        self.ledger.lock().modules.get(module).map_or(0, Vec::len)
    }

    /// Release every global allocation of `module`. Returns how many were freed.
    pub fn release_module(&self, module: &str) -> usize {
        let mut ledger = self.ledger.lock();
        let ids = ledger.modules.remove(module).unwrap_or_default();
        let raws: Vec<RawBuffer> = ids.into_iter().filter_map(|id| Self::take(&mut ledger, id)).map(|l| l.raw).collect();
        drop(ledger);

        let released = raws.len();
        for raw in raws {
            self.global_backend.free(raw);
        }
        tracing::debug!(module, released, "module allocations released");
        released
    }

    /// Open a call frame whose stack allocations are released on drop.
    pub fn enter_frame(&self) -> StackFrame<'_> {
        let id = FrameId(self.next_frame.fetch_add(1, Ordering::Relaxed));
        self.ledger.lock().frames.insert(id, Vec::new());
        StackFrame { service: self, id }
    }

    fn release_frame(&self, frame: FrameId) -> usize {
        let mut ledger = self.ledger.lock();
        let ids = ledger.frames.remove(&frame).unwrap_or_default();
        let raws: Vec<RawBuffer> = ids.into_iter().filter_map(|id| Self::take(&mut ledger, id)).map(|l| l.raw).collect();
        drop(ledger);

        let released = raws.len();
        for raw in raws {
            self.stack_backend.free(raw);
        }
        released
    }

    fn take(ledger: &mut Ledger, id: HandleId) -> Option<LiveAllocation> {
        let live = ledger.live.remove(&id)?;
        ledger.stats.bytes_in_use -= live.raw.size();
        ledger.stats.live_allocations -= 1;
        Some(live)
    }
}

/// Forwards to a shared backend so the stack cache and global allocations
/// use the same memory source.
#[derive(Debug)]
struct Shared(Arc<dyn Allocator>);

impl Allocator for Shared {
    fn alloc(&self, size: usize, alignment: usize, options: &BufferOptions) -> Result<RawBuffer> {
        self.0.alloc(size, alignment, options)
    }

    fn free(&self, buffer: RawBuffer) {
        self.0.free(buffer)
    }

    fn synchronize(&self) -> Result<()> {
        self.0.synchronize()
    }

    fn name(&self) -> &str {
        self.0.name()
    }
}

/// One call frame's stack scope.
#[derive(Debug)]
pub struct StackFrame<'a> {
    service: &'a AllocatorService,
    id: FrameId,
}

impl StackFrame<'_> {
    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn scope(&self) -> Scope {
        Scope::Stack(self.id)
    }

    pub fn allocate(&self, size: usize, alignment: usize) -> Result<AllocationHandle, Status> {
        self.service.allocate(self.scope(), size, alignment)
    }
}

impl Drop for StackFrame<'_> {
    fn drop(&mut self) {
        let released = self.service.release_frame(self.id);
        if released > 0 {
            tracing::debug!(frame = self.id.0, released, "stack frame released");
        }
    }
}
