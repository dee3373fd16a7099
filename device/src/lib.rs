//! Device capability queries and scoped memory allocation.
//!
//! [`DeviceInfo`] enumerates devices once and caches their descriptors.
//! [`AllocatorService`] hands out module-lifetime and frame-lifetime memory
//! for one of those devices.

pub mod allocator;
pub mod error;
pub mod info;
pub mod source;
pub mod service;


#[cfg(feature = "cuda")]
pub use allocator::CudaAllocator;
pub use allocator::{Allocator, BufferOptions, CachingAllocator, CpuAllocator, RawBuffer};
pub use error::{Error, Result};
pub use info::{ComputeCapability, DeviceDescriptor, DeviceInfo, DeviceKind, MAX_DEVICE_ALIGNMENT, MAX_HOST_ALIGNMENT};
#[cfg(feature = "cuda")]
pub use source::CudaSource;
pub use source::{DeviceSource, HostSource, StaticSource};
pub use service::{AllocationHandle, AllocatorService, AllocatorStats, FrameId, HandleId, Scope, StackFrame};
