//! Device capability queries.
//!
//! Devices are enumerated once when a [`DeviceInfo`] is built, normally at
//! process start. Every descriptor (or the reason its query failed) is cached
//! for the lifetime of the `DeviceInfo`; there is no hot-plug support. The
//! host process owns the `DeviceInfo` and passes descriptors explicitly to the
//! allocator service and the transform pipeline.

use std::fmt;
use std::sync::Arc;

use bon::bon;
use stratum_dtype::{AddrSpace, ScalarDType};
use stratum_status::Status;

use crate::error::{DeviceQuerySnafu, Error, Result, UnknownDeviceSnafu};
use crate::source::{DeviceSource, HostSource};

/// Maximum alignment of device (accelerator) allocations.
pub const MAX_DEVICE_ALIGNMENT: usize = 256;

/// Maximum alignment of host allocations (one page).
pub const MAX_HOST_ALIGNMENT: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr)]
pub enum DeviceKind {
    Host,
    Cuda,
}

impl DeviceKind {
    /// Address space of memory allocated on this kind of device.
    pub const fn memory_space(&self) -> AddrSpace {
        match self {
            Self::Host => AddrSpace::Host,
            Self::Cuda => AddrSpace::Device,
        }
    }

    pub const fn default_max_alignment(&self) -> usize {
        match self {
            Self::Host => MAX_HOST_ALIGNMENT,
            Self::Cuda => MAX_DEVICE_ALIGNMENT,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComputeCapability {
    pub major: u32,
    pub minor: u32,
}

impl ComputeCapability {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for ComputeCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Immutable snapshot of one device's capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub id: usize,
    pub name: String,
    pub kind: DeviceKind,
    /// Total memory in bytes.
    pub total_memory: usize,
    /// Compute capability (0.0 for host devices).
    pub compute_capability: ComputeCapability,
    pub multiprocessor_count: u32,
    pub max_threads_per_block: u32,
    pub warp_size: u32,
    pub max_shared_memory_per_block: usize,
    /// Kernels the device can run concurrently.
    pub max_concurrent_kernels: u32,
    /// Largest alignment an allocation may request.
    pub max_alignment: usize,
}

#[bon]
impl DeviceDescriptor {
    /// Create a descriptor with builder pattern.
    #[builder]
    pub fn builder(
        id: usize,
        #[builder(into)] name: String,
        kind: DeviceKind,
        total_memory: usize,
        #[builder(default)] compute_capability: ComputeCapability,
        #[builder(default = 1)] multiprocessor_count: u32,
        #[builder(default = 1)] max_threads_per_block: u32,
        #[builder(default = 1)] warp_size: u32,
        #[builder(default = 0)] max_shared_memory_per_block: usize,
        #[builder(default = 1)] max_concurrent_kernels: u32,
        max_alignment: Option<usize>,
    ) -> Self {
        Self {
            id,
            name,
            kind,
            total_memory,
            compute_capability,
            multiprocessor_count,
            max_threads_per_block,
            warp_size,
            max_shared_memory_per_block,
            max_concurrent_kernels,
            max_alignment: max_alignment.unwrap_or_else(|| kind.default_max_alignment()),
        }
    }
}

impl DeviceDescriptor {
    pub fn memory_space(&self) -> AddrSpace {
        self.kind.memory_space()
    }

    /// Upper bound on the storage one module's globals may occupy.
    ///
    /// On CUDA devices the per-block shared memory of every multiprocessor is
    /// carved out of global memory and unavailable to module storage.
    pub fn available_for_globals(&self) -> usize {
        match self.kind {
            DeviceKind::Host => self.total_memory,
            DeviceKind::Cuda => self
                .total_memory
                .saturating_sub(self.max_shared_memory_per_block * self.multiprocessor_count as usize),
        }
    }

    pub fn is_host(&self) -> bool {
        self.kind == DeviceKind::Host
    }

    /// Whether arithmetic on `scalar` is available on this device.
    ///
    /// Host builtins emulate half types in software. CUDA devices need
    /// compute capability 5.3 for `f16` and 8.0 for `bf16`.
    pub fn supports(&self, scalar: ScalarDType) -> bool {
        match (self.kind, scalar) {
            (DeviceKind::Host, _) => true,
            (DeviceKind::Cuda, ScalarDType::Float16) => self.compute_capability >= ComputeCapability::new(5, 3),
            (DeviceKind::Cuda, ScalarDType::BFloat16) => self.compute_capability >= ComputeCapability::new(8, 0),
            (DeviceKind::Cuda, _) => true,
        }
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.kind, self.id, self.name)
    }
}

#[derive(Debug)]
enum Slot {
    Ready(Arc<DeviceDescriptor>),
    Failed { reason: String },
}

/// Cached capabilities of every device present at startup.
#[derive(Debug)]
pub struct DeviceInfo {
    slots: Vec<Slot>,
}

impl DeviceInfo {
    /// Enumerate and query every device the source reports.
    ///
    /// A device whose query fails is remembered as failed; only a failure to
    /// enumerate at all fails construction.
    #[tracing::instrument(skip_all, fields(source = source.name()))]
    pub fn enumerate(source: &dyn DeviceSource) -> Result<Self, Status> {
        let count = source.device_count()?;
        let slots = (0..count)
            .map(|id| match source.query(id) {
                Ok(descriptor) if descriptor.id == id => {
                    tracing::debug!(device = %descriptor, memory = descriptor.total_memory, "device queried");
                    Slot::Ready(Arc::new(descriptor))
                }
                Ok(descriptor) => {
                    let reason = format!("source returned descriptor for device {}", descriptor.id);
                    tracing::warn!(device.id = id, %reason, "device query failed");
                    Slot::Failed { reason }
                }
                Err(error) => {
                    tracing::warn!(device.id = id, %error, "device query failed");
                    let reason = match error {
                        Error::DeviceQuery { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    Slot::Failed { reason }
                }
            })
            .collect();
        Ok(Self { slots })
    }

    /// Device info for the host alone, configured from the environment.
    pub fn host() -> Result<Self, Status> {
        Self::enumerate(&HostSource::from_env())
    }

    /// Cached descriptor of device `id`.
    pub fn query_device(&self, id: usize) -> Result<Arc<DeviceDescriptor>, Status> {
        Ok(self.lookup(id)?)
    }

    fn lookup(&self, id: usize) -> Result<Arc<DeviceDescriptor>> {
        match self.slots.get(id) {
            Some(Slot::Ready(descriptor)) => Ok(Arc::clone(descriptor)),
            Some(Slot::Failed { reason }) => DeviceQuerySnafu { id, reason: reason.clone() }.fail(),
            None => UnknownDeviceSnafu { id, count: self.slots.len() }.fail(),
        }
    }

    /// Number of enumerated devices, including ones whose query failed.
    pub fn device_count(&self) -> usize {
        self.slots.len()
    }

    /// Descriptors of every device that was queried successfully.
    pub fn devices(&self) -> impl Iterator<Item = &Arc<DeviceDescriptor>> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Ready(descriptor) => Some(descriptor),
            Slot::Failed { .. } => None,
        })
    }
}
