//! Device enumeration backends.

use crate::error::{DeviceQuerySnafu, Result};
use crate::info::{DeviceDescriptor, DeviceKind};

/// Fallback host memory size when nothing better is known (8 GiB).
pub const DEFAULT_HOST_MEMORY: usize = 8 << 30;

/// Source of device descriptors.
pub trait DeviceSource {
    fn name(&self) -> &str;

    fn device_count(&self) -> Result<usize>;

    fn query(&self, id: usize) -> Result<DeviceDescriptor>;
}

/// The host as a single device.
#[derive(Debug, Clone)]
pub struct HostSource {
    total_memory: usize,
}

impl HostSource {
    pub fn new(total_memory: usize) -> Self {
        Self { total_memory }
    }

    /// Host memory size from the environment.
    ///
    /// # Environment Variables
    ///
    /// * `STRATUM_HOST_MEMORY_BYTES=N` - Use N bytes as the host capacity
    ///
    /// Otherwise `MemTotal` from `/proc/meminfo` is used, falling back to
    /// [`DEFAULT_HOST_MEMORY`].
    pub fn from_env() -> Self {
        if let Ok(value) = std::env::var("STRATUM_HOST_MEMORY_BYTES")
            && let Ok(bytes) = value.parse::<usize>()
        {
            return Self::new(bytes);
        }
        Self::new(meminfo_total().unwrap_or(DEFAULT_HOST_MEMORY))
    }
}

fn meminfo_total() -> Option<usize> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    let line = meminfo.lines().find(|line| line.starts_with("MemTotal:"))?;
    let kib: usize = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kib * 1024)
}

impl DeviceSource for HostSource {
    fn name(&self) -> &str {
        "host"
    }

    fn device_count(&self) -> Result<usize> {
        Ok(1)
    }

    fn query(&self, id: usize) -> Result<DeviceDescriptor> {
        snafu::ensure!(id == 0, DeviceQuerySnafu { id, reason: "host source exposes a single device" });
        Ok(DeviceDescriptor::builder()
            .id(0)
            .name("host")
            .kind(DeviceKind::Host)
            .total_memory(self.total_memory)
            .build())
    }
}

/// Fixed set of devices, some of which may fail to answer queries.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    devices: Vec<std::result::Result<DeviceDescriptor, String>>,
}

impl StaticSource {
    pub fn new(devices: impl IntoIterator<Item = DeviceDescriptor>) -> Self {
        Self { devices: devices.into_iter().map(Ok).collect() }
    }

    /// Append a device that is enumerated but fails every query.
    pub fn with_failing(mut self, reason: impl Into<String>) -> Self {
        self.devices.push(Err(reason.into()));
        self
    }
}

impl DeviceSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    fn device_count(&self) -> Result<usize> {
        Ok(self.devices.len())
    }

    fn query(&self, id: usize) -> Result<DeviceDescriptor> {
        match self.devices.get(id) {
            Some(Ok(descriptor)) => Ok(descriptor.clone()),
            Some(Err(reason)) => DeviceQuerySnafu { id, reason: reason.clone() }.fail(),
            None => DeviceQuerySnafu { id, reason: "not enumerated" }.fail(),
        }
    }
}

/// CUDA devices visible to the driver.
#[cfg(feature = "cuda")]
#[derive(Debug, Clone, Default)]
pub struct CudaSource;

#[cfg(feature = "cuda")]
impl DeviceSource for CudaSource {
    fn name(&self) -> &str {
        "cuda"
    }

    fn device_count(&self) -> Result<usize> {
        use snafu::ResultExt;

        let count = cudarc::driver::CudaContext::device_count().context(crate::error::CudaSnafu)?;
        Ok(count.max(0) as usize)
    }

    fn query(&self, id: usize) -> Result<DeviceDescriptor> {
        use cudarc::driver::sys::CUdevice_attribute as Attr;

        use crate::info::ComputeCapability;

        let query_failed = |error: cudarc::driver::DriverError| DeviceQuerySnafu { id, reason: error.to_string() }.build();

        let context = cudarc::driver::CudaContext::new(id).map_err(query_failed)?;
        let attribute = |attr: Attr| context.attribute(attr).map(|v| v.max(0) as u32).map_err(query_failed);

        context.bind_to_thread().map_err(query_failed)?;
        let (_free, total) = cudarc::driver::result::mem_get_info().map_err(query_failed)?;

        Ok(DeviceDescriptor::builder()
            .id(id)
            .name(context.name().map_err(query_failed)?)
            .kind(DeviceKind::Cuda)
            .total_memory(total)
            .compute_capability(ComputeCapability::new(
                attribute(Attr::CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MAJOR)?,
                attribute(Attr::CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MINOR)?,
            ))
            .multiprocessor_count(attribute(Attr::CU_DEVICE_ATTRIBUTE_MULTIPROCESSOR_COUNT)?)
            .max_threads_per_block(attribute(Attr::CU_DEVICE_ATTRIBUTE_MAX_THREADS_PER_BLOCK)?)
            .warp_size(attribute(Attr::CU_DEVICE_ATTRIBUTE_WARP_SIZE)?)
            .max_shared_memory_per_block(attribute(Attr::CU_DEVICE_ATTRIBUTE_MAX_SHARED_MEMORY_PER_BLOCK)? as usize)
            .max_concurrent_kernels(if attribute(Attr::CU_DEVICE_ATTRIBUTE_CONCURRENT_KERNELS)? != 0 { 128 } else { 1 })
            .build())
    }
}
