use stratum_device::{AllocatorService, DeviceDescriptor};

use crate::builtins::BuiltinRegistry;
use crate::config::PipelineOptions;

/// Everything a pass may consult besides the module itself.
///
/// Built once by the host and shared by every pass of a run.
#[derive(Debug, Clone, Copy)]
pub struct PassContext<'a> {
    /// Target device of the module.
    pub device: &'a DeviceDescriptor,
    pub allocator: &'a AllocatorService,
    pub builtins: &'a BuiltinRegistry,
    pub options: &'a PipelineOptions,
}

impl<'a> PassContext<'a> {
    /// Context targeting the allocator's device.
    pub fn new(allocator: &'a AllocatorService, builtins: &'a BuiltinRegistry, options: &'a PipelineOptions) -> Self {
        Self { device: allocator.device(), allocator, builtins, options }
    }
}
