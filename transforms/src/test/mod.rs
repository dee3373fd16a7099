
use std::sync::Arc;

use stratum_device::{AllocatorService, ComputeCapability, CpuAllocator, DeviceDescriptor, DeviceKind};
use stratum_ir::Module;
use stratum_status::Status;

use crate::{BuiltinRegistry, Pass, PassContext, Pipeline, PipelineOptions};

pub fn host(total_memory: usize) -> DeviceDescriptor {
    DeviceDescriptor::builder().id(0).name("host").kind(DeviceKind::Host).total_memory(total_memory).build()
}

pub fn cuda(major: u32, minor: u32) -> DeviceDescriptor {
    DeviceDescriptor::builder()
        .id(0)
        .name("gpu0")
        .kind(DeviceKind::Cuda)
        .total_memory(1 << 30)
        .compute_capability(ComputeCapability::new(major, minor))
        .build()
}

/// Owns everything a [`PassContext`] borrows.
pub struct Harness {
    pub allocator: AllocatorService,
    pub builtins: BuiltinRegistry,
    pub options: PipelineOptions,
}

impl Harness {
    /// Host-memory backed harness for `device`, verifying after every pass.
    pub fn new(device: DeviceDescriptor) -> Self {
        Self {
            allocator: AllocatorService::with_backend(Arc::new(device), Box::new(CpuAllocator)),
            builtins: BuiltinRegistry::standard(),
            options: PipelineOptions::builder().verify_each_pass(true).build(),
        }
    }

    pub fn host() -> Self {
        Self::new(host(1 << 20))
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn ctx(&self) -> PassContext<'_> {
        PassContext::new(&self.allocator, &self.builtins, &self.options)
    }

    pub fn apply(&self, pass: &dyn Pass, module: &mut Module) -> Result<(), Status> {
        pass.run(module, &self.ctx())
    }

    pub fn run(&self, passes: Vec<Box<dyn Pass>>, module: Module) -> Result<Module, Status> {
        Pipeline::from_passes(self.ctx(), passes).run(module)
    }

    pub fn run_all(&self, module: Module) -> Result<Module, Status> {
        Pipeline::new(self.ctx()).run(module)
    }
}
