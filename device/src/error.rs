use snafu::Snafu;
use stratum_status::{Status, StatusKind};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Alignment is not a power of two or exceeds the device maximum.
    #[snafu(display("invalid alignment {alignment}: must be a power of two no greater than {max}"))]
    InvalidAlignment { alignment: usize, max: usize },

    #[snafu(display("zero-sized allocation requested"))]
    ZeroSize,

    /// Request exceeds the capacity the device currently has available.
    #[snafu(display("out of memory on {device}: requested {requested} bytes, {available} available"))]
    OutOfMemory { device: String, requested: usize, available: usize },

    /// Backend could not produce the memory (driver or host allocator failure).
    #[snafu(display("{backend} allocation of {size} bytes failed: {reason}"))]
    BackendAllocation { backend: String, size: usize, reason: String },

    /// Device id outside the enumerated range.
    #[snafu(display("unknown device {id}: {count} device(s) enumerated"))]
    UnknownDevice { id: usize, count: usize },

    /// Device was enumerated but could not be queried at startup.
    #[snafu(display("device {id} could not be queried: {reason}"))]
    DeviceQuery { id: usize, reason: String },

    #[snafu(display("device enumeration failed: {reason}"))]
    Enumeration { reason: String },

    /// No allocator backend is compiled in for this kind of device.
    #[snafu(display("no allocator backend for {kind} devices"))]
    BackendUnavailable { kind: String },

    /// The frame was never entered or has already been dropped.
    #[snafu(display("stack frame {frame} is not active"))]
    InactiveFrame { frame: u64 },

    #[snafu(display("allocation {id} is not live"))]
    UnknownAllocation { id: u64 },

    /// Global allocations live until their module is released.
    #[snafu(display("allocation {id} belongs to module '{module}' and is released with the module"))]
    GlobalRelease { id: u64, module: String },

    #[cfg(feature = "cuda")]
    /// CUDA-specific errors.
    #[snafu(display("CUDA error: {source}"))]
    Cuda { source: cudarc::driver::DriverError },
}

impl Error {
    pub fn kind(&self) -> StatusKind {
        match self {
            Self::InvalidAlignment { .. }
            | Self::ZeroSize
            | Self::UnknownDevice { .. }
            | Self::UnknownAllocation { .. }
            | Self::InactiveFrame { .. }
            | Self::GlobalRelease { .. } => StatusKind::InvalidArgument,
            Self::OutOfMemory { .. } | Self::BackendAllocation { .. } => StatusKind::OutOfMemory,
            Self::DeviceQuery { .. } | Self::Enumeration { .. } => StatusKind::DeviceError,
            Self::BackendUnavailable { .. } => StatusKind::Unimplemented,
            #[cfg(feature = "cuda")]
            Self::Cuda { .. } => StatusKind::DeviceError,
        }
    }
}

impl From<Error> for Status {
    fn from(error: Error) -> Self {
        Status::new(error.kind(), error.to_string())
    }
}
