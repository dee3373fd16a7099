//! C-compatible status codes.
//!
//! Loaders and interpreters written against a C ABI see a status as a `u32`
//! code plus a message. Code `0` is success; each [`StatusKind`] has a fixed
//! non-zero code that never changes between releases.

use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::{Result, Status, StatusKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::FromRepr, strum::EnumIter)]
#[repr(u32)]
pub enum StatusCode {
    Success = 0,
    InvalidArgument = 1,
    OutOfMemory = 2,
    DeviceError = 3,
    InternalError = 4,
    Unimplemented = 5,
}

impl StatusCode {
    pub const fn kind(self) -> Option<StatusKind> {
        match self {
            Self::Success => None,
            Self::InvalidArgument => Some(StatusKind::InvalidArgument),
            Self::OutOfMemory => Some(StatusKind::OutOfMemory),
            Self::DeviceError => Some(StatusKind::DeviceError),
            Self::InternalError => Some(StatusKind::InternalError),
            Self::Unimplemented => Some(StatusKind::Unimplemented),
        }
    }

    pub const fn as_raw(self) -> u32 {
        self as u32
    }
}

impl From<StatusKind> for StatusCode {
    fn from(kind: StatusKind) -> Self {
        match kind {
            StatusKind::InvalidArgument => Self::InvalidArgument,
            StatusKind::OutOfMemory => Self::OutOfMemory,
            StatusKind::DeviceError => Self::DeviceError,
            StatusKind::InternalError => Self::InternalError,
            StatusKind::Unimplemented => Self::Unimplemented,
        }
    }
}

impl Status {
    pub fn code(&self) -> StatusCode {
        self.kind().into()
    }

    /// Rebuild an outcome from a raw code and message received over a native
    /// boundary. Unknown codes become `InternalError`.
    pub fn from_code(raw: u32, message: impl Into<String>) -> Result<()> {
        match StatusCode::from_repr(raw) {
            Some(StatusCode::Success) => Ok(()),
            Some(code) => match code.kind() {
                Some(kind) => Err(Status::new(kind, message)),
                None => Ok(()),
            },
            None => Err(Status::internal(format!("unknown status code {raw}: {}", message.into()))),
        }
    }
}

/// Code of an outcome: `Success` for `Ok`, the failure's code otherwise.
pub fn code_of<T>(result: &Result<T>) -> StatusCode {
    match result {
        Ok(_) => StatusCode::Success,
        Err(status) => status.code(),
    }
}

/// Run `f`, turning a panic into an `InternalError` status so that no unwind
/// crosses the native boundary.
pub fn boundary<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            tracing::error!(panic.reason = %reason, "panic caught at status boundary");
            Err(Status::internal(format!("panic: {reason}")))
        }
    }
}
