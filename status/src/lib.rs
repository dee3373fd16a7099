//! Status model for stratum.
//!
//! Every fallible public entry point of the pipeline and the runtime services
//! returns [`Result<T, Status>`](Result). A [`Status`] is a failure with a
//! [`StatusKind`] and a human-readable message; success is plain `Ok`.
//!
//! Crates keep their own precise `snafu` error enums internally and convert
//! them into `Status` at their public boundary. A component that receives a
//! failed status either propagates it unchanged or wraps it with
//! [`Status::wrap`] / [`StatusContext::status_context`], which keep the kind.
//!
//! [`code`] maps kinds to C-compatible integer codes for callers on the other
//! side of a native boundary.

pub mod code;


use std::fmt::Display;

use snafu::Snafu;

pub use code::{StatusCode, boundary, code_of};

pub type Result<T, E = Status> = std::result::Result<T, E>;

/// Category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::Display, strum::EnumIter, strum::VariantArray)]
pub enum StatusKind {
    /// Caller contract violation. Surfaced to the caller as-is.
    InvalidArgument,
    /// Resource exhaustion. The caller may retry with a smaller request.
    OutOfMemory,
    /// Device query or device allocation failure. Fatal for the current run.
    DeviceError,
    /// Pipeline-ordering or invariant violation, i.e. a defect.
    InternalError,
    /// A legitimate input pattern that is not supported yet.
    Unimplemented,
}

impl StatusKind {
    /// Whether this kind indicates a bug rather than bad input or resources.
    pub const fn is_defect(&self) -> bool {
        matches!(self, Self::InternalError)
    }

    /// Whether a caller may retry with a different request.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::OutOfMemory)
    }
}

/// A failed operation outcome.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(display("{kind}: {message}"))]
pub struct Status {
    kind: StatusKind,
    message: String,
}

impl Status {
    pub fn new(kind: StatusKind, message: impl Into<String>) -> Self {
        StatusSnafu { kind, message }.build()
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StatusKind::InvalidArgument, message)
    }

    pub fn out_of_memory(message: impl Into<String>) -> Self {
        Self::new(StatusKind::OutOfMemory, message)
    }

    pub fn device_error(message: impl Into<String>) -> Self {
        Self::new(StatusKind::DeviceError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusKind::InternalError, message)
    }

    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(StatusKind::Unimplemented, message)
    }

    pub fn kind(&self) -> StatusKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is(&self, kind: StatusKind) -> bool {
        self.kind == kind
    }

    /// Prefix the message with `context`, keeping the kind.
    pub fn wrap(self, context: impl Display) -> Self {
        Self { kind: self.kind, message: format!("{context}: {}", self.message) }
    }
}

/// Context wrapping for status results.
pub trait StatusContext<T> {
    fn status_context<C, F>(self, context: F) -> Result<T>
    where
        C: Display,
        F: FnOnce() -> C;
}

impl<T, E> StatusContext<T> for std::result::Result<T, E>
where
    E: Into<Status>,
{
    fn status_context<C, F>(self, context: F) -> Result<T>
    where
        C: Display,
        F: FnOnce() -> C,
    {
        self.map_err(|error| error.into().wrap(context()))
    }
}
