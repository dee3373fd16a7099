use test_case::test_case;

use crate::{Result, Status, StatusContext, StatusKind};

#[test_case(Status::invalid_argument("x"), StatusKind::InvalidArgument; "invalid_argument")]
#[test_case(Status::out_of_memory("x"), StatusKind::OutOfMemory; "out_of_memory")]
#[test_case(Status::device_error("x"), StatusKind::DeviceError; "device_error")]
#[test_case(Status::internal("x"), StatusKind::InternalError; "internal")]
#[test_case(Status::unimplemented("x"), StatusKind::Unimplemented; "unimplemented")]
fn test_constructors(status: Status, kind: StatusKind) {
    assert_eq!(status.kind(), kind);
    assert!(status.is(kind));
    assert_eq!(status.message(), "x");
}

#[test]
fn test_display() {
    let status = Status::out_of_memory("requested 8192 bytes, 4096 available");
    assert_eq!(status.to_string(), "OutOfMemory: requested 8192 bytes, 4096 available");
}

#[test]
fn test_wrap_keeps_kind() {
    let status = Status::internal("global 'f.alloc0' is not declared").wrap("pass 'lower-globals'");
    assert_eq!(status.kind(), StatusKind::InternalError);
    assert_eq!(status.message(), "pass 'lower-globals': global 'f.alloc0' is not declared");
}

#[test]
fn test_status_context() {
    fn inner() -> Result<()> {
        Err(Status::unimplemented("no builtin for rem on f32"))
    }

    let err = inner().status_context(|| "function 'main'").unwrap_err();
    assert_eq!(err.kind(), StatusKind::Unimplemented);
    assert!(err.message().starts_with("function 'main': "));

    let ok: Result<u32> = Ok(3);
    assert_eq!(ok.status_context(|| "unused").unwrap(), 3);
}

#[test]
fn test_kind_classification() {
    assert!(StatusKind::InternalError.is_defect());
    assert!(!StatusKind::Unimplemented.is_defect());
    assert!(StatusKind::OutOfMemory.is_recoverable());
    assert!(!StatusKind::DeviceError.is_recoverable());
}
