use std::io::ErrorKind;
use std::path::PathBuf;

use super::Handle;
use crate::ffi::mock::{Call, MockSys};

#[test]
fn test_open_owns_descriptor() {
    let sys = MockSys::new();
    sys.set_open_fd(7);
    let handle = Handle::open_with(&sys, "/dev/mali0").unwrap();
    assert_eq!(handle.fd(), 7);
    drop(handle);
    assert_eq!(
        sys.calls(),
        vec![Call::Open(PathBuf::from("/dev/mali0")), Call::Close(7)]
    );
}

#[test]
fn test_open_failure() {
    let sys = MockSys::new();
    sys.fail_open(libc::ENOENT);
    let e = Handle::open_with(&sys, "/dev/mali0").err().unwrap();
    assert_eq!(e.kind(), ErrorKind::NotFound);
    assert!(sys.closed().is_empty());

    sys.fail_open(libc::EACCES);
    let e = Handle::open_with(&sys, "/dev/mali0").err().unwrap();
    assert_eq!(e.kind(), ErrorKind::PermissionDenied);
}

#[test]
fn test_open_rejects_regular_file() {
    let sys = MockSys::new();
    sys.set_open_fd(9);
    sys.set_char_device(false);
    let e = Handle::open_with(&sys, "/tmp/file").err().unwrap();
    assert_eq!(e.kind(), ErrorKind::InvalidInput);
    assert_eq!(sys.closed(), vec![9]);
}

#[test]
fn test_external_descriptor_is_not_closed() {
    let sys = MockSys::new();
    let handle = Handle::from_external_fd_with(&sys, 5);
    assert_eq!(handle.fd(), 5);
    drop(handle);
    assert!(sys.calls().is_empty());
}

#[test]
fn test_close_failure_is_swallowed() {
    let sys = MockSys::new();
    sys.fail_close(libc::EIO);
    let handle = Handle::open_with(&sys, "/dev/mali0").unwrap();
    drop(handle);
    assert_eq!(sys.closed(), vec![42]);
}
