use std::io::{Error, ErrorKind, Result};
use std::os::fd::RawFd;

use crate::ffi::Syscall;

/// Blocks until `fd` is readable.
pub fn wait_for_sample<S: Syscall>(sys: &S, fd: RawFd) -> Result<()> {
    match sys.poll(fd, libc::POLLIN, -1)? {
        0 => Err(Error::from(ErrorKind::TimedOut)),
        _ => Ok(()),
    }
}

/// Returns whether `fd` is readable right now.
pub fn check_ready_read<S: Syscall>(sys: &S, fd: RawFd) -> Result<bool> {
    Ok(sys.poll(fd, libc::POLLIN, 0)? > 0)
}
