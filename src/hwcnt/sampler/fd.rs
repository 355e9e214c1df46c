use std::os::fd::RawFd;

use crate::ffi::Syscall;

/// Owner of a reader descriptor, closed on drop.
pub(crate) struct FdGuard<S: Syscall> {
    fd: RawFd,
    sys: S,
}

impl<S: Syscall> FdGuard<S> {
    pub fn new(sys: S, fd: RawFd) -> Self {
        Self { fd, sys }
    }

    pub fn raw(&self) -> RawFd {
        self.fd
    }
}

impl<S: Syscall> Drop for FdGuard<S> {
    fn drop(&mut self) {
        if let Err(e) = self.sys.close(self.fd) {
            log::warn!("Failed to close reader descriptor {}: {}", self.fd, e);
        }
    }
}
