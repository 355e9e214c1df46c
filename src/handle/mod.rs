use std::io::{Error, ErrorKind, Result};
use std::os::fd::{AsRawFd, RawFd};
use std::path::Path;

use crate::ffi::{Sys, Syscall};

#[cfg(test)]
mod test;

/// Descriptor of a kbase device node.
///
/// An opened handle owns its descriptor and closes it on drop, a handle
/// wrapping an external descriptor never closes it.
pub struct Handle<S: Syscall = Sys> {
    fd: RawFd,
    owned: bool,
    sys: S,
}

impl Handle {
    /// Opens the device node at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(Sys, path)
    }

    /// Opens `/dev/mali{instance}`.
    pub fn create(instance: u32) -> Result<Self> {
        Self::open(format!("/dev/mali{}", instance))
    }

    pub fn from_external_fd(fd: RawFd) -> Self {
        Self::from_external_fd_with(Sys, fd)
    }
}

impl<S: Syscall> Handle<S> {
    pub fn open_with<P: AsRef<Path>>(sys: S, path: P) -> Result<Self> {
        let fd = sys.open(path.as_ref())?;
        // Take ownership first so the descriptor is released on any failure below.
        let handle = Self {
            fd,
            owned: true,
            sys,
        };
        if !handle.sys.is_char_device(fd)? {
            return Err(Error::new(ErrorKind::InvalidInput, "not a character device"));
        }
        Ok(handle)
    }

    pub fn from_external_fd_with(sys: S, fd: RawFd) -> Self {
        Self {
            fd,
            owned: false,
            sys,
        }
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub(crate) fn sys(&self) -> &S {
        &self.sys
    }
}

impl<S: Syscall> AsRawFd for Handle<S> {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl<S: Syscall> Drop for Handle<S> {
    fn drop(&mut self) {
        if !self.owned {
            return;
        }
        if let Err(e) = self.sys.close(self.fd) {
            log::warn!("Failed to close device descriptor {}: {}", self.fd, e);
        }
    }
}
