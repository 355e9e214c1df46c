use std::io::Result;
use std::os::fd::RawFd;
use std::ptr::NonNull;
use std::slice;

use crate::ffi::Syscall;

/// Read-only private mapping of a reader's ring buffer.
pub(crate) struct MappedMemory<S: Syscall> {
    ptr: NonNull<u8>,
    len: usize,
    sys: S,
}

impl<S: Syscall> MappedMemory<S> {
    pub fn new(sys: S, fd: RawFd, len: usize) -> Result<Self> {
        let prot = libc::PROT_READ;
        let flags = libc::MAP_PRIVATE;
        let ptr = sys.mmap(len, prot, flags, fd, 0)?;
        log::debug!("Mapped {} bytes of reader descriptor {}", len, fd);
        Ok(Self { ptr, len, sys })
    }

    // The driver only writes slots that are not checked out.
    pub fn as_slice(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<S: Syscall> Drop for MappedMemory<S> {
    fn drop(&mut self) {
        if let Err(e) = unsafe { self.sys.munmap(self.ptr, self.len) } {
            log::warn!("Failed to unmap {} bytes of ring buffer: {}", self.len, e);
        }
    }
}
