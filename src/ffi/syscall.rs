use std::fs::OpenOptions;
use std::io::{Error, Result};
use std::os::fd::{IntoRawFd, RawFd};
use std::path::Path;
use std::ptr::{null_mut, NonNull};

/// System calls the sampler issues against the kbase driver.
///
/// Everything that touches the kernel goes through this trait so the
/// negotiation and sampling logic can be driven by a scripted implementation.
/// Implementations are cheap handles: every resource owner (device handle,
/// descriptor guard, mapping) keeps its own clone.
pub trait Syscall: Clone {
    /// Opens `path` read-only and returns the raw descriptor.
    fn open(&self, path: &Path) -> Result<RawFd>;

    fn is_char_device(&self, fd: RawFd) -> Result<bool>;

    fn close(&self, fd: RawFd) -> Result<()>;

    /// `ioctl` with an integer argument passed by value.
    fn ioctl_arg(&self, fd: RawFd, op: u64, arg: u64) -> Result<i32>;

    /// `ioctl` with a pointer to `argp`, which holds the encoded argument
    /// structure on entry and the kernel's reply on return.
    fn ioctl_argp(&self, fd: RawFd, op: u64, argp: &mut [u8]) -> Result<i32>;

    fn mmap(&self, len: usize, prot: i32, flags: i32, fd: RawFd, offset: i64) -> Result<NonNull<u8>>;

    /// # Safety
    ///
    /// `ptr` and `len` must describe a mapping returned by [`Syscall::mmap`]
    /// that is no longer referenced.
    unsafe fn munmap(&self, ptr: NonNull<u8>, len: usize) -> Result<()>;

    /// Polls a single descriptor, returns the number of ready descriptors.
    fn poll(&self, fd: RawFd, events: i16, timeout: i32) -> Result<usize>;

    /// Reads `clock` in nanoseconds.
    fn clock_gettime(&self, clock: libc::clockid_t) -> Result<u64>;
}

/// The host's system calls.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sys;

impl Syscall for Sys {
    fn open(&self, path: &Path) -> Result<RawFd> {
        let file = OpenOptions::new().read(true).open(path)?;
        Ok(file.into_raw_fd())
    }

    fn is_char_device(&self, fd: RawFd) -> Result<bool> {
        let mut stat = unsafe { std::mem::zeroed::<libc::stat>() };
        let result = unsafe { libc::fstat(fd, &mut stat) };
        if result != -1 {
            Ok(stat.st_mode & libc::S_IFMT == libc::S_IFCHR)
        } else {
            Err(Error::last_os_error())
        }
    }

    fn close(&self, fd: RawFd) -> Result<()> {
        let result = unsafe { libc::close(fd) };
        if result != -1 {
            Ok(())
        } else {
            Err(Error::last_os_error())
        }
    }

    fn ioctl_arg(&self, fd: RawFd, op: u64, arg: u64) -> Result<i32> {
        let result = unsafe { libc::ioctl(fd, op as _, arg) };
        if result != -1 {
            Ok(result)
        } else {
            Err(Error::last_os_error())
        }
    }

    fn ioctl_argp(&self, fd: RawFd, op: u64, argp: &mut [u8]) -> Result<i32> {
        let result = unsafe { libc::ioctl(fd, op as _, argp.as_mut_ptr()) };
        if result != -1 {
            Ok(result)
        } else {
            Err(Error::last_os_error())
        }
    }

    fn mmap(&self, len: usize, prot: i32, flags: i32, fd: RawFd, offset: i64) -> Result<NonNull<u8>> {
        let ptr = unsafe { libc::mmap(null_mut(), len, prot, flags, fd, offset as _) };
        if ptr != libc::MAP_FAILED {
            NonNull::new(ptr.cast()).ok_or_else(|| Error::from_raw_os_error(libc::EFAULT))
        } else {
            Err(Error::last_os_error())
        }
    }

    unsafe fn munmap(&self, ptr: NonNull<u8>, len: usize) -> Result<()> {
        let result = libc::munmap(ptr.as_ptr().cast(), len);
        if result != -1 {
            Ok(())
        } else {
            Err(Error::last_os_error())
        }
    }

    fn poll(&self, fd: RawFd, events: i16, timeout: i32) -> Result<usize> {
        let mut fds = libc::pollfd {
            fd,
            events,
            revents: 0,
        };
        let result = unsafe { libc::poll(&mut fds, 1, timeout) };
        if result != -1 {
            Ok(result as _)
        } else {
            Err(Error::last_os_error())
        }
    }

    fn clock_gettime(&self, clock: libc::clockid_t) -> Result<u64> {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        let result = unsafe { libc::clock_gettime(clock, &mut ts) };
        if result != -1 {
            Ok(ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64)
        } else {
            Err(Error::last_os_error())
        }
    }
}
