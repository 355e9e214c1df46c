//! Kernel ABI of the kbase driver and of its two counter reader interfaces.
//!
//! Command numbers are built with the `nix` request code macros, which
//! follow the generic Linux `_IOC` encoding.

use std::io::Result;
use std::os::fd::RawFd;

use nix::sys::ioctl::ioctl_num_type;

use super::{Syscall, Wire};

pub mod kbase;
pub mod kbase_pre_r21;
pub mod kinstr_prfcnt;
pub mod vinstr;

#[cfg(test)]
mod test;

/// Widens a request code built by the `nix` request code macros.
///
/// Codes fit in 32 bits, the libc request type is signed on some targets.
pub const fn request(code: ioctl_num_type) -> u64 {
    code as u32 as u64
}

// Largest argument structure exchanged through `ioctl_wire`, the pre-r21 GPU properties.
const MAX_ARG_SIZE: usize = kbase_pre_r21::UkGpuprops::SIZE;

/// Encodes `arg`, issues the command and decodes the kernel's reply back into `arg`.
pub fn ioctl_wire<S, T>(sys: &S, fd: RawFd, op: u64, arg: &mut T) -> Result<i32>
where
    S: Syscall,
    T: Wire,
{
    let mut buf = [0; MAX_ARG_SIZE];
    let buf = &mut buf[..T::SIZE];
    arg.encode(buf);
    let result = sys.ioctl_argp(fd, op, buf)?;
    *arg = T::decode(buf);
    Ok(result)
}

/// Reads a `u32` the kernel writes through the argument pointer.
pub fn ioctl_u32<S: Syscall>(sys: &S, fd: RawFd, op: u64) -> Result<u32> {
    let mut buf = [0; 4];
    sys.ioctl_argp(fd, op, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}
