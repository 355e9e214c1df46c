//! Device probing.
//!
//! An [`Instance`] identifies the driver interface behind a [`Handle`], reads
//! the GPU constants and picks the counter backend samplers are built on.

use std::io::{Error, ErrorKind, Result};
use std::os::fd::RawFd;

use crate::ffi::ioctl::ioctl_wire;
use crate::ffi::ioctl::kbase::{self, SetFlags, VersionCheck};
use crate::ffi::ioctl::kbase_pre_r21::{self, SetFlagsArgs, VersionCheckArgs};
use crate::ffi::{Sys, Syscall};
use crate::handle::Handle;
use crate::hwcnt::sampler::kinstr_prfcnt::{parse_enum_info, EnumInfo};
use crate::hwcnt::sampler::{Configuration, ManualSampler};
use crate::hwcnt::{compute_block_extents, discover, select};
use crate::hwcnt::{BackendType, BlockExtents, BlockType, Sample};
use crate::product::ProductId;
use crate::version::{IoctlIfaceType, KbaseVersion};

mod props;

#[cfg(test)]
mod test;

pub use props::warp_width;

// Disables job submission on the context, it is only used for monitoring.
const SYSTEM_MONITOR_FLAG: u32 = 1 << 1;

const LEGACY_MIN_VERSION: KbaseVersion = KbaseVersion::new(10, 2, IoctlIfaceType::JmPreR21);

/// GPU parameters read once when the instance is created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Constants {
    /// Raw `GPU_ID` register.
    pub gpu_id: u64,
    /// CSF firmware interface version, zero on job manager GPUs.
    pub fw_version: u64,
    /// AXI bus width in bits.
    pub axi_bus_width: u64,
    pub num_l2_slices: u32,
    /// L2 slice size in bytes.
    pub l2_slice_size: u64,
    pub shader_core_mask: u64,
    pub num_shader_cores: u32,
    /// Tile size in pixels.
    pub tile_size: u32,
    pub warp_width: u32,
}

/// A probed kbase device.
pub struct Instance<'h, S: Syscall = Sys> {
    handle: &'h Handle<S>,
    version: KbaseVersion,
    constants: Constants,
    extents: BlockExtents,
    backend_type: BackendType,
    enum_info: Option<EnumInfo>,
}

fn is_version_set(major: u16, minor: u16) -> bool {
    major != 0 || minor != 0
}

fn version_check_pre_r21<S: Syscall>(sys: &S, fd: RawFd) -> Option<KbaseVersion> {
    let mut args = VersionCheckArgs::default();
    // Drivers of other generations reject the call, the reply stays zeroed.
    let _ = ioctl_wire(sys, fd, kbase_pre_r21::VERSION_CHECK, &mut args);
    if !is_version_set(args.major, args.minor) {
        return None;
    }

    let version = KbaseVersion::new(args.major, args.minor, IoctlIfaceType::JmPreR21);
    if version < LEGACY_MIN_VERSION {
        log::debug!("Legacy kbase {}.{} is too old", args.major, args.minor);
        return None;
    }
    Some(version)
}

fn version_check_post_r21<S: Syscall>(sys: &S, fd: RawFd, ty: IoctlIfaceType) -> Option<KbaseVersion> {
    let op = match ty {
        IoctlIfaceType::Csf => kbase::VERSION_CHECK_CSF,
        _ => kbase::VERSION_CHECK_JM,
    };
    let mut args = VersionCheck::default();
    let _ = ioctl_wire(sys, fd, op, &mut args);
    is_version_set(args.major, args.minor).then(|| KbaseVersion::new(args.major, args.minor, ty))
}

/// Detects the ioctl interface generation and the driver version.
pub(crate) fn version_check<S: Syscall>(sys: &S, fd: RawFd) -> Result<KbaseVersion> {
    version_check_pre_r21(sys, fd)
        .or_else(|| version_check_post_r21(sys, fd, IoctlIfaceType::JmPostR21))
        .or_else(|| version_check_post_r21(sys, fd, IoctlIfaceType::Csf))
        .ok_or_else(|| Error::new(ErrorKind::Unsupported, "unknown kbase interface"))
}

/// Marks the context as a system monitor.
pub(crate) fn set_flags<S: Syscall>(sys: &S, fd: RawFd, version: &KbaseVersion) -> Result<()> {
    let result = if version.is_pre_r21() {
        let mut args = SetFlagsArgs {
            create_flags: SYSTEM_MONITOR_FLAG,
        };
        ioctl_wire(sys, fd, kbase_pre_r21::SET_FLAGS, &mut args)
    } else {
        let mut args = SetFlags {
            create_flags: SYSTEM_MONITOR_FLAG,
        };
        ioctl_wire(sys, fd, kbase::SET_FLAGS, &mut args)
    };

    let Err(e) = result else {
        return Ok(());
    };
    match e.raw_os_error() {
        // The context may already be set up.
        Some(libc::EPERM) | Some(libc::EINVAL) => {}
        // Old kernels report a misleading error.
        Some(libc::EFAULT) if version.is_pre_r21() => {}
        _ => return Err(e),
    }
    log::debug!("Ignoring set_flags failure: {}", e);
    Ok(())
}

impl<'h, S: Syscall> Instance<'h, S> {
    /// Probes the device behind `handle`.
    pub fn new(handle: &'h Handle<S>) -> Result<Self> {
        let sys = handle.sys();
        let fd = handle.fd();

        let version = version_check(sys, fd)?;
        log::debug!(
            "Detected kbase {}.{} ({:?})",
            version.major(),
            version.minor(),
            version.ty()
        );

        set_flags(sys, fd, &version)?;
        let constants = props::read_constants(sys, fd, &version)?;

        let product = ProductId::from_raw_gpu_id(constants.gpu_id);
        let backend_type = select(discover(&version, product))?;
        log::debug!("Using {} backend", backend_type.name());

        let enum_info = match backend_type.is_vinstr() {
            true => None,
            false => Some(parse_enum_info(sys, fd)?),
        };

        let mut instance = Self::with_extents(handle, version, constants, backend_type, enum_info);
        instance.fixup()?;
        Ok(instance)
    }

    fn with_extents(
        handle: &'h Handle<S>,
        version: KbaseVersion,
        constants: Constants,
        backend_type: BackendType,
        enum_info: Option<EnumInfo>,
    ) -> Self {
        let extents = match &enum_info {
            Some(ei) => ei.block_extents(),
            None => compute_block_extents(
                ProductId::from_raw_gpu_id(constants.gpu_id),
                constants.num_l2_slices,
                constants.num_shader_cores,
            ),
        };
        Self {
            handle,
            version,
            constants,
            extents,
            backend_type,
            enum_info,
        }
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        handle: &'h Handle<S>,
        version: KbaseVersion,
        constants: Constants,
        backend_type: BackendType,
        enum_info: Option<EnumInfo>,
    ) -> Self {
        Self::with_extents(handle, version, constants, backend_type, enum_info)
    }

    // Some drivers fail to read samples once shader cores are sparse. Those
    // need the core index remap.
    fn fixup(&mut self) -> Result<()> {
        if self.backend_type != BackendType::KinstrPrfcnt {
            return Ok(());
        }
        let Some(ei) = self.enum_info else {
            return Ok(());
        };

        let config = Configuration::new(BlockType::Core, ei.set, 0b1111);
        let mut sampler = ManualSampler::new(self, &[config])?;
        sampler.accumulation_start(0)?;
        // Stopping takes an implicit sample.
        sampler.accumulation_stop(0)?;

        let broken = match Sample::new(sampler.reader()) {
            Ok(_) => false,
            Err(e) => {
                log::debug!("Test sample failed: {}", e);
                true
            }
        };
        drop(sampler);

        if broken {
            self.backend_type = BackendType::KinstrPrfcntWa;
            log::debug!("Falling back to {} backend", self.backend_type.name());
        }
        Ok(())
    }

    pub fn fd(&self) -> RawFd {
        self.handle.fd()
    }

    pub(crate) fn sys(&self) -> &S {
        self.handle.sys()
    }

    pub fn version(&self) -> KbaseVersion {
        self.version
    }

    pub fn constants(&self) -> &Constants {
        &self.constants
    }

    pub fn product_id(&self) -> ProductId {
        ProductId::from_raw_gpu_id(self.constants.gpu_id)
    }

    /// Blocks of every type the hardware has.
    pub fn block_extents(&self) -> &BlockExtents {
        &self.extents
    }

    pub fn backend_type(&self) -> BackendType {
        self.backend_type
    }

    /// Counter enumeration, only known on kinstr_prfcnt backends.
    pub fn enum_info(&self) -> Option<&EnumInfo> {
        self.enum_info.as_ref()
    }
}
