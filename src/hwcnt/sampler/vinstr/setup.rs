use std::io::{Error, Result};
use std::os::fd::RawFd;

use super::convert::convert;
use super::layout::{SampleLayout, SampleLayoutType};
use crate::error::SetupStage;
use crate::ffi::ioctl::kbase::{self, HwcntReaderSetup};
use crate::ffi::ioctl::kbase_pre_r21::{self, UkHwcntReaderSetup};
use crate::ffi::ioctl::vinstr::{self, ApiVersion, ReaderFeatures};
use crate::ffi::ioctl::{ioctl_u32, ioctl_wire};
use crate::ffi::Syscall;
use crate::hwcnt::extents::is_v4_layout;
use crate::hwcnt::sampler::fd::FdGuard;
use crate::hwcnt::sampler::memory::MappedMemory;
use crate::hwcnt::sampler::{filter_block_extents, Configuration};
use crate::hwcnt::{BlockExtents, Features};
use crate::instance::Instance;

/// Slots in the vinstr ring buffer.
pub(crate) const BUFFER_COUNT: u32 = 32;

/// Everything a vinstr backend owns after a successful setup.
pub(crate) struct Args<S: Syscall> {
    // Unmapped before the descriptor is closed.
    pub memory: MappedMemory<S>,
    pub fd: FdGuard<S>,
    pub period_ns: u64,
    pub features: Features,
    pub reader_features: ReaderFeatures,
    pub extents: BlockExtents,
    pub buffer_size: usize,
    pub layout: SampleLayout,
}

fn init_features(reader_features: ReaderFeatures) -> Features {
    Features {
        has_gpu_cycle: !reader_features.is_empty(),
        has_stretched_flag: false,
        overflow_behavior_defined: true,
        ..Default::default()
    }
}

fn reader_setup<S: Syscall>(instance: &Instance<'_, S>, setup: &HwcntReaderSetup) -> Result<RawFd> {
    let sys = instance.sys();

    if !instance.version().is_pre_r21() {
        let mut args = *setup;
        return ioctl_wire(sys, instance.fd(), kbase::HWCNT_READER_SETUP, &mut args);
    }

    let mut args = UkHwcntReaderSetup {
        buffer_count: setup.buffer_count,
        jm_bm: setup.fe_bm,
        shader_bm: setup.shader_bm,
        tiler_bm: setup.tiler_bm,
        mmu_l2_bm: setup.mmu_l2_bm,
        fd: -1,
    };
    ioctl_wire(sys, instance.fd(), kbase_pre_r21::HWCNT_READER_SETUP, &mut args)?;
    if args.fd < 0 {
        return Err(Error::other("reader setup returned no descriptor"));
    }
    Ok(args.fd)
}

fn api_version<S: Syscall>(sys: &S, fd: RawFd) -> Result<ApiVersion> {
    let mut api = ApiVersion::default();
    match ioctl_wire(sys, fd, vinstr::GET_API_VERSION_WITH_FEATURES, &mut api) {
        Ok(_) => Ok(api),
        Err(_) => {
            let version = ioctl_u32(sys, fd, vinstr::GET_API_VERSION)?;
            Ok(ApiVersion {
                version,
                features: ReaderFeatures::empty(),
            })
        }
    }
}

/// Negotiates a vinstr reader for `configs`.
///
/// A zero `period_ns` sets up a manual reader.
pub(crate) fn setup<S: Syscall>(
    instance: &Instance<'_, S>,
    period_ns: u64,
    configs: &[Configuration],
) -> Result<Args<S>> {
    let sys = instance.sys();

    let extents = filter_block_extents(instance.block_extents(), configs)
        .map_err(|e| SetupStage::Filter.fail(e))?;

    let mut setup_args = convert(configs).map_err(|e| SetupStage::Convert.fail(e))?;
    setup_args.buffer_count = BUFFER_COUNT;

    let fd = reader_setup(instance, &setup_args).map_err(|e| SetupStage::ReaderSetup.fail(e))?;
    let fd = FdGuard::new(sys.clone(), fd);

    let api = api_version(sys, fd.raw()).map_err(|e| SetupStage::ApiVersion.fail(e))?;
    log::debug!(
        "Vinstr reader api version {}, features {:?}",
        api.version,
        api.features
    );

    let buffer_size = ioctl_u32(sys, fd.raw(), vinstr::GET_BUFFER_SIZE)
        .map_err(|e| SetupStage::BufferSize.fail(e))? as usize;

    let memory = MappedMemory::new(sys.clone(), fd.raw(), buffer_size * BUFFER_COUNT as usize)
        .map_err(|e| SetupStage::Mmap.fail(e))?;

    let layout_type = if is_v4_layout(instance.product_id()) {
        SampleLayoutType::V4
    } else {
        SampleLayoutType::NonV4
    };
    let constants = instance.constants();
    let layout = SampleLayout::new(
        &extents,
        constants.num_l2_slices,
        constants.shader_core_mask,
        layout_type,
    )
    .map_err(|e| SetupStage::Layout.fail(e))?;
    log::debug!("Vinstr {:?} layout with {} blocks", layout_type, layout.len());

    Ok(Args {
        memory,
        fd,
        period_ns,
        features: init_features(api.features),
        reader_features: api.features,
        extents,
        buffer_size,
        layout,
    })
}
