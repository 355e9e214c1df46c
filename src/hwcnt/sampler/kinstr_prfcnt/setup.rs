use std::io::{Error, ErrorKind, Result};
use std::os::fd::RawFd;

use super::convert::request;
use super::enum_info::EnumInfo;
use crate::error::{invalid_data, ParseError, SetupStage};
use crate::ffi::ioctl::ioctl_wire;
use crate::ffi::ioctl::kbase::{self, KinstrPrfcntSetup};
use crate::ffi::ioctl::kinstr_prfcnt::{MetadataItem, RequestItem};
use crate::ffi::{Syscall, Wire};
use crate::hwcnt::sampler::fd::FdGuard;
use crate::hwcnt::sampler::memory::MappedMemory;
use crate::hwcnt::sampler::{filter_block_extents, Configuration};
use crate::hwcnt::{BlockExtents, Features};
use crate::instance::Instance;
use crate::version::{IoctlIfaceType, KbaseVersion};

/// Everything a kinstr_prfcnt backend owns after a successful setup.
pub(crate) struct Args<S: Syscall> {
    // Unmapped before the descriptor is closed.
    pub memory: MappedMemory<S>,
    pub fd: FdGuard<S>,
    pub features: Features,
    pub extents: BlockExtents,
    pub metadata_item_size: usize,
    pub sc_mask: u64,
}

pub(super) fn init_features(ei: &EnumInfo, version: &KbaseVersion) -> Features {
    let mut features = Features {
        has_gpu_cycle: ei.has_cycles_top,
        has_stretched_flag: true,
        overflow_behavior_defined: true,
        ..Default::default()
    };

    if version.is_at_least(IoctlIfaceType::Csf, 1, 23) {
        features.has_power_states = true;
        features.has_protection_states = true;
    } else if version.is_at_least(IoctlIfaceType::JmPostR21, 11, 41) {
        features.has_power_states = true;
        features.has_vm_states = true;
    }
    features
}

/// Encodes the mode request, one enable request per configuration and the sentinel.
pub(super) fn encode_requests(period_ns: u64, configs: &[Configuration]) -> Vec<u8> {
    let items = std::iter::once(RequestItem::Mode { period_ns })
        .chain(configs.iter().map(request))
        .chain(std::iter::once(RequestItem::Sentinel));

    let mut list = vec![0u8; (configs.len() + 2) * RequestItem::SIZE];
    for (item, buf) in items.zip(list.chunks_exact_mut(RequestItem::SIZE)) {
        item.encode(buf);
    }
    list
}

fn invoke_request<S: Syscall>(
    sys: &S,
    device_fd: RawFd,
    requests: &mut [u8],
) -> Result<(RawFd, KinstrPrfcntSetup)> {
    let mut args = KinstrPrfcntSetup {
        request_item_count: (requests.len() / RequestItem::SIZE) as u32,
        request_item_size: RequestItem::SIZE as u32,
        requests_ptr: requests.as_mut_ptr() as u64,
        ..Default::default()
    };
    let fd = ioctl_wire(sys, device_fd, kbase::KINSTR_PRFCNT_SETUP, &mut args)?;
    Ok((fd, args))
}

/// Negotiates a kinstr_prfcnt reader for `configs`.
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

    let ei = instance.enum_info().ok_or_else(|| {
        let e = Error::new(ErrorKind::Unsupported, "device reports no counter enumeration");
        SetupStage::EnumInfo.fail(e)
    })?;

    let mut requests = encode_requests(period_ns, configs);
    let (fd, reply) = invoke_request(sys, instance.fd(), &mut requests)
        .map_err(|e| SetupStage::ReaderSetup.fail(e))?;
    let fd = FdGuard::new(sys.clone(), fd);

    let metadata_item_size = reply.metadata_item_size as usize;
    if metadata_item_size < MetadataItem::SIZE {
        let e = invalid_data(ParseError::ItemSize(reply.metadata_item_size));
        return Err(SetupStage::ReaderSetup.fail(e));
    }

    let memory = MappedMemory::new(sys.clone(), fd.raw(), reply.mmap_size_bytes as usize)
        .map_err(|e| SetupStage::Mmap.fail(e))?;

    Ok(Args {
        memory,
        fd,
        features: init_features(ei, &instance.version()),
        extents,
        metadata_item_size,
        sc_mask: instance.constants().shader_core_mask,
    })
}
