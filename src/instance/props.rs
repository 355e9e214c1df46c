//! GPU properties reported by the driver.
//!
//! Post-r21 drivers return a stream of `(key, value)` entries. The key is a
//! little-endian `u32` holding the property id in its upper 30 bits and the
//! value width in its lower 2 bits. Pre-r21 drivers fill a fixed structure.

use std::io::{Error, ErrorKind, Result};
use std::os::fd::RawFd;

use super::Constants;
use crate::error::{invalid_data, ParseError};
use crate::ffi::ioctl::kbase::{self, CsGetGlbIface, GetGpuprops};
use crate::ffi::ioctl::kbase_pre_r21::{self, UkGpuprops, MAX_COHERENT_GROUPS};
use crate::ffi::ioctl::ioctl_wire;
use crate::ffi::{get_at, Syscall};
use crate::product::{GpuFamily, ProductId};
use crate::version::{IoctlIfaceType, KbaseVersion};

const TILE_SIZE: u32 = 16;

pub(crate) mod prop_id {
    pub const L2_LOG2_CACHE_SIZE: u32 = 14;
    pub const L2_NUM_L2_SLICES: u32 = 15;
    pub const RAW_L2_FEATURES: u32 = 29;
    pub const RAW_GPU_ID: u32 = 55;
    pub const COHERENCY_NUM_CORE_GROUPS: u32 = 62;
    pub const COHERENCY_GROUP_0: u32 = 64;
}

const PROP_ID_SHIFT: u32 = 2;
const PROP_SIZE_MASK: u32 = 0x3;

/// Number of threads in a warp, one on Midgard which has no warps.
pub fn warp_width(gpu_id: u64) -> Result<u32> {
    let product = ProductId::from_raw_gpu_id(gpu_id);
    if product.family() == GpuFamily::Midgard {
        return Ok(1);
    }

    let width = match product {
        ProductId::G31 | ProductId::G51 | ProductId::G68 | ProductId::G71 | ProductId::G72 => 4,
        ProductId::G52 | ProductId::G76 => 8,
        ProductId::G57
        | ProductId::G57_2
        | ProductId::G77
        | ProductId::G78
        | ProductId::G78AE
        | ProductId::G310
        | ProductId::G510
        | ProductId::G610
        | ProductId::G710
        | ProductId::G615
        | ProductId::G715 => 16,
        // Newer GPUs are expected to keep wide warps.
        _ if product.arch_major() > 11 => 16,
        _ => {
            let msg = format!("unknown warp width for product {:#06x}", product.raw());
            return Err(Error::new(ErrorKind::Unsupported, msg));
        }
    };
    Ok(width)
}

// log2 of the bus width in bits lives in the top byte of L2_FEATURES.
fn axi_bus_width(l2_features: u64) -> u64 {
    let log2 = (l2_features & 0xff00_0000) >> 24;
    1u64.checked_shl(log2 as u32).unwrap_or(0)
}

fn l2_slice_size(log2_cache_size: u64) -> u64 {
    1u64.checked_shl(log2_cache_size as u32).unwrap_or(0)
}

fn finish(constants: &mut Constants, core_masks: &[u64]) {
    constants.shader_core_mask = core_masks.iter().fold(0, |acc, mask| acc | mask);
    constants.num_shader_cores = constants.shader_core_mask.count_ones();
    constants.tile_size = TILE_SIZE;
}

fn take<'a>(buf: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    if buf.len() < n {
        return Err(invalid_data(ParseError::OutOfBounds));
    }
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}

fn next_prop(buf: &mut &[u8]) -> Result<(u32, u64)> {
    let key: u32 = get_at(take(buf, 4)?, 0);
    let value = match key & PROP_SIZE_MASK {
        0 => get_at::<u8>(take(buf, 1)?, 0) as u64,
        1 => get_at::<u16>(take(buf, 2)?, 0) as u64,
        2 => get_at::<u32>(take(buf, 4)?, 0) as u64,
        _ => get_at::<u64>(take(buf, 8)?, 0),
    };
    Ok((key >> PROP_ID_SHIFT, value))
}

/// Decodes a post-r21 property stream. Unknown properties are skipped.
pub(crate) fn decode_props(mut buf: &[u8]) -> Result<Constants> {
    let mut constants = Constants::default();
    let mut num_core_groups = 0;
    let mut core_masks = [0u64; MAX_COHERENT_GROUPS];
    let groups = prop_id::COHERENCY_GROUP_0..prop_id::COHERENCY_GROUP_0 + MAX_COHERENT_GROUPS as u32;

    while !buf.is_empty() {
        let (id, value) = next_prop(&mut buf)?;
        match id {
            prop_id::RAW_GPU_ID => {
                constants.gpu_id = value;
                constants.warp_width = warp_width(value)?;
            }
            prop_id::L2_LOG2_CACHE_SIZE => constants.l2_slice_size = l2_slice_size(value),
            prop_id::L2_NUM_L2_SLICES => constants.num_l2_slices = value as u32,
            prop_id::RAW_L2_FEATURES => constants.axi_bus_width = axi_bus_width(value),
            prop_id::COHERENCY_NUM_CORE_GROUPS => num_core_groups = value as usize,
            id if groups.contains(&id) => {
                core_masks[(id - prop_id::COHERENCY_GROUP_0) as usize] = value;
            }
            _ => {}
        }
    }

    let num_core_groups = num_core_groups.min(MAX_COHERENT_GROUPS);
    finish(&mut constants, &core_masks[..num_core_groups]);
    Ok(constants)
}

pub(crate) fn from_uk(props: &UkGpuprops) -> Result<Constants> {
    let gpu_id = props.gpu_id as u64;
    let mut constants = Constants {
        gpu_id,
        warp_width: warp_width(gpu_id)?,
        l2_slice_size: l2_slice_size(props.log2_cache_size as u64),
        num_l2_slices: props.num_l2_slices as u32,
        axi_bus_width: axi_bus_width(props.l2_features as u64),
        ..Default::default()
    };
    let num_core_groups = (props.num_core_groups as usize).min(MAX_COHERENT_GROUPS);
    finish(&mut constants, &props.core_mask[..num_core_groups]);
    Ok(constants)
}

// The first call returns the stream size, the second one fills the buffer.
fn read_props<S: Syscall>(sys: &S, fd: RawFd) -> Result<Vec<u8>> {
    let mut args = GetGpuprops::default();
    let size = ioctl_wire(sys, fd, kbase::GET_GPUPROPS, &mut args)?;
    let size = usize::try_from(size).map_err(|_| invalid_data(ParseError::OutOfBounds))?;

    let mut buf = vec![0u8; size];
    args.buffer = buf.as_mut_ptr() as u64;
    args.size = size as u32;
    ioctl_wire(sys, fd, kbase::GET_GPUPROPS, &mut args)?;
    Ok(buf)
}

// Zero for job manager GPUs and when the query fails.
pub(super) fn fw_version<S: Syscall>(sys: &S, fd: RawFd, version: &KbaseVersion) -> u64 {
    if version.ty() != IoctlIfaceType::Csf {
        return 0;
    }
    let mut glb = CsGetGlbIface::default();
    match ioctl_wire(sys, fd, kbase::CS_GET_GLB_IFACE, &mut glb) {
        Ok(ret) if ret >= 0 => glb.glb_version as u64,
        _ => 0,
    }
}

pub(crate) fn read_constants<S: Syscall>(sys: &S, fd: RawFd, version: &KbaseVersion) -> Result<Constants> {
    if version.is_pre_r21() {
        let mut props = UkGpuprops::default();
        ioctl_wire(sys, fd, kbase_pre_r21::GET_GPUPROPS, &mut props)?;
        return from_uk(&props);
    }

    let buf = read_props(sys, fd)?;
    let mut constants = decode_props(&buf)?;
    constants.fw_version = fw_version(sys, fd, version);
    Ok(constants)
}
