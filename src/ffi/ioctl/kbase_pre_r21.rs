//! Legacy "UK" kbase interface used by drivers older than r21.
//!
//! Every call shares one command number per argument size, the function is
//! selected by the id stored in the leading header.

use nix::request_code_readwrite;

use super::request;
use crate::ffi::{get, get_at, put, Wire};

const TYPE: u8 = 0x80;

pub const fn command(size: usize) -> u64 {
    request(request_code_readwrite!(TYPE, 0, size))
}

pub const VERSION_CHECK: u64 = command(VersionCheckArgs::SIZE);
pub const SET_FLAGS: u64 = command(SetFlagsArgs::SIZE);
pub const HWCNT_READER_SETUP: u64 = command(UkHwcntReaderSetup::SIZE);
pub const GET_GPUPROPS: u64 = command(UkGpuprops::SIZE);

const UK_FUNC_ID: u32 = 512;

pub mod header_id {
    use super::UK_FUNC_ID;

    pub const VERSION_CHECK: u32 = 0;
    pub const GET_PROPS: u32 = UK_FUNC_ID + 14;
    pub const SET_FLAGS: u32 = UK_FUNC_ID + 18;
    pub const HWCNT_READER_SETUP: u32 = UK_FUNC_ID + 36;
}

// union uk_header {
//     u32 id;
//     u32 ret;
//     u64 sizer;
// };
const HEADER_SIZE: usize = 8;

fn put_header(buf: &mut [u8], id: u32) {
    buf[..HEADER_SIZE].fill(0);
    put(buf, &mut 0, id);
}

// struct kbase_uk_version_check_args {
//     union uk_header header;
//     u16 major;
//     u16 minor;
//     u8 padding[4];
// };
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VersionCheckArgs {
    pub major: u16,
    pub minor: u16,
}

impl Wire for VersionCheckArgs {
    const SIZE: usize = 16;

    fn encode(&self, buf: &mut [u8]) {
        put_header(buf, header_id::VERSION_CHECK);
        let mut at = HEADER_SIZE;
        put(buf, &mut at, self.major);
        put(buf, &mut at, self.minor);
        put(buf, &mut at, 0u32);
    }

    fn decode(buf: &[u8]) -> Self {
        let mut at = HEADER_SIZE;
        let major = get(buf, &mut at);
        let minor = get(buf, &mut at);
        Self { major, minor }
    }
}

// struct kbase_uk_set_flags {
//     union uk_header header;
//     u32 create_flags;
//     u32 padding;
// };
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetFlagsArgs {
    pub create_flags: u32,
}

impl Wire for SetFlagsArgs {
    const SIZE: usize = 16;

    fn encode(&self, buf: &mut [u8]) {
        put_header(buf, header_id::SET_FLAGS);
        let mut at = HEADER_SIZE;
        put(buf, &mut at, self.create_flags);
        put(buf, &mut at, 0u32);
    }

    fn decode(buf: &[u8]) -> Self {
        let create_flags = get_at(buf, HEADER_SIZE);
        Self { create_flags }
    }
}

// struct kbase_uk_hwcnt_reader_setup {
//     union uk_header header;
//     u32 buffer_count;
//     u32 jm_bm;
//     u32 shader_bm;
//     u32 tiler_bm;
//     u32 mmu_l2_bm;
//     s32 fd;
// };
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UkHwcntReaderSetup {
    pub buffer_count: u32,
    pub jm_bm: u32,
    pub shader_bm: u32,
    pub tiler_bm: u32,
    pub mmu_l2_bm: u32,
    pub fd: i32,
}

impl Default for UkHwcntReaderSetup {
    fn default() -> Self {
        Self {
            buffer_count: 0,
            jm_bm: 0,
            shader_bm: 0,
            tiler_bm: 0,
            mmu_l2_bm: 0,
            fd: -1,
        }
    }
}

impl Wire for UkHwcntReaderSetup {
    const SIZE: usize = 32;

    fn encode(&self, buf: &mut [u8]) {
        put_header(buf, header_id::HWCNT_READER_SETUP);
        let mut at = HEADER_SIZE;
        put(buf, &mut at, self.buffer_count);
        put(buf, &mut at, self.jm_bm);
        put(buf, &mut at, self.shader_bm);
        put(buf, &mut at, self.tiler_bm);
        put(buf, &mut at, self.mmu_l2_bm);
        put(buf, &mut at, self.fd);
    }

    fn decode(buf: &[u8]) -> Self {
        let mut at = HEADER_SIZE;
        Self {
            buffer_count: get(buf, &mut at),
            jm_bm: get(buf, &mut at),
            shader_bm: get(buf, &mut at),
            tiler_bm: get(buf, &mut at),
            mmu_l2_bm: get(buf, &mut at),
            fd: get(buf, &mut at),
        }
    }
}

pub const MAX_COHERENT_GROUPS: usize = 16;

// struct kbase_uk_gpuprops {
//     union uk_header header;
//     struct mali_base_gpu_props {
//         struct mali_base_gpu_core_props core_props;         /*   0, 48 bytes */
//         struct mali_base_gpu_l2_cache_props l2_props;       /*  48,  8 bytes */
//         u64 unused_1;                                       /*  56 */
//         struct mali_base_gpu_tiler_props tiler_props;       /*  64,  8 bytes */
//         struct mali_base_gpu_thread_props thread_props;     /*  72, 24 bytes */
//         struct gpu_raw_gpu_props raw_props;                 /*  96, 160 bytes */
//         struct mali_base_gpu_coherent_group_info coherency; /* 256, 272 bytes */
//     } props;
// };
//
// Offsets below are relative to the start of the structure, header included.
const L2_LOG2_CACHE_SIZE: usize = HEADER_SIZE + 49;
const L2_NUM_L2_SLICES: usize = HEADER_SIZE + 50;
const RAW_L2_FEATURES: usize = HEADER_SIZE + 128;
const RAW_GPU_ID: usize = HEADER_SIZE + 232;
const COHERENCY_NUM_CORE_GROUPS: usize = HEADER_SIZE + 260;
const COHERENCY_GROUP: usize = HEADER_SIZE + 272;
const COHERENCY_GROUP_SIZE: usize = 16;

/// The subset of the legacy GPU properties the sampler consumes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UkGpuprops {
    pub log2_cache_size: u8,
    pub num_l2_slices: u8,
    pub l2_features: u32,
    pub gpu_id: u32,
    pub num_core_groups: u32,
    pub core_mask: [u64; MAX_COHERENT_GROUPS],
}

impl Wire for UkGpuprops {
    const SIZE: usize = 536;

    fn encode(&self, buf: &mut [u8]) {
        buf.fill(0);
        put_header(buf, header_id::GET_PROPS);
    }

    fn decode(buf: &[u8]) -> Self {
        let mut core_mask = [0; MAX_COHERENT_GROUPS];
        for (i, mask) in core_mask.iter_mut().enumerate() {
            *mask = get_at(buf, COHERENCY_GROUP + i * COHERENCY_GROUP_SIZE);
        }
        Self {
            log2_cache_size: get_at(buf, L2_LOG2_CACHE_SIZE),
            num_l2_slices: get_at(buf, L2_NUM_L2_SLICES),
            l2_features: get_at(buf, RAW_L2_FEATURES),
            gpu_id: get_at(buf, RAW_GPU_ID),
            num_core_groups: get_at(buf, COHERENCY_NUM_CORE_GROUPS),
            core_mask,
        }
    }
}
