//! Post-r21 kbase device ioctls, shared by the job manager and CSF drivers.

use nix::{request_code_readwrite, request_code_write};

use super::request;
use crate::ffi::{get, put, Wire};

const TYPE: u8 = 0x80;

pub const VERSION_CHECK_JM: u64 = request(request_code_readwrite!(TYPE, 0, VersionCheck::SIZE));
pub const VERSION_CHECK_CSF: u64 = request(request_code_readwrite!(TYPE, 52, VersionCheck::SIZE));
pub const SET_FLAGS: u64 = request(request_code_write!(TYPE, 1, SetFlags::SIZE));
pub const GET_GPUPROPS: u64 = request(request_code_write!(TYPE, 3, GetGpuprops::SIZE));
pub const HWCNT_READER_SETUP: u64 = request(request_code_write!(TYPE, 8, HwcntReaderSetup::SIZE));
pub const CS_GET_GLB_IFACE: u64 = request(request_code_readwrite!(TYPE, 51, CsGetGlbIface::SIZE));
pub const KINSTR_PRFCNT_ENUM_INFO: u64 = request(request_code_readwrite!(TYPE, 56, KinstrPrfcntEnumInfo::SIZE));
pub const KINSTR_PRFCNT_SETUP: u64 = request(request_code_readwrite!(TYPE, 57, KinstrPrfcntSetup::SIZE));

// struct kbase_ioctl_version_check {
//     __u16 major;
//     __u16 minor;
// };
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VersionCheck {
    pub major: u16,
    pub minor: u16,
}

impl Wire for VersionCheck {
    const SIZE: usize = 4;

    fn encode(&self, buf: &mut [u8]) {
        let mut at = 0;
        put(buf, &mut at, self.major);
        put(buf, &mut at, self.minor);
    }

    fn decode(buf: &[u8]) -> Self {
        let mut at = 0;
        let major = get(buf, &mut at);
        let minor = get(buf, &mut at);
        Self { major, minor }
    }
}

// struct kbase_ioctl_set_flags {
//     __u32 create_flags;
// };
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetFlags {
    pub create_flags: u32,
}

impl Wire for SetFlags {
    const SIZE: usize = 4;

    fn encode(&self, buf: &mut [u8]) {
        put(buf, &mut 0, self.create_flags);
    }

    fn decode(buf: &[u8]) -> Self {
        let create_flags = get(buf, &mut 0);
        Self { create_flags }
    }
}

// struct kbase_ioctl_get_gpuprops {
//     __u64 buffer;
//     __u32 size;
//     __u32 flags;
// };
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GetGpuprops {
    pub buffer: u64,
    pub size: u32,
    pub flags: u32,
}

impl Wire for GetGpuprops {
    const SIZE: usize = 16;

    fn encode(&self, buf: &mut [u8]) {
        let mut at = 0;
        put(buf, &mut at, self.buffer);
        put(buf, &mut at, self.size);
        put(buf, &mut at, self.flags);
    }

    fn decode(buf: &[u8]) -> Self {
        let mut at = 0;
        let buffer = get(buf, &mut at);
        let size = get(buf, &mut at);
        let flags = get(buf, &mut at);
        Self {
            buffer,
            size,
            flags,
        }
    }
}

// struct kbase_ioctl_hwcnt_reader_setup {
//     __u32 buffer_count;
//     __u32 fe_bm;
//     __u32 shader_bm;
//     __u32 tiler_bm;
//     __u32 mmu_l2_bm;
// };
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HwcntReaderSetup {
    pub buffer_count: u32,
    pub fe_bm: u32,
    pub shader_bm: u32,
    pub tiler_bm: u32,
    pub mmu_l2_bm: u32,
}

impl Wire for HwcntReaderSetup {
    const SIZE: usize = 20;

    fn encode(&self, buf: &mut [u8]) {
        let mut at = 0;
        put(buf, &mut at, self.buffer_count);
        put(buf, &mut at, self.fe_bm);
        put(buf, &mut at, self.shader_bm);
        put(buf, &mut at, self.tiler_bm);
        put(buf, &mut at, self.mmu_l2_bm);
    }

    fn decode(buf: &[u8]) -> Self {
        let mut at = 0;
        Self {
            buffer_count: get(buf, &mut at),
            fe_bm: get(buf, &mut at),
            shader_bm: get(buf, &mut at),
            tiler_bm: get(buf, &mut at),
            mmu_l2_bm: get(buf, &mut at),
        }
    }
}

// union kbase_ioctl_cs_get_glb_iface {
//     struct {
//         __u32 max_group_num;
//         __u32 max_total_stream_num;
//         __u64 groups_ptr;
//         __u64 streams_ptr;
//     } in;
//     struct {
//         __u32 glb_version;
//         __u32 features;
//         __u32 group_num;
//         __u32 prfcnt_size;
//         __u32 total_stream_num;
//         __u32 instr_features;
//     } out;
// };
//
// Only the global interface version is of interest, a zeroed input queries
// the counts without copying any group or stream data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CsGetGlbIface {
    pub glb_version: u32,
}

impl Wire for CsGetGlbIface {
    const SIZE: usize = 24;

    fn encode(&self, buf: &mut [u8]) {
        buf.fill(0);
    }

    fn decode(buf: &[u8]) -> Self {
        let glb_version = get(buf, &mut 0);
        Self { glb_version }
    }
}

// struct kbase_ioctl_kinstr_prfcnt_enum_info {
//     __u32 info_item_size;
//     __u32 info_item_count;
//     __u64 info_list_ptr;
// };
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KinstrPrfcntEnumInfo {
    pub info_item_size: u32,
    pub info_item_count: u32,
    pub info_list_ptr: u64,
}

impl Wire for KinstrPrfcntEnumInfo {
    const SIZE: usize = 16;

    fn encode(&self, buf: &mut [u8]) {
        let mut at = 0;
        put(buf, &mut at, self.info_item_size);
        put(buf, &mut at, self.info_item_count);
        put(buf, &mut at, self.info_list_ptr);
    }

    fn decode(buf: &[u8]) -> Self {
        let mut at = 0;
        Self {
            info_item_size: get(buf, &mut at),
            info_item_count: get(buf, &mut at),
            info_list_ptr: get(buf, &mut at),
        }
    }
}

// union kbase_ioctl_kinstr_prfcnt_setup {
//     struct {
//         __u32 request_item_count;
//         __u32 request_item_size;
//         __u64 requests_ptr;
//     } in;
//     struct {
//         __u32 prfcnt_metadata_item_size;
//         __u32 prfcnt_mmap_size_bytes;
//     } out;
// };
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KinstrPrfcntSetup {
    pub request_item_count: u32,
    pub request_item_size: u32,
    pub requests_ptr: u64,
    pub metadata_item_size: u32,
    pub mmap_size_bytes: u32,
}

impl Wire for KinstrPrfcntSetup {
    const SIZE: usize = 16;

    fn encode(&self, buf: &mut [u8]) {
        let mut at = 0;
        put(buf, &mut at, self.request_item_count);
        put(buf, &mut at, self.request_item_size);
        put(buf, &mut at, self.requests_ptr);
    }

    // The kernel overwrites the input half of the union with the output.
    fn decode(buf: &[u8]) -> Self {
        let mut at = 0;
        let metadata_item_size = get(buf, &mut at);
        let mmap_size_bytes = get(buf, &mut at);
        Self {
            metadata_item_size,
            mmap_size_bytes,
            ..Default::default()
        }
    }
}
