//! Vinstr hardware counter reader, the descriptor returned by `HWCNT_READER_SETUP`.

use bitflags::bitflags;

use nix::{request_code_read, request_code_write};

use super::request;
use crate::ffi::{get, put, Wire};

const TYPE: u8 = 0xBE;

pub const GET_BUFFER_SIZE: u64 = request(request_code_read!(TYPE, 0x01, 4));
pub const DUMP: u64 = request(request_code_write!(TYPE, 0x10, 4));
pub const CLEAR: u64 = request(request_code_write!(TYPE, 0x11, 4));
pub const GET_BUFFER: u64 = request(request_code_read!(TYPE, 0x20, ReaderMetadata::SIZE));
pub const GET_BUFFER_WITH_CYCLES: u64 = request(request_code_read!(TYPE, 0x20, ReaderMetadataWithCycles::SIZE));
pub const PUT_BUFFER: u64 = request(request_code_write!(TYPE, 0x21, ReaderMetadata::SIZE));
pub const SET_INTERVAL: u64 = request(request_code_write!(TYPE, 0x30, 4));
pub const GET_API_VERSION: u64 = request(request_code_write!(TYPE, 0xFF, 4));
pub const GET_API_VERSION_WITH_FEATURES: u64 = request(request_code_write!(TYPE, 0xFF, ApiVersion::SIZE));

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ReaderFeatures: u32 {
        const CYCLES_TOP = 1 << 0;
        const CYCLES_SHADER_CORE = 1 << 1;
    }
}

/// What triggered a dump.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReaderEvent {
    Manual,
    Periodic,
    Prejob,
    Postjob,
}

impl ReaderEvent {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Manual),
            1 => Some(Self::Periodic),
            2 => Some(Self::Prejob),
            3 => Some(Self::Postjob),
            _ => None,
        }
    }
}

// struct kbase_hwcnt_reader_metadata {
//     u64 timestamp;
//     u32 event_id;
//     u32 buffer_idx;
// };
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReaderMetadata {
    pub timestamp: u64,
    pub event_id: u32,
    pub buffer_idx: u32,
}

impl Wire for ReaderMetadata {
    const SIZE: usize = 16;

    fn encode(&self, buf: &mut [u8]) {
        let mut at = 0;
        put(buf, &mut at, self.timestamp);
        put(buf, &mut at, self.event_id);
        put(buf, &mut at, self.buffer_idx);
    }

    fn decode(buf: &[u8]) -> Self {
        let mut at = 0;
        Self {
            timestamp: get(buf, &mut at),
            event_id: get(buf, &mut at),
            buffer_idx: get(buf, &mut at),
        }
    }
}

// struct kbase_hwcnt_reader_metadata_with_cycles {
//     struct kbase_hwcnt_reader_metadata metadata;
//     struct {
//         u64 top;
//         u64 shader_cores;
//     } cycles;
// };
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReaderMetadataWithCycles {
    pub metadata: ReaderMetadata,
    pub top: u64,
    pub shader_cores: u64,
}

impl Wire for ReaderMetadataWithCycles {
    const SIZE: usize = 32;

    fn encode(&self, buf: &mut [u8]) {
        self.metadata.encode(&mut buf[..ReaderMetadata::SIZE]);
        let mut at = ReaderMetadata::SIZE;
        put(buf, &mut at, self.top);
        put(buf, &mut at, self.shader_cores);
    }

    fn decode(buf: &[u8]) -> Self {
        let metadata = ReaderMetadata::decode(&buf[..ReaderMetadata::SIZE]);
        let mut at = ReaderMetadata::SIZE;
        let top = get(buf, &mut at);
        let shader_cores = get(buf, &mut at);
        Self {
            metadata,
            top,
            shader_cores,
        }
    }
}

// struct kbase_hwcnt_reader_api_version {
//     u32 version;
//     u32 features;
// };
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApiVersion {
    pub version: u32,
    pub features: ReaderFeatures,
}

impl Wire for ApiVersion {
    const SIZE: usize = 8;

    fn encode(&self, buf: &mut [u8]) {
        let mut at = 0;
        put(buf, &mut at, self.version);
        put(buf, &mut at, self.features.bits());
    }

    fn decode(buf: &[u8]) -> Self {
        let mut at = 0;
        let version = get(buf, &mut at);
        let features = ReaderFeatures::from_bits_truncate(get(buf, &mut at));
        Self { version, features }
    }
}
