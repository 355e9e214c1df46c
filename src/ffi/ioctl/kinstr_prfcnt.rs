//! Kinstr_prfcnt counter reader, the descriptor returned by `KINSTR_PRFCNT_SETUP`.
//!
//! Enumeration, request and metadata lists are flex lists: fixed-stride
//! records whose header type packs a list kind and a subtype.

use nix::{request_code_read, request_code_write};

use super::request;
use crate::ffi::{get, get_at, put, Wire};

const TYPE: u8 = 0xBF;

pub const ISSUE_COMMAND: u64 = request(request_code_write!(TYPE, 0x00, ControlCmd::SIZE));
pub const GET_SAMPLE: u64 = request(request_code_read!(TYPE, 0x01, SampleAccess::SIZE));
pub const PUT_SAMPLE: u64 = request(request_code_write!(TYPE, 0x10, SampleAccess::SIZE));

/// Item version the requests are written against.
pub const API_VERSION: u16 = 0;

const FLEX_LIST_TYPE_ENUM: u16 = 0;
const FLEX_LIST_TYPE_REQUEST: u16 = 1;
const FLEX_LIST_TYPE_METADATA: u16 = 2;

// #define FLEX_LIST_TYPE(type, subtype) ((__u16)(((type & 0xf) << 12) | (subtype & 0xfff)))
const fn flex_list_type(ty: u16, subtype: u16) -> u16 {
    ((ty & 0xf) << 12) | (subtype & 0xfff)
}

pub const FLEX_LIST_TYPE_NONE: u16 = 0;

pub const ENUM_TYPE_BLOCK: u16 = flex_list_type(FLEX_LIST_TYPE_ENUM, 0);
pub const ENUM_TYPE_REQUEST: u16 = flex_list_type(FLEX_LIST_TYPE_ENUM, 1);
pub const ENUM_TYPE_SAMPLE_INFO: u16 = flex_list_type(FLEX_LIST_TYPE_ENUM, 2);

pub const REQUEST_TYPE_MODE: u16 = flex_list_type(FLEX_LIST_TYPE_REQUEST, 0);
pub const REQUEST_TYPE_ENABLE: u16 = flex_list_type(FLEX_LIST_TYPE_REQUEST, 1);

pub const SAMPLE_META_TYPE_SAMPLE: u16 = flex_list_type(FLEX_LIST_TYPE_METADATA, 0);
pub const SAMPLE_META_TYPE_CLOCK: u16 = flex_list_type(FLEX_LIST_TYPE_METADATA, 1);
pub const SAMPLE_META_TYPE_BLOCK: u16 = flex_list_type(FLEX_LIST_TYPE_METADATA, 2);

pub mod block_type {
    pub const FE: u8 = 0;
    pub const TILER: u8 = 1;
    pub const MEMORY: u8 = 2;
    pub const SHADER_CORE: u8 = 3;
}

pub mod set {
    pub const PRIMARY: u8 = 0;
    pub const SECONDARY: u8 = 1;
    pub const TERTIARY: u8 = 2;
}

pub mod request_type {
    pub const MODE: u16 = 0;
    pub const ENABLE: u16 = 1;
}

pub mod sample_flag {
    pub const OVERFLOW: u32 = 1 << 0;
    pub const ERROR: u32 = 1 << 30;
}

pub mod block_state {
    pub const ON: u32 = 1 << 0;
    pub const OFF: u32 = 1 << 1;
    pub const AVAILABLE: u32 = 1 << 2;
    pub const UNAVAILABLE: u32 = 1 << 3;
    pub const NORMAL_MODE: u32 = 1 << 4;
    pub const PROTECTED_MODE: u32 = 1 << 5;
}

pub const MAX_REPORTED_DOMAINS: usize = 4;

const SAMPLING_MODE_MANUAL: u8 = 0;
const SAMPLING_MODE_PERIODIC: u8 = 1;

// struct prfcnt_item_header {
//     __u16 item_type;
//     __u16 item_version;
// };
//
// Every item is the header followed by 4 bytes of padding and a union.
const HEADER_SIZE: usize = 8;

fn put_header(buf: &mut [u8], item_type: u16) {
    buf.fill(0);
    let mut at = 0;
    put(buf, &mut at, item_type);
    put(buf, &mut at, API_VERSION);
}

/// `struct prfcnt_enum_item`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnumItem {
    // struct prfcnt_enum_block_counter {
    //     __u8 type;
    //     __u8 set;
    //     __u8 pad[2];
    //     __u16 num_instances;
    //     __u16 num_values;
    //     __u64 counter_mask[2];
    // };
    BlockCounter {
        ty: u8,
        set: u8,
        num_instances: u16,
        num_values: u16,
        counter_mask: [u64; 2],
    },
    // struct prfcnt_enum_request {
    //     __u16 request_item_type;
    //     __u16 pad;
    //     __u32 versions_mask;
    // };
    Request {
        request_item_type: u16,
        versions_mask: u32,
    },
    // struct prfcnt_enum_sample_info {
    //     __u32 num_clock_domains;
    //     __u32 pad;
    // };
    SampleInfo {
        num_clock_domains: u32,
    },
    Unknown(u16),
}

impl Wire for EnumItem {
    const SIZE: usize = 32;

    fn encode(&self, buf: &mut [u8]) {
        let mut at = HEADER_SIZE;
        match *self {
            Self::BlockCounter {
                ty,
                set,
                num_instances,
                num_values,
                counter_mask,
            } => {
                put_header(buf, ENUM_TYPE_BLOCK);
                put(buf, &mut at, ty);
                put(buf, &mut at, set);
                at += 2;
                put(buf, &mut at, num_instances);
                put(buf, &mut at, num_values);
                put(buf, &mut at, counter_mask[0]);
                put(buf, &mut at, counter_mask[1]);
            }
            Self::Request {
                request_item_type,
                versions_mask,
            } => {
                put_header(buf, ENUM_TYPE_REQUEST);
                put(buf, &mut at, request_item_type);
                at += 2;
                put(buf, &mut at, versions_mask);
            }
            Self::SampleInfo { num_clock_domains } => {
                put_header(buf, ENUM_TYPE_SAMPLE_INFO);
                put(buf, &mut at, num_clock_domains);
            }
            Self::Unknown(item_type) => put_header(buf, item_type),
        }
    }

    fn decode(buf: &[u8]) -> Self {
        let item_type = get_at(buf, 0);
        let mut at = HEADER_SIZE;
        match item_type {
            ENUM_TYPE_BLOCK => {
                let ty = get(buf, &mut at);
                let set = get(buf, &mut at);
                at += 2;
                let num_instances = get(buf, &mut at);
                let num_values = get(buf, &mut at);
                let counter_mask = [get(buf, &mut at), get(buf, &mut at)];
                Self::BlockCounter {
                    ty,
                    set,
                    num_instances,
                    num_values,
                    counter_mask,
                }
            }
            ENUM_TYPE_REQUEST => {
                let request_item_type = get(buf, &mut at);
                at += 2;
                let versions_mask = get(buf, &mut at);
                Self::Request {
                    request_item_type,
                    versions_mask,
                }
            }
            ENUM_TYPE_SAMPLE_INFO => Self::SampleInfo {
                num_clock_domains: get(buf, &mut at),
            },
            other => Self::Unknown(other),
        }
    }
}

/// `struct prfcnt_request_item`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestItem {
    // struct prfcnt_request_mode {
    //     __u8 mode;
    //     __u8 pad[7];
    //     union {
    //         struct {
    //             __u64 period_ns;
    //         } periodic;
    //     } mode_config;
    // };
    //
    // A zero period selects manual sampling.
    Mode { period_ns: u64 },
    // struct prfcnt_request_enable {
    //     __u8 type;
    //     __u8 set;
    //     __u8 pad[6];
    //     __u64 enable_mask[2];
    // };
    Enable {
        ty: u8,
        set: u8,
        enable_mask: [u64; 2],
    },
    // Terminates the request list, an all-zero item.
    Sentinel,
}

impl Wire for RequestItem {
    const SIZE: usize = 32;

    fn encode(&self, buf: &mut [u8]) {
        let mut at = HEADER_SIZE;
        match *self {
            Self::Mode { period_ns } => {
                put_header(buf, REQUEST_TYPE_MODE);
                if period_ns == 0 {
                    put(buf, &mut at, SAMPLING_MODE_MANUAL);
                } else {
                    put(buf, &mut at, SAMPLING_MODE_PERIODIC);
                    at += 7;
                    put(buf, &mut at, period_ns);
                }
            }
            Self::Enable {
                ty,
                set,
                enable_mask,
            } => {
                put_header(buf, REQUEST_TYPE_ENABLE);
                put(buf, &mut at, ty);
                put(buf, &mut at, set);
                at += 6;
                put(buf, &mut at, enable_mask[0]);
                put(buf, &mut at, enable_mask[1]);
            }
            Self::Sentinel => buf.fill(0),
        }
    }

    fn decode(buf: &[u8]) -> Self {
        let item_type = get_at(buf, 0);
        let mut at = HEADER_SIZE;
        match item_type {
            REQUEST_TYPE_MODE => {
                let mode: u8 = get(buf, &mut at);
                at += 7;
                let period_ns = match mode {
                    SAMPLING_MODE_PERIODIC => get(buf, &mut at),
                    _ => 0,
                };
                Self::Mode { period_ns }
            }
            REQUEST_TYPE_ENABLE => {
                let ty = get(buf, &mut at);
                let set = get(buf, &mut at);
                at += 6;
                let enable_mask = [get(buf, &mut at), get(buf, &mut at)];
                Self::Enable {
                    ty,
                    set,
                    enable_mask,
                }
            }
            _ => Self::Sentinel,
        }
    }
}

/// `struct prfcnt_metadata`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetadataItem {
    None,
    // struct prfcnt_sample_metadata {
    //     __u64 timestamp_start;
    //     __u64 timestamp_end;
    //     __u64 seq;
    //     __u64 user_data;
    //     __u32 flags;
    //     __u32 pad;
    // };
    Sample {
        timestamp_start: u64,
        timestamp_end: u64,
        seq: u64,
        user_data: u64,
        flags: u32,
    },
    // struct prfcnt_clock_metadata {
    //     __u32 num_domains;
    //     __u32 pad;
    //     __u64 cycles[MAX_REPORTED_DOMAINS];
    // };
    Clock {
        num_domains: u32,
        cycles: [u64; MAX_REPORTED_DOMAINS],
    },
    // struct prfcnt_block_metadata {
    //     __u8 type;
    //     __u8 block_idx;
    //     __u8 set;
    //     __u8 pad_u8;
    //     __u32 block_state;
    //     __u32 values_offset;
    //     __u32 pad_u32;
    // };
    Block {
        ty: u8,
        block_idx: u8,
        set: u8,
        block_state: u32,
        values_offset: u32,
    },
    Unknown(u16),
}

impl Wire for MetadataItem {
    const SIZE: usize = 48;

    fn encode(&self, buf: &mut [u8]) {
        let mut at = HEADER_SIZE;
        match *self {
            Self::None => buf.fill(0),
            Self::Sample {
                timestamp_start,
                timestamp_end,
                seq,
                user_data,
                flags,
            } => {
                put_header(buf, SAMPLE_META_TYPE_SAMPLE);
                put(buf, &mut at, timestamp_start);
                put(buf, &mut at, timestamp_end);
                put(buf, &mut at, seq);
                put(buf, &mut at, user_data);
                put(buf, &mut at, flags);
            }
            Self::Clock {
                num_domains,
                cycles,
            } => {
                put_header(buf, SAMPLE_META_TYPE_CLOCK);
                put(buf, &mut at, num_domains);
                at += 4;
                for cycle in cycles {
                    put(buf, &mut at, cycle);
                }
            }
            Self::Block {
                ty,
                block_idx,
                set,
                block_state,
                values_offset,
            } => {
                put_header(buf, SAMPLE_META_TYPE_BLOCK);
                put(buf, &mut at, ty);
                put(buf, &mut at, block_idx);
                put(buf, &mut at, set);
                at += 1;
                put(buf, &mut at, block_state);
                put(buf, &mut at, values_offset);
            }
            Self::Unknown(item_type) => put_header(buf, item_type),
        }
    }

    fn decode(buf: &[u8]) -> Self {
        let item_type = get_at(buf, 0);
        let mut at = HEADER_SIZE;
        match item_type {
            FLEX_LIST_TYPE_NONE => Self::None,
            SAMPLE_META_TYPE_SAMPLE => Self::Sample {
                timestamp_start: get(buf, &mut at),
                timestamp_end: get(buf, &mut at),
                seq: get(buf, &mut at),
                user_data: get(buf, &mut at),
                flags: get(buf, &mut at),
            },
            SAMPLE_META_TYPE_CLOCK => {
                let num_domains = get(buf, &mut at);
                at += 4;
                let mut cycles = [0; MAX_REPORTED_DOMAINS];
                for cycle in cycles.iter_mut() {
                    *cycle = get(buf, &mut at);
                }
                Self::Clock {
                    num_domains,
                    cycles,
                }
            }
            SAMPLE_META_TYPE_BLOCK => {
                let ty = get(buf, &mut at);
                let block_idx = get(buf, &mut at);
                let set = get(buf, &mut at);
                at += 1;
                let block_state = get(buf, &mut at);
                let values_offset = get(buf, &mut at);
                Self::Block {
                    ty,
                    block_idx,
                    set,
                    block_state,
                    values_offset,
                }
            }
            other => Self::Unknown(other),
        }
    }
}

pub mod control_cmd {
    pub const START: u16 = 1;
    pub const STOP: u16 = 2;
    pub const SAMPLE_SYNC: u16 = 3;
    pub const DISCARD: u16 = 5;
}

// struct prfcnt_control_cmd {
//     __u16 cmd;
//     __u16 pad[3];
//     __u64 user_data;
// };
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlCmd {
    pub cmd: u16,
    pub user_data: u64,
}

impl Wire for ControlCmd {
    const SIZE: usize = 16;

    fn encode(&self, buf: &mut [u8]) {
        buf.fill(0);
        put(buf, &mut 0, self.cmd);
        put(buf, &mut 8, self.user_data);
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            cmd: get_at(buf, 0),
            user_data: get_at(buf, 8),
        }
    }
}

// struct prfcnt_sample_access {
//     __u64 sequence;
//     __u64 sample_offset_bytes;
// };
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SampleAccess {
    pub sequence: u64,
    pub sample_offset_bytes: u64,
}

impl Wire for SampleAccess {
    const SIZE: usize = 16;

    fn encode(&self, buf: &mut [u8]) {
        let mut at = 0;
        put(buf, &mut at, self.sequence);
        put(buf, &mut at, self.sample_offset_bytes);
    }

    fn decode(buf: &[u8]) -> Self {
        let mut at = 0;
        Self {
            sequence: get(buf, &mut at),
            sample_offset_bytes: get(buf, &mut at),
        }
    }
}
