use super::kinstr_prfcnt::{EnumItem, MetadataItem, RequestItem};
use super::vinstr::{ApiVersion, ReaderFeatures, ReaderMetadataWithCycles};
use super::*;
use crate::ffi::Wire;

#[test]
fn test_command_numbers() {
    // Values as produced by the kernel headers.
    assert_eq!(kbase::VERSION_CHECK_JM, 0xC0048000);
    assert_eq!(kbase::VERSION_CHECK_CSF, 0xC0048034);
    assert_eq!(kbase::SET_FLAGS, 0x40048001);
    assert_eq!(kbase::GET_GPUPROPS, 0x40108003);
    assert_eq!(kbase::HWCNT_READER_SETUP, 0x40148008);
    assert_eq!(kbase::KINSTR_PRFCNT_ENUM_INFO, 0xC0108038);
    assert_eq!(kbase::KINSTR_PRFCNT_SETUP, 0xC0108039);

    assert_eq!(kbase_pre_r21::VERSION_CHECK, 0xC0108000);
    assert_eq!(kbase_pre_r21::HWCNT_READER_SETUP, 0xC0208000);

    assert_eq!(vinstr::GET_BUFFER_SIZE, 0x8004BE01);
    assert_eq!(vinstr::DUMP, 0x4004BE10);
    assert_eq!(vinstr::CLEAR, 0x4004BE11);
    assert_eq!(vinstr::GET_BUFFER, 0x8010BE20);
    assert_eq!(vinstr::GET_BUFFER_WITH_CYCLES, 0x8020BE20);
    assert_eq!(vinstr::PUT_BUFFER, 0x4010BE21);
    assert_eq!(vinstr::SET_INTERVAL, 0x4004BE30);
    assert_eq!(vinstr::GET_API_VERSION, 0x4004BEFF);
    assert_eq!(vinstr::GET_API_VERSION_WITH_FEATURES, 0x4008BEFF);

    assert_eq!(kinstr_prfcnt::ISSUE_COMMAND, 0x4010BF00);
    assert_eq!(kinstr_prfcnt::GET_SAMPLE, 0x8010BF01);
    assert_eq!(kinstr_prfcnt::PUT_SAMPLE, 0x4010BF10);
}

#[test]
fn test_pre_r21_header() {
    let args = kbase_pre_r21::UkHwcntReaderSetup {
        buffer_count: 32,
        shader_bm: 0xff,
        ..Default::default()
    };
    let mut buf = [0; kbase_pre_r21::UkHwcntReaderSetup::SIZE];
    args.encode(&mut buf);
    assert_eq!(&buf[..4], &548u32.to_le_bytes());
    assert_eq!(&buf[8..12], &32u32.to_le_bytes());
    assert_eq!(&buf[16..20], &0xffu32.to_le_bytes());
    assert_eq!(&buf[28..32], &(-1i32).to_le_bytes());
}

#[test]
fn test_pre_r21_gpuprops() {
    let mut buf = [0; kbase_pre_r21::UkGpuprops::SIZE];
    buf[8 + 50] = 2;
    buf[8 + 232..8 + 236].copy_from_slice(&0x7212_0000u32.to_le_bytes());
    buf[8 + 260..8 + 264].copy_from_slice(&2u32.to_le_bytes());
    buf[8 + 272..8 + 280].copy_from_slice(&0b0011u64.to_le_bytes());
    buf[8 + 288..8 + 296].copy_from_slice(&0b1100u64.to_le_bytes());

    let props = kbase_pre_r21::UkGpuprops::decode(&buf);
    assert_eq!(props.num_l2_slices, 2);
    assert_eq!(props.gpu_id, 0x7212_0000);
    assert_eq!(props.num_core_groups, 2);
    assert_eq!(props.core_mask[0], 0b0011);
    assert_eq!(props.core_mask[1], 0b1100);
}

#[test]
fn test_reader_metadata_with_cycles() {
    let mut buf = [0; ReaderMetadataWithCycles::SIZE];
    buf[..8].copy_from_slice(&1000u64.to_le_bytes());
    buf[12..16].copy_from_slice(&7u32.to_le_bytes());
    buf[16..24].copy_from_slice(&11u64.to_le_bytes());
    buf[24..32].copy_from_slice(&13u64.to_le_bytes());

    let metadata = ReaderMetadataWithCycles::decode(&buf);
    assert_eq!(metadata.metadata.timestamp, 1000);
    assert_eq!(metadata.metadata.event_id, 0);
    assert_eq!(metadata.metadata.buffer_idx, 7);
    assert_eq!(metadata.top, 11);
    assert_eq!(metadata.shader_cores, 13);
}

#[test]
fn test_api_version_features() {
    let buf = [1, 0, 0, 0, 0b11, 0, 0, 0];
    let api = ApiVersion::decode(&buf);
    assert_eq!(api.version, 1);
    assert_eq!(
        api.features,
        ReaderFeatures::CYCLES_TOP | ReaderFeatures::CYCLES_SHADER_CORE
    );
}

#[test]
fn test_request_item_layout() {
    let mut buf = [0xAA; RequestItem::SIZE];
    RequestItem::Mode { period_ns: 1_000_000 }.encode(&mut buf);
    assert_eq!(&buf[..2], &0x1000u16.to_le_bytes());
    assert_eq!(buf[8], 1);
    assert_eq!(&buf[16..24], &1_000_000u64.to_le_bytes());

    let enable = RequestItem::Enable {
        ty: kinstr_prfcnt::block_type::SHADER_CORE,
        set: kinstr_prfcnt::set::SECONDARY,
        enable_mask: [0x1234, 0x5678],
    };
    enable.encode(&mut buf);
    assert_eq!(&buf[..2], &0x1001u16.to_le_bytes());
    assert_eq!(buf[8], 3);
    assert_eq!(buf[9], 1);
    assert_eq!(&buf[16..24], &0x1234u64.to_le_bytes());
    assert_eq!(&buf[24..32], &0x5678u64.to_le_bytes());
    assert_eq!(RequestItem::decode(&buf), enable);

    RequestItem::Sentinel.encode(&mut buf);
    assert!(buf.iter().all(|&b| b == 0));
}

#[test]
fn test_metadata_item_layout() {
    let mut buf = [0; MetadataItem::SIZE];
    let block = MetadataItem::Block {
        ty: kinstr_prfcnt::block_type::MEMORY,
        block_idx: 3,
        set: kinstr_prfcnt::set::PRIMARY,
        block_state: kinstr_prfcnt::block_state::ON,
        values_offset: 0x400,
    };
    block.encode(&mut buf);
    assert_eq!(&buf[..2], &0x2002u16.to_le_bytes());
    assert_eq!(buf[8], 2);
    assert_eq!(buf[9], 3);
    assert_eq!(&buf[12..16], &1u32.to_le_bytes());
    assert_eq!(&buf[16..20], &0x400u32.to_le_bytes());
    assert_eq!(MetadataItem::decode(&buf), block);

    buf = [0; MetadataItem::SIZE];
    assert_eq!(MetadataItem::decode(&buf), MetadataItem::None);
}

#[test]
fn test_enum_item_unknown() {
    let mut buf = [0; EnumItem::SIZE];
    buf[..2].copy_from_slice(&0x0007u16.to_le_bytes());
    assert_eq!(EnumItem::decode(&buf), EnumItem::Unknown(7));
}
