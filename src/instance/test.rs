use std::cell::RefCell;
use std::io::ErrorKind;
use std::ptr;
use std::rc::Rc;
use std::slice;

use super::props::{decode_props, from_uk, fw_version, prop_id, read_constants};
use super::{set_flags, version_check, warp_width, Instance};
use crate::ffi::ioctl::kbase::{self, GetGpuprops, KinstrPrfcntEnumInfo, SetFlags, VersionCheck};
use crate::ffi::ioctl::kbase_pre_r21::{self, SetFlagsArgs, UkGpuprops, VersionCheckArgs};
use crate::ffi::ioctl::kinstr_prfcnt::{self, block_state, block_type, request_type, set};
use crate::ffi::ioctl::kinstr_prfcnt::{EnumItem, MetadataItem, SampleAccess};
use crate::ffi::mock::{Call, MockSys};
use crate::ffi::Wire;
use crate::handle::Handle;
use crate::hwcnt::{BackendType, BlockType};
use crate::product::ProductId;
use crate::version::{IoctlIfaceType, KbaseVersion};

const DEVICE_FD: i32 = 42;

fn gpu_id(product: ProductId) -> u64 {
    (product.raw() as u64) << 16
}

fn prop(stream: &mut Vec<u8>, id: u32, value: u64, size_code: u32) {
    stream.extend_from_slice(&(id << 2 | size_code).to_le_bytes());
    let bytes = value.to_le_bytes();
    stream.extend_from_slice(&bytes[..1 << size_code]);
}

fn props_stream(product: ProductId) -> Vec<u8> {
    let mut stream = Vec::new();
    prop(&mut stream, prop_id::RAW_GPU_ID, gpu_id(product), 3);
    // Minor revision, not consumed.
    prop(&mut stream, 2, 7, 1);
    prop(&mut stream, prop_id::L2_LOG2_CACHE_SIZE, 16, 0);
    prop(&mut stream, prop_id::L2_NUM_L2_SLICES, 2, 0);
    prop(&mut stream, prop_id::RAW_L2_FEATURES, 0x0700_0000, 2);
    prop(&mut stream, prop_id::COHERENCY_NUM_CORE_GROUPS, 1, 0);
    prop(&mut stream, prop_id::COHERENCY_GROUP_0, 0b1011, 3);
    prop(&mut stream, prop_id::COHERENCY_GROUP_0 + 1, 0b1_0000, 3);
    stream
}

fn serve_props(sys: &MockSys, stream: Vec<u8>) {
    sys.on_ioctl(kbase::GET_GPUPROPS, move |_, buf| {
        let args = GetGpuprops::decode(buf);
        if args.buffer == 0 {
            return Ok(stream.len() as i32);
        }
        let n = stream.len().min(args.size as usize);
        unsafe { ptr::copy_nonoverlapping(stream.as_ptr(), args.buffer as *mut u8, n) };
        Ok(n as i32)
    });
}

fn serve_version(sys: &MockSys, op: u64, major: u16, minor: u16) {
    sys.reply(op, 0, VersionCheck { major, minor });
}

#[test]
fn test_version_check_order() {
    let sys = MockSys::new();
    sys.reply(kbase_pre_r21::VERSION_CHECK, 0, VersionCheckArgs::default());
    serve_version(&sys, kbase::VERSION_CHECK_JM, 0, 0);
    serve_version(&sys, kbase::VERSION_CHECK_CSF, 1, 10);

    let version = version_check(&&sys, DEVICE_FD).unwrap();
    assert_eq!(version.ty(), IoctlIfaceType::Csf);
    assert_eq!((version.major(), version.minor()), (1, 10));

    let ops = [
        kbase_pre_r21::VERSION_CHECK,
        kbase::VERSION_CHECK_JM,
        kbase::VERSION_CHECK_CSF,
    ];
    let expected: Vec<_> = ops.into_iter().map(|op| Call::Ioctl { fd: DEVICE_FD, op }).collect();
    assert_eq!(sys.calls(), expected);
}

#[test]
fn test_version_check_pre_r21() {
    let sys = MockSys::new();
    sys.reply(
        kbase_pre_r21::VERSION_CHECK,
        0,
        VersionCheckArgs { major: 10, minor: 4 },
    );

    let version = version_check(&&sys, DEVICE_FD).unwrap();
    assert!(version.is_pre_r21());
    assert_eq!(version, KbaseVersion::new(10, 4, IoctlIfaceType::JmPreR21));
    assert_eq!(sys.count(kbase::VERSION_CHECK_JM), 0);
}

#[test]
fn test_version_check_old_legacy_driver() {
    let sys = MockSys::new();
    sys.reply(
        kbase_pre_r21::VERSION_CHECK,
        0,
        VersionCheckArgs { major: 10, minor: 1 },
    );
    serve_version(&sys, kbase::VERSION_CHECK_JM, 11, 20);

    let version = version_check(&&sys, DEVICE_FD).unwrap();
    assert_eq!(version.ty(), IoctlIfaceType::JmPostR21);
    assert_eq!((version.major(), version.minor()), (11, 20));
}

#[test]
fn test_version_check_unknown() {
    let sys = MockSys::new();
    let e = version_check(&&sys, DEVICE_FD).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Unsupported);
    assert_eq!(sys.calls().len(), 3);
}

#[test]
fn test_set_flags() {
    let sys = MockSys::new();
    let flags = Rc::new(RefCell::new(Vec::new()));
    let recorded = flags.clone();
    sys.on_ioctl(kbase::SET_FLAGS, move |_, buf| {
        recorded.borrow_mut().push(SetFlags::decode(buf).create_flags);
        Ok(0)
    });

    let version = KbaseVersion::new(11, 20, IoctlIfaceType::JmPostR21);
    set_flags(&&sys, DEVICE_FD, &version).unwrap();
    assert_eq!(*flags.borrow(), vec![1 << 1]);
}

#[test]
fn test_set_flags_ignored_errors() {
    let post_r21 = KbaseVersion::new(11, 20, IoctlIfaceType::JmPostR21);
    let pre_r21 = KbaseVersion::new(10, 6, IoctlIfaceType::JmPreR21);

    let sys = MockSys::new();
    for errno in [libc::EPERM, libc::EINVAL] {
        sys.fail_ioctl(kbase::SET_FLAGS, errno);
        set_flags(&&sys, DEVICE_FD, &post_r21).unwrap();
    }

    sys.fail_ioctl(kbase::SET_FLAGS, libc::EFAULT);
    let e = set_flags(&&sys, DEVICE_FD, &post_r21).unwrap_err();
    assert_eq!(e.raw_os_error(), Some(libc::EFAULT));

    sys.fail_ioctl(kbase_pre_r21::SET_FLAGS, libc::EFAULT);
    set_flags(&&sys, DEVICE_FD, &pre_r21).unwrap();

    sys.fail_ioctl(kbase_pre_r21::SET_FLAGS, libc::EIO);
    let e = set_flags(&&sys, DEVICE_FD, &pre_r21).unwrap_err();
    assert_eq!(e.raw_os_error(), Some(libc::EIO));
}

#[test]
fn test_set_flags_pre_r21_header() {
    let sys = MockSys::new();
    let header = Rc::new(RefCell::new(None));
    let recorded = header.clone();
    sys.on_ioctl(kbase_pre_r21::SET_FLAGS, move |_, buf| {
        let id = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        *recorded.borrow_mut() = Some((id, SetFlagsArgs::decode(buf).create_flags));
        Ok(0)
    });

    let version = KbaseVersion::new(10, 6, IoctlIfaceType::JmPreR21);
    set_flags(&&sys, DEVICE_FD, &version).unwrap();
    assert_eq!(
        *header.borrow(),
        Some((kbase_pre_r21::header_id::SET_FLAGS, 1 << 1))
    );
}

#[test]
fn test_decode_props() {
    let constants = decode_props(&props_stream(ProductId::G72)).unwrap();
    assert_eq!(constants.gpu_id, gpu_id(ProductId::G72));
    assert_eq!(constants.warp_width, 4);
    assert_eq!(constants.l2_slice_size, 1 << 16);
    assert_eq!(constants.num_l2_slices, 2);
    assert_eq!(constants.axi_bus_width, 128);
    // Only the first core group is populated.
    assert_eq!(constants.shader_core_mask, 0b1011);
    assert_eq!(constants.num_shader_cores, 3);
    assert_eq!(constants.tile_size, 16);
    assert_eq!(constants.fw_version, 0);
}

#[test]
fn test_decode_props_truncated() {
    let mut stream = props_stream(ProductId::G72);
    stream.truncate(stream.len() - 3);
    let e = decode_props(&stream).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::InvalidData);

    // A key without its value.
    let stream = (prop_id::RAW_GPU_ID << 2 | 3).to_le_bytes();
    let e = decode_props(&stream).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::InvalidData);

    let e = decode_props(&[0x1, 0x2]).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::InvalidData);
}

#[test]
fn test_decode_props_unknown_product() {
    let mut stream = Vec::new();
    prop(&mut stream, prop_id::RAW_GPU_ID, gpu_id(ProductId::from_versions(8, 0)), 3);
    let e = decode_props(&stream).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Unsupported);
}

#[test]
fn test_warp_width() {
    assert_eq!(warp_width(gpu_id(ProductId::T880)).unwrap(), 1);
    assert_eq!(warp_width(gpu_id(ProductId::T60X)).unwrap(), 1);
    assert_eq!(warp_width(gpu_id(ProductId::G31)).unwrap(), 4);
    assert_eq!(warp_width(gpu_id(ProductId::G68)).unwrap(), 4);
    assert_eq!(warp_width(gpu_id(ProductId::G76)).unwrap(), 8);
    assert_eq!(warp_width(gpu_id(ProductId::G52)).unwrap(), 8);
    assert_eq!(warp_width(gpu_id(ProductId::G57_2)).unwrap(), 16);
    assert_eq!(warp_width(gpu_id(ProductId::G715)).unwrap(), 16);
    assert_eq!(warp_width(gpu_id(ProductId::from_versions(12, 0))).unwrap(), 16);

    let e = warp_width(gpu_id(ProductId::from_versions(11, 9))).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Unsupported);
}

#[test]
fn test_props_pre_r21() {
    let mut props = UkGpuprops {
        log2_cache_size: 15,
        num_l2_slices: 1,
        l2_features: 0x0600_0000,
        gpu_id: 0x0880_0000,
        num_core_groups: 2,
        ..Default::default()
    };
    props.core_mask[0] = 0b0011;
    props.core_mask[1] = 0b1100;
    props.core_mask[2] = 0b1_0000;

    let constants = from_uk(&props).unwrap();
    assert_eq!(constants.gpu_id, 0x0880_0000);
    assert_eq!(ProductId::from_raw_gpu_id(constants.gpu_id), ProductId::T880);
    assert_eq!(constants.warp_width, 1);
    assert_eq!(constants.l2_slice_size, 1 << 15);
    assert_eq!(constants.axi_bus_width, 64);
    assert_eq!(constants.shader_core_mask, 0b1111);
    assert_eq!(constants.num_shader_cores, 4);
}

#[test]
fn test_read_constants_post_r21() {
    let sys = MockSys::new();
    serve_props(&sys, props_stream(ProductId::G76));

    let version = KbaseVersion::new(11, 20, IoctlIfaceType::JmPostR21);
    let constants = read_constants(&&sys, DEVICE_FD, &version).unwrap();
    assert_eq!(constants.warp_width, 8);
    assert_eq!(constants.num_shader_cores, 3);
    assert_eq!(sys.count(kbase::GET_GPUPROPS), 2);
    assert_eq!(sys.count(kbase::CS_GET_GLB_IFACE), 0);
}

#[test]
fn test_fw_version() {
    let csf = KbaseVersion::new(1, 10, IoctlIfaceType::Csf);
    let jm = KbaseVersion::new(11, 20, IoctlIfaceType::JmPostR21);

    let sys = MockSys::new();
    assert_eq!(fw_version(&&sys, DEVICE_FD, &csf), 0);
    assert_eq!(fw_version(&&sys, DEVICE_FD, &jm), 0);
    assert_eq!(sys.count(kbase::CS_GET_GLB_IFACE), 1);

    sys.on_ioctl(kbase::CS_GET_GLB_IFACE, |_, buf| {
        buf[..4].copy_from_slice(&0x0001_0002u32.to_le_bytes());
        Ok(0)
    });
    assert_eq!(fw_version(&&sys, DEVICE_FD, &csf), 0x0001_0002);
    assert_eq!(fw_version(&&sys, DEVICE_FD, &jm), 0);
}

#[test]
fn test_instance_vinstr() {
    let sys = MockSys::new();
    serve_version(&sys, kbase::VERSION_CHECK_JM, 11, 20);
    sys.on_ioctl(kbase::SET_FLAGS, |_, _| Ok(0));
    serve_props(&sys, props_stream(ProductId::G72));

    let handle = Handle::open_with(&sys, "/dev/mali0").unwrap();
    let instance = Instance::new(&handle).unwrap();

    assert_eq!(instance.fd(), DEVICE_FD);
    assert_eq!(instance.backend_type(), BackendType::Vinstr);
    assert_eq!(instance.product_id(), ProductId::G72);
    assert_eq!(instance.constants().num_shader_cores, 3);
    assert!(instance.enum_info().is_none());

    let extents = instance.block_extents();
    assert_eq!(extents.num_blocks_of_type(BlockType::Fe), 1);
    assert_eq!(extents.num_blocks_of_type(BlockType::Tiler), 1);
    assert_eq!(extents.num_blocks_of_type(BlockType::Memory), 2);
    assert_eq!(extents.num_blocks_of_type(BlockType::Core), 3);
}

#[test]
fn test_instance_set_flags_failure() {
    let sys = MockSys::new();
    serve_version(&sys, kbase::VERSION_CHECK_JM, 11, 20);
    sys.fail_ioctl(kbase::SET_FLAGS, libc::ENOMEM);

    let handle = Handle::open_with(&sys, "/dev/mali0").unwrap();
    let e = Instance::new(&handle).err().unwrap();
    assert_eq!(e.raw_os_error(), Some(libc::ENOMEM));
    assert_eq!(sys.count(kbase::GET_GPUPROPS), 0);
}

const READER_FD: i32 = 44;
const ITEM_SIZE: usize = MetadataItem::SIZE;

fn encode_list<T: Wire>(items: &[T]) -> Vec<u8> {
    let mut list = vec![0u8; items.len() * T::SIZE];
    for (item, buf) in items.iter().zip(list.chunks_exact_mut(T::SIZE)) {
        item.encode(buf);
    }
    list
}

fn enum_block(ty: u8, num_instances: u16) -> EnumItem {
    EnumItem::BlockCounter {
        ty,
        set: set::PRIMARY,
        num_instances,
        num_values: 64,
        counter_mask: [u64::MAX, 0],
    }
}

fn enum_items() -> Vec<EnumItem> {
    vec![
        enum_block(block_type::FE, 1),
        enum_block(block_type::TILER, 1),
        enum_block(block_type::MEMORY, 1),
        enum_block(block_type::SHADER_CORE, 2),
        EnumItem::Request {
            request_item_type: request_type::MODE,
            versions_mask: 1,
        },
        EnumItem::Request {
            request_item_type: request_type::ENABLE,
            versions_mask: 1,
        },
        EnumItem::SampleInfo {
            num_clock_domains: 1,
        },
        EnumItem::BlockCounter {
            ty: 0,
            set: 0,
            num_instances: 0,
            num_values: 0,
            counter_mask: [0; 2],
        },
    ]
}

fn core_item(block_idx: u8, values_offset: u32) -> MetadataItem {
    MetadataItem::Block {
        ty: block_type::SHADER_CORE,
        block_idx,
        set: set::PRIMARY,
        block_state: block_state::ON,
        values_offset,
    }
}

// Scripts a CSF G715 driver with a kinstr_prfcnt interface. A reader
// sample is served unless `sample_ok` is false.
fn kinstr_driver(sample_ok: bool) -> MockSys {
    let sys = MockSys::new();
    serve_version(&sys, kbase::VERSION_CHECK_CSF, 1, 17);
    sys.on_ioctl(kbase::SET_FLAGS, |_, _| Ok(0));
    serve_props(&sys, props_stream(ProductId::G715));

    let items = enum_items();
    sys.on_ioctl(kbase::KINSTR_PRFCNT_ENUM_INFO, move |_, buf| {
        let mut ei = KinstrPrfcntEnumInfo::decode(buf);
        if ei.info_list_ptr != 0 {
            let list = encode_list(&items);
            let dst = unsafe { slice::from_raw_parts_mut(ei.info_list_ptr as *mut u8, list.len()) };
            dst.copy_from_slice(&list);
        }
        ei.info_item_size = EnumItem::SIZE as u32;
        ei.info_item_count = items.len() as u32;
        ei.encode(buf);
        Ok(0)
    });

    sys.on_ioctl(kbase::KINSTR_PRFCNT_SETUP, |_, buf| {
        buf[..4].copy_from_slice(&(ITEM_SIZE as u32).to_le_bytes());
        buf[4..8].copy_from_slice(&4096u32.to_le_bytes());
        Ok(READER_FD)
    });
    sys.on_ioctl(kinstr_prfcnt::ISSUE_COMMAND, |_, _| Ok(0));
    sys.on_ioctl(kinstr_prfcnt::PUT_SAMPLE, |_, _| Ok(0));

    if sample_ok {
        sys.reply(
            kinstr_prfcnt::GET_SAMPLE,
            0,
            SampleAccess {
                sequence: 0,
                sample_offset_bytes: 0,
            },
        );
    } else {
        sys.fail_ioctl(kinstr_prfcnt::GET_SAMPLE, libc::EIO);
    }

    let metadata = [
        MetadataItem::Sample {
            timestamp_start: 100,
            timestamp_end: 200,
            seq: 0,
            user_data: 0,
            flags: 0,
        },
        MetadataItem::Clock {
            num_domains: 1,
            cycles: [10, 0, 0, 0],
        },
        core_item(0, 1024),
        core_item(1, 1536),
        MetadataItem::None,
    ];
    let mut mapping = encode_list(&metadata);
    mapping.resize(4096, 0);
    sys.set_mapping(mapping);
    sys
}

#[test]
fn test_instance_kinstr_prfcnt() {
    let sys = kinstr_driver(true);
    let handle = Handle::open_with(&sys, "/dev/mali0").unwrap();
    let instance = Instance::new(&handle).unwrap();

    assert_eq!(instance.backend_type(), BackendType::KinstrPrfcnt);
    assert_eq!(instance.version(), KbaseVersion::new(1, 17, IoctlIfaceType::Csf));
    assert_eq!(instance.enum_info().map(|ei| ei.num_values), Some(64));
    assert_eq!(instance.block_extents().num_blocks_of_type(BlockType::Core), 2);

    // The test sampler is released before the instance is returned.
    assert_eq!(sys.count(kinstr_prfcnt::PUT_SAMPLE), 1);
    assert!(sys.closed().contains(&READER_FD));
    assert!(sys.calls().contains(&Call::Munmap { len: 4096 }));
}

#[test]
fn test_instance_kinstr_prfcnt_downgrade() {
    let sys = kinstr_driver(false);
    let handle = Handle::open_with(&sys, "/dev/mali0").unwrap();
    let instance = Instance::new(&handle).unwrap();

    assert_eq!(instance.backend_type(), BackendType::KinstrPrfcntWa);
    assert_eq!(sys.count(kinstr_prfcnt::PUT_SAMPLE), 0);
    assert!(sys.closed().contains(&READER_FD));
}

#[test]
fn test_instance_kinstr_prfcnt_setup_failure() {
    let sys = kinstr_driver(true);
    sys.fail_ioctl(kbase::KINSTR_PRFCNT_SETUP, libc::EINVAL);

    let handle = Handle::open_with(&sys, "/dev/mali0").unwrap();
    let e = Instance::new(&handle).err().unwrap();
    assert_eq!(e.kind(), ErrorKind::InvalidInput);
}
