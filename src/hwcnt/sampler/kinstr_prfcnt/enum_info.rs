//! Counter enumeration reported by `KINSTR_PRFCNT_ENUM_INFO`.

use std::io::{Error, ErrorKind, Result};
use std::os::fd::RawFd;

use super::convert::{block_type_from_wire, set_from_wire};
use crate::error::{invalid_data, ParseError};
use crate::ffi::ioctl::kbase::{self, KinstrPrfcntEnumInfo};
use crate::ffi::ioctl::kinstr_prfcnt::{request_type, EnumItem, API_VERSION, MAX_REPORTED_DOMAINS};
use crate::ffi::ioctl::ioctl_wire;
use crate::ffi::{Syscall, Wire};
use crate::hwcnt::{BlockExtents, PrfcntSet, SampleValuesType, NUM_BLOCK_TYPES};

/// Counter blocks and clocks a kinstr_prfcnt driver can sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnumInfo {
    /// Counter set shared by every block.
    pub set: PrfcntSet,
    /// Counters per block.
    pub num_values: u16,
    pub num_blocks_of_type: [u8; NUM_BLOCK_TYPES],
    pub has_cycles_top: bool,
    pub has_cycles_sc: bool,
}

impl EnumInfo {
    /// Kinstr_prfcnt counters are 64 bits wide.
    pub fn block_extents(&self) -> BlockExtents {
        BlockExtents::new(self.num_blocks_of_type, self.num_values, SampleValuesType::U64)
    }
}

const NUM_REQUESTS: usize = 2;

#[derive(Default)]
struct Parser {
    result: EnumInfo,
    parsed_blocks: [bool; NUM_BLOCK_TYPES],
    parsed_requests: [bool; NUM_REQUESTS],
    parsed_sample_info: bool,
    parsed_sentinel: bool,
}

impl Parser {
    fn on_item(&mut self, item: EnumItem) -> Result<()> {
        if self.parsed_sentinel {
            return Err(invalid_data(ParseError::AfterSentinel));
        }

        match item {
            EnumItem::BlockCounter {
                ty,
                set,
                num_instances,
                num_values,
                ..
            } => self.on_block(ty, set, num_instances, num_values),
            EnumItem::Request {
                request_item_type,
                versions_mask,
            } => self.on_request(request_item_type, versions_mask),
            EnumItem::SampleInfo { num_clock_domains } => self.on_sample_info(num_clock_domains),
            EnumItem::Unknown(item_type) => Err(invalid_data(ParseError::UnknownItem(item_type))),
        }
    }

    fn on_block(&mut self, ty: u8, set: u8, num_instances: u16, num_values: u16) -> Result<()> {
        if num_instances == 0 && num_values == 0 {
            self.parsed_sentinel = true;
            return Ok(());
        }

        let set = set_from_wire(set)?;
        if !self.parsed_blocks.contains(&true) {
            self.result.set = set;
            self.result.num_values = num_values;
        }
        if self.result.set != set {
            return Err(invalid_data(ParseError::Inconsistent("counter set")));
        }
        if self.result.num_values != num_values {
            return Err(invalid_data(ParseError::Inconsistent("counter count")));
        }

        let ty = block_type_from_wire(ty)?;
        let parsed = &mut self.parsed_blocks[ty.idx()];
        if *parsed {
            return Err(invalid_data(ParseError::Duplicate("block")));
        }
        let num_instances = u8::try_from(num_instances)
            .map_err(|_| invalid_data(ParseError::TooManyInstances(num_instances)))?;

        *parsed = true;
        self.result.num_blocks_of_type[ty.idx()] = num_instances;
        Ok(())
    }

    fn on_request(&mut self, request_item_type: u16, versions_mask: u32) -> Result<()> {
        let slot = match request_item_type {
            request_type::MODE => 0,
            request_type::ENABLE => 1,
            _ => return Ok(()),
        };

        if versions_mask & (1 << API_VERSION) == 0 {
            return Err(Error::new(
                ErrorKind::Unsupported,
                ParseError::UnsupportedRequest(request_item_type),
            ));
        }
        if self.parsed_requests[slot] {
            return Err(invalid_data(ParseError::Duplicate("request")));
        }
        self.parsed_requests[slot] = true;
        Ok(())
    }

    fn on_sample_info(&mut self, num_clock_domains: u32) -> Result<()> {
        if self.parsed_sample_info {
            return Err(invalid_data(ParseError::Duplicate("sample info")));
        }
        if num_clock_domains as usize > MAX_REPORTED_DOMAINS {
            return Err(invalid_data(ParseError::TooManyClockDomains(num_clock_domains)));
        }
        self.result.has_cycles_top = num_clock_domains >= 1;
        self.result.has_cycles_sc = num_clock_domains >= 2;
        self.parsed_sample_info = true;
        Ok(())
    }

    fn done(self) -> Result<EnumInfo> {
        if self.parsed_requests.contains(&false) {
            return Err(invalid_data(ParseError::Missing("request")));
        }
        if !self.parsed_sample_info {
            return Err(invalid_data(ParseError::Missing("sample info")));
        }
        if !self.parsed_sentinel {
            return Err(invalid_data(ParseError::Missing("sentinel")));
        }
        Ok(self.result)
    }
}

/// Parses an enumeration list of `item_size` byte records.
pub(crate) fn parse_enum_items(list: &[u8], item_size: usize) -> Result<EnumInfo> {
    if item_size < EnumItem::SIZE {
        return Err(invalid_data(ParseError::ItemSize(item_size as u32)));
    }

    let mut parser = Parser::default();
    for item in list.chunks_exact(item_size) {
        parser.on_item(EnumItem::decode(&item[..EnumItem::SIZE]))?;
    }
    parser.done()
}

/// Queries and parses the enumeration list of the device at `fd`.
pub(crate) fn parse_enum_info<S: Syscall>(sys: &S, fd: RawFd) -> Result<EnumInfo> {
    let mut ei = KinstrPrfcntEnumInfo::default();
    ioctl_wire(sys, fd, kbase::KINSTR_PRFCNT_ENUM_INFO, &mut ei)?;

    let item_size = ei.info_item_size as usize;
    if item_size < EnumItem::SIZE {
        return Err(invalid_data(ParseError::ItemSize(ei.info_item_size)));
    }

    let mut list = vec![0u8; item_size * ei.info_item_count as usize];
    ei.info_list_ptr = list.as_mut_ptr() as u64;
    ioctl_wire(sys, fd, kbase::KINSTR_PRFCNT_ENUM_INFO, &mut ei)?;

    let info = parse_enum_items(&list, item_size)?;
    log::debug!(
        "Counter enumeration: set {:?}, {} values, blocks {:?}",
        info.set,
        info.num_values,
        info.num_blocks_of_type
    );
    Ok(info)
}
