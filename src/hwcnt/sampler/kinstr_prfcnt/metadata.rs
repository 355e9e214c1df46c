use std::io::Result;

use super::convert::{block_type_from_wire, sample_flags, set_from_wire};
use super::BlockIndexRemap;
use crate::error::{invalid_data, ParseError};
use crate::ffi::ioctl::kinstr_prfcnt::MetadataItem;
use crate::ffi::Wire;
use crate::hwcnt::{BlockExtents, SampleMetadata, NUM_BLOCK_TYPES};

// Sample, clock and the terminating item.
const NON_BLOCK_ITEMS: usize = 3;

const GPU_CYCLE_DOMAIN: usize = 0;
const SC_CYCLE_DOMAIN: usize = 1;

struct Parser<'a> {
    result: SampleMetadata,
    extents: &'a BlockExtents,
    remap: BlockIndexRemap,
    num_blocks: usize,
    num_blocks_of_type: [u8; NUM_BLOCK_TYPES],
    parsed_sample: bool,
    parsed_clock: bool,
    parsed_sentinel: bool,
}

impl Parser<'_> {
    fn on_item(&mut self, item: MetadataItem) -> Result<()> {
        if self.parsed_sentinel {
            return Err(invalid_data(ParseError::AfterSentinel));
        }

        match item {
            MetadataItem::None => {
                self.parsed_sentinel = true;
                Ok(())
            }
            MetadataItem::Sample {
                timestamp_start,
                timestamp_end,
                seq,
                user_data,
                flags,
            } => {
                if self.parsed_sample {
                    return Err(invalid_data(ParseError::Duplicate("sample")));
                }
                self.result.user_data = user_data;
                self.result.flags = sample_flags(flags);
                self.result.sample_nr = seq;
                self.result.timestamp_ns_begin = timestamp_start;
                self.result.timestamp_ns_end = timestamp_end;
                self.parsed_sample = true;
                Ok(())
            }
            MetadataItem::Clock {
                num_domains,
                cycles,
            } => {
                if self.parsed_clock {
                    return Err(invalid_data(ParseError::Duplicate("clock")));
                }
                let num_domains = num_domains as usize;
                if num_domains > GPU_CYCLE_DOMAIN {
                    self.result.gpu_cycle = cycles[GPU_CYCLE_DOMAIN];
                    self.result.sc_cycle = cycles[GPU_CYCLE_DOMAIN];
                }
                if num_domains > SC_CYCLE_DOMAIN {
                    self.result.sc_cycle = cycles[SC_CYCLE_DOMAIN];
                }
                self.parsed_clock = true;
                Ok(())
            }
            MetadataItem::Block {
                ty, block_idx, set, ..
            } => {
                let ty = block_type_from_wire(ty)?;
                set_from_wire(set)?;
                let index = self.remap.remap(ty, block_idx)?;

                // Blocks of a type come densely and in order.
                let seen = &mut self.num_blocks_of_type[ty.idx()];
                if *seen != index || index >= self.extents.num_blocks_of_type(ty) {
                    return Err(invalid_data(ParseError::BlockOrder { ty, index }));
                }
                *seen += 1;
                self.num_blocks += 1;
                Ok(())
            }
            MetadataItem::Unknown(item_type) => Err(invalid_data(ParseError::UnknownItem(item_type))),
        }
    }

    fn done(self) -> Result<SampleMetadata> {
        if !self.parsed_sample {
            return Err(invalid_data(ParseError::Missing("sample")));
        }
        if !self.parsed_clock {
            return Err(invalid_data(ParseError::Missing("clock")));
        }
        if self.num_blocks != self.extents.num_blocks() {
            return Err(invalid_data(ParseError::BlockCount(
                self.num_blocks,
                self.extents.num_blocks(),
            )));
        }
        Ok(self.result)
    }
}

/// Parses the metadata list of the sample at `offset` into the mapping.
pub(super) fn parse_metadata(
    mapping: &[u8],
    offset: usize,
    item_size: usize,
    extents: &BlockExtents,
    remap: BlockIndexRemap,
) -> Result<SampleMetadata> {
    if item_size < MetadataItem::SIZE {
        return Err(invalid_data(ParseError::ItemSize(item_size as u32)));
    }

    let mut parser = Parser {
        result: SampleMetadata::default(),
        extents,
        remap,
        num_blocks: 0,
        num_blocks_of_type: [0; NUM_BLOCK_TYPES],
        parsed_sample: false,
        parsed_clock: false,
        parsed_sentinel: false,
    };

    for i in 0..extents.num_blocks() + NON_BLOCK_ITEMS {
        let item = i
            .checked_mul(item_size)
            .and_then(|it| it.checked_add(offset))
            .and_then(|start| Some(start..start.checked_add(MetadataItem::SIZE)?))
            .and_then(|range| mapping.get(range))
            .ok_or_else(|| invalid_data(ParseError::OutOfBounds))?;
        parser.on_item(MetadataItem::decode(item))?;
    }
    parser.done()
}
