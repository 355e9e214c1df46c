//! Conversions between the public counter model and kinstr_prfcnt wire values.

use std::io::Result;

use crate::error::{invalid_data, ParseError};
use crate::ffi::ioctl::kinstr_prfcnt::{block_state as wire_state, block_type, sample_flag, set};
use crate::ffi::ioctl::kinstr_prfcnt::RequestItem;
use crate::hwcnt::sampler::Configuration;
use crate::hwcnt::{BlockState, BlockType, PrfcntSet, SampleFlags};

pub(super) fn block_type_to_wire(ty: BlockType) -> u8 {
    match ty {
        BlockType::Fe => block_type::FE,
        BlockType::Tiler => block_type::TILER,
        BlockType::Memory => block_type::MEMORY,
        BlockType::Core => block_type::SHADER_CORE,
    }
}

pub(super) fn block_type_from_wire(raw: u8) -> Result<BlockType> {
    match raw {
        block_type::FE => Ok(BlockType::Fe),
        block_type::TILER => Ok(BlockType::Tiler),
        block_type::MEMORY => Ok(BlockType::Memory),
        block_type::SHADER_CORE => Ok(BlockType::Core),
        _ => Err(invalid_data(ParseError::UnknownBlockType(raw))),
    }
}

pub(super) fn set_to_wire(value: PrfcntSet) -> u8 {
    match value {
        PrfcntSet::Primary => set::PRIMARY,
        PrfcntSet::Secondary => set::SECONDARY,
        PrfcntSet::Tertiary => set::TERTIARY,
    }
}

pub(super) fn set_from_wire(raw: u8) -> Result<PrfcntSet> {
    match raw {
        set::PRIMARY => Ok(PrfcntSet::Primary),
        set::SECONDARY => Ok(PrfcntSet::Secondary),
        set::TERTIARY => Ok(PrfcntSet::Tertiary),
        _ => Err(invalid_data(ParseError::UnknownSet(raw))),
    }
}

pub(super) fn block_state(raw: u32) -> BlockState {
    const MAPPING: [(u32, BlockState); 6] = [
        (wire_state::ON, BlockState::ON),
        (wire_state::OFF, BlockState::OFF),
        (wire_state::AVAILABLE, BlockState::AVAILABLE),
        (wire_state::UNAVAILABLE, BlockState::UNAVAILABLE),
        (wire_state::NORMAL_MODE, BlockState::NORMAL),
        (wire_state::PROTECTED_MODE, BlockState::PROTECTED),
    ];
    MAPPING
        .into_iter()
        .filter(|(bit, _)| raw & bit != 0)
        .fold(BlockState::empty(), |acc, (_, state)| acc | state)
}

pub(super) fn sample_flags(raw: u32) -> SampleFlags {
    let mut flags = SampleFlags::empty();
    flags.set(SampleFlags::STRETCHED, raw & sample_flag::OVERFLOW != 0);
    flags.set(SampleFlags::ERROR, raw & sample_flag::ERROR != 0);
    flags
}

/// Splits a 128-bit enable map into the low and high words of the request.
pub(super) fn mask_to_wire(mask: u128) -> [u64; 2] {
    [mask as u64, (mask >> 64) as u64]
}

pub(super) fn request(config: &Configuration) -> RequestItem {
    RequestItem::Enable {
        ty: block_type_to_wire(config.ty),
        set: set_to_wire(config.set),
        enable_mask: mask_to_wire(config.enable_map),
    }
}
