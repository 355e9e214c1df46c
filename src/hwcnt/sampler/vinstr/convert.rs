use std::io::Result;

use crate::error::{unsupported, ConfigError};
use crate::ffi::ioctl::kbase::HwcntReaderSetup;
use crate::hwcnt::sampler::Configuration;
use crate::hwcnt::{BlockType, PrfcntSet};

// Each vinstr enable bit covers four consecutive counters.
const COUNTERS_PER_BIT: u32 = 4;
const MASK_BITS: u32 = 32;

// Counter sets the vinstr interface can program for each block type.
const SUPPORTED_SETS: &[(BlockType, PrfcntSet)] = &[
    (BlockType::Fe, PrfcntSet::Primary),
    (BlockType::Tiler, PrfcntSet::Primary),
    (BlockType::Memory, PrfcntSet::Primary),
    (BlockType::Core, PrfcntSet::Primary),
];

fn is_set_supported(ty: BlockType, set: PrfcntSet) -> bool {
    SUPPORTED_SETS.contains(&(ty, set))
}

/// Folds a per-counter mask into the per-group mask of the reader setup.
pub(crate) fn convert_mask(mask: u128) -> u32 {
    (0..MASK_BITS)
        .filter(|i| (mask >> (i * COUNTERS_PER_BIT)) & 0b1111 != 0)
        .fold(0, |acc, i| acc | (1 << i))
}

pub(crate) fn convert(configs: &[Configuration]) -> Result<HwcntReaderSetup> {
    let mut result = HwcntReaderSetup::default();

    for config in configs {
        if !is_set_supported(config.ty, config.set) {
            return Err(unsupported(ConfigError::UnsupportedSet {
                ty: config.ty,
                set: config.set,
            }));
        }

        let mask = convert_mask(config.enable_map);
        match config.ty {
            BlockType::Fe => result.fe_bm |= mask,
            BlockType::Tiler => result.tiler_bm |= mask,
            BlockType::Memory => result.mmu_l2_bm |= mask,
            BlockType::Core => result.shader_bm |= mask,
        }
    }

    Ok(result)
}
