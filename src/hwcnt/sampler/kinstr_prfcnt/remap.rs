use std::io::Result;

use crate::error::{invalid_input, ConfigError};
use crate::hwcnt::BlockType;

/// Translation of the block indices the driver reports.
///
/// Some drivers number shader core blocks by their position in the shader
/// core mask instead of densely. `Sparse` folds those positions back to
/// dense indices, the n-th present core getting index n.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockIndexRemap {
    Nop,
    Sparse(u64),
}

impl BlockIndexRemap {
    pub fn remap(&self, ty: BlockType, index: u8) -> Result<u8> {
        let sc_mask = match *self {
            Self::Sparse(sc_mask) if ty == BlockType::Core => sc_mask,
            _ => return Ok(index),
        };

        if index >= u64::BITS as u8 || sc_mask & (1 << index) == 0 {
            return Err(invalid_input(ConfigError::AbsentBlock { ty, index }));
        }
        let below = sc_mask & ((1 << index) - 1);
        Ok(below.count_ones() as u8)
    }
}
