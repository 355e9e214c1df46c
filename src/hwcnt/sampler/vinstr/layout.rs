//! Placement of the blocks inside one vinstr dump.

use std::io::Result;

use arrayvec::ArrayVec;

use crate::error::{invalid_data, ParseError};
use crate::hwcnt::{BlockExtents, BlockType};

/// Size of one block, 64 counters of 32 bits.
pub(super) const BLOCK_SIZE: usize = 256;

const MAX_BLOCKS_FE: usize = 1;
const MAX_BLOCKS_TILER: usize = 1;
const MAX_BLOCKS_MEMORY: usize = 16;
const MAX_SHADER_CORES: usize = 64;
const MAX_BLOCKS: usize = MAX_BLOCKS_FE + MAX_BLOCKS_TILER + MAX_BLOCKS_MEMORY + MAX_SHADER_CORES;

// Shader core slots of the v4 layout.
const V4_SHADER_CORES: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum SampleLayoutType {
    /// Midgard parts up to the T760: cores first, front end last.
    V4,
    NonV4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct LayoutEntry {
    pub ty: BlockType,
    pub index: u8,
    /// Offset from the start of the dump.
    pub offset: usize,
}

/// Enabled blocks in the order they are reported.
///
/// Core indices are dense: the n-th present shader core gets index n
/// whatever its position in the shader core mask.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct SampleLayout {
    entries: ArrayVec<LayoutEntry, MAX_BLOCKS>,
}

impl SampleLayout {
    pub fn new(
        extents: &BlockExtents,
        num_l2_slices: u32,
        sc_mask: u64,
        ty: SampleLayoutType,
    ) -> Result<Self> {
        let mut layout = Self::default();
        match ty {
            SampleLayoutType::V4 => layout.fill_v4(extents, sc_mask)?,
            SampleLayoutType::NonV4 => layout.fill_non_v4(extents, num_l2_slices, sc_mask)?,
        }
        // Every block promised by the extents must be reachable.
        if layout.len() != extents.num_blocks() {
            return Err(invalid_data(ParseError::BlockCount(
                layout.len(),
                extents.num_blocks(),
            )));
        }
        Ok(layout)
    }

    pub fn get(&self, index: usize) -> Option<&LayoutEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn fill_v4(&mut self, extents: &BlockExtents, sc_mask: u64) -> Result<()> {
        let offset_sc = 0;
        if extents.num_blocks_of_type(BlockType::Core) != 0 {
            self.push_cores(offset_sc, sc_mask & 0b1111)?;
        }

        let offset_tiler = offset_sc + BLOCK_SIZE * V4_SHADER_CORES;
        if extents.num_blocks_of_type(BlockType::Tiler) != 0 {
            self.push(BlockType::Tiler, 0, offset_tiler)?;
        }

        let offset_memory = offset_tiler + BLOCK_SIZE;
        if extents.num_blocks_of_type(BlockType::Memory) != 0 {
            self.push(BlockType::Memory, 0, offset_memory)?;
        }

        let offset_fe = offset_memory + BLOCK_SIZE * 2;
        if extents.num_blocks_of_type(BlockType::Fe) != 0 {
            self.push(BlockType::Fe, 0, offset_fe)?;
        }

        Ok(())
    }

    fn fill_non_v4(&mut self, extents: &BlockExtents, num_l2_slices: u32, sc_mask: u64) -> Result<()> {
        let offset_fe = 0;
        if extents.num_blocks_of_type(BlockType::Fe) != 0 {
            self.push(BlockType::Fe, 0, offset_fe)?;
        }

        let offset_tiler = offset_fe + BLOCK_SIZE;
        if extents.num_blocks_of_type(BlockType::Tiler) != 0 {
            self.push(BlockType::Tiler, 0, offset_tiler)?;
        }

        let offset_memory = offset_tiler + BLOCK_SIZE;
        for i in 0..extents.num_blocks_of_type(BlockType::Memory) {
            self.push(BlockType::Memory, i, offset_memory + i as usize * BLOCK_SIZE)?;
        }

        let offset_sc = offset_memory + BLOCK_SIZE * num_l2_slices as usize;
        if extents.num_blocks_of_type(BlockType::Core) != 0 {
            self.push_cores(offset_sc, sc_mask)?;
        }

        Ok(())
    }

    fn push_cores(&mut self, offset_sc: usize, sc_mask: u64) -> Result<()> {
        let present = (0..MAX_SHADER_CORES).filter(|i| sc_mask & (1 << i) != 0);
        for (index, slot) in present.enumerate() {
            self.push(BlockType::Core, index as u8, offset_sc + BLOCK_SIZE * slot)?;
        }
        Ok(())
    }

    fn push(&mut self, ty: BlockType, index: u8, offset: usize) -> Result<()> {
        self.entries
            .try_push(LayoutEntry { ty, index, offset })
            .map_err(|_| invalid_data(ParseError::LayoutOverflow(MAX_BLOCKS)))
    }
}
