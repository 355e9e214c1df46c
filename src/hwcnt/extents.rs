use super::BlockType;
use crate::product::ProductId;

pub const NUM_BLOCK_TYPES: usize = 4;

/// Width of the counter values stored in a sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SampleValuesType {
    #[default]
    U32,
    U64,
}

impl SampleValuesType {
    pub const fn size(self) -> usize {
        match self {
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }
}

/// Number of blocks per type and the shape of each block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockExtents {
    num_blocks_of_type: [u8; NUM_BLOCK_TYPES],
    counters_per_block: u16,
    values_type: SampleValuesType,
}

impl BlockExtents {
    pub const fn new(
        num_blocks_of_type: [u8; NUM_BLOCK_TYPES],
        counters_per_block: u16,
        values_type: SampleValuesType,
    ) -> Self {
        Self {
            num_blocks_of_type,
            counters_per_block,
            values_type,
        }
    }

    pub fn num_blocks(&self) -> usize {
        self.num_blocks_of_type.iter().map(|&n| n as usize).sum()
    }

    pub fn num_blocks_of_type(&self, ty: BlockType) -> u8 {
        self.num_blocks_of_type[ty.idx()]
    }

    pub fn counters_per_block(&self) -> u16 {
        self.counters_per_block
    }

    pub fn values_type(&self) -> SampleValuesType {
        self.values_type
    }

    /// Size of one block of counter values in bytes.
    pub fn block_size(&self) -> usize {
        self.counters_per_block as usize * self.values_type.size()
    }

    pub(crate) fn with_num_blocks_of_type(mut self, ty: BlockType, num: u8) -> Self {
        self.num_blocks_of_type[ty.idx()] = num;
        self
    }
}

/// Counters in every vinstr block.
pub(crate) const VINSTR_COUNTERS_PER_BLOCK: u16 = 64;

/// Products whose vinstr dumps use the v4 layout, with a single memory block.
pub(crate) fn is_v4_layout(product: ProductId) -> bool {
    matches!(
        product,
        ProductId::T60X | ProductId::T62X | ProductId::T720 | ProductId::T760
    )
}

/// Block extents of a vinstr sampler.
///
/// Front end and tiler have one block each, memory has one block per L2
/// slice and cores have one block per shader core. Counters are 32 bits wide.
pub fn compute_block_extents(
    product: ProductId,
    num_l2_slices: u32,
    num_shader_cores: u32,
) -> BlockExtents {
    let num_memory = if is_v4_layout(product) {
        1
    } else {
        num_l2_slices
    };
    BlockExtents::new(
        [1, 1, num_memory as u8, num_shader_cores as u8],
        VINSTR_COUNTERS_PER_BLOCK,
        SampleValuesType::U32,
    )
}
