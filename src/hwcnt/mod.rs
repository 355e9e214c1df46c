//! Hardware counter model shared by every sampler backend.

use bitflags::bitflags;

use crate::ffi::get_at;

mod backend_type;
mod extents;
mod reader;
pub mod sampler;


pub use backend_type::{discover, select, BackendType, BackendTypes, BACKEND_ENV};
pub use extents::{compute_block_extents, BlockExtents, SampleValuesType, NUM_BLOCK_TYPES};
pub use reader::{BlockHandle, BlockIter, Reader, Sample, SampleHandle};

/// Hardware block a counter belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum BlockType {
    /// Front end, the job manager or command stream frontend.
    Fe,
    Tiler,
    /// Memory system, one block per L2 slice.
    Memory,
    /// Shader core.
    Core,
}

impl BlockType {
    pub const ALL: [Self; NUM_BLOCK_TYPES] = [Self::Fe, Self::Tiler, Self::Memory, Self::Core];

    pub(crate) const fn idx(self) -> usize {
        self as usize
    }
}

/// Counter set a block is sampled with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrfcntSet {
    #[default]
    Primary,
    Secondary,
    Tertiary,
}

bitflags! {
    /// Power and protection state of a block over the sampled interval.
    ///
    /// Only reported by backends advertising the matching [`Features`].
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct BlockState: u32 {
        const ON = 1 << 0;
        const OFF = 1 << 1;
        const AVAILABLE = 1 << 2;
        const UNAVAILABLE = 1 << 3;
        const NORMAL = 1 << 4;
        const PROTECTED = 1 << 5;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct SampleFlags: u32 {
        /// The sample interval was stretched, counters overflowed or the
        /// sample was delayed.
        const STRETCHED = 1 << 0;
        /// The counters are unreliable.
        const ERROR = 1 << 1;
    }
}

/// Capabilities negotiated with the counter interface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Features {
    /// `gpu_cycle` of [`SampleMetadata`] is valid.
    pub has_gpu_cycle: bool,
    /// [`SampleFlags::STRETCHED`] can be reported.
    pub has_stretched_flag: bool,
    /// Counters saturate instead of wrapping.
    pub overflow_behavior_defined: bool,
    /// [`BlockState::ON`] and [`BlockState::OFF`] are reported.
    pub has_power_states: bool,
    /// [`BlockState::AVAILABLE`] and [`BlockState::UNAVAILABLE`] are reported.
    pub has_vm_states: bool,
    /// [`BlockState::NORMAL`] and [`BlockState::PROTECTED`] are reported.
    pub has_protection_states: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleMetadata {
    /// Value passed to the start, stop or sample request that produced it.
    pub user_data: u64,
    pub flags: SampleFlags,
    /// Sequence number, starting at zero for each sampler.
    pub sample_nr: u64,
    pub timestamp_ns_begin: u64,
    pub timestamp_ns_end: u64,
    pub gpu_cycle: u64,
    pub sc_cycle: u64,
}

/// One block of counter values inside a sample.
///
/// `values` borrows the reader's mapping and is only valid until the sample
/// is put back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockMetadata<'a> {
    pub ty: BlockType,
    pub index: u8,
    pub set: PrfcntSet,
    pub state: BlockState,
    pub values_type: SampleValuesType,
    pub values: &'a [u8],
}

impl<'a> BlockMetadata<'a> {
    /// Counter values widened to `u64`.
    pub fn counters(&self) -> impl Iterator<Item = u64> + 'a {
        let values_type = self.values_type;
        self.values
            .chunks_exact(values_type.size())
            .map(move |chunk| match values_type {
                SampleValuesType::U32 => get_at::<u32>(chunk, 0) as u64,
                SampleValuesType::U64 => get_at(chunk, 0),
            })
    }
}
