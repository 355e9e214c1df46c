//! Counter samplers and the backends behind them.
//!
//! A sampler negotiates a counter configuration with the driver and exposes
//! the resulting reader. Setup either completes or releases everything it
//! acquired, a failed setup never leaks a descriptor or a mapping.

use std::io::Result;
use std::os::fd::RawFd;

use super::{BackendType, BlockExtents, BlockHandle, BlockMetadata, BlockType, Features};
use super::{PrfcntSet, Reader, SampleHandle, SampleMetadata, NUM_BLOCK_TYPES};
use crate::error::{invalid_input, ConfigError};
use crate::ffi::{Sys, Syscall};
use crate::instance::Instance;

mod fd;
pub mod kinstr_prfcnt;
mod memory;
pub mod poll;
pub mod vinstr;


/// Counters to enable in every block of one type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Configuration {
    pub ty: BlockType,
    pub set: PrfcntSet,
    /// Bit `i` enables counter `i`.
    pub enable_map: u128,
}

impl Configuration {
    pub const fn new(ty: BlockType, set: PrfcntSet, enable_map: u128) -> Self {
        Self {
            ty,
            set,
            enable_map,
        }
    }
}

/// Restricts `extents` to the block types named by `configs`.
///
/// Requested types keep their hardware block count, every other type gets
/// none. Naming a block type twice is rejected.
pub fn filter_block_extents(
    extents: &BlockExtents,
    configs: &[Configuration],
) -> Result<BlockExtents> {
    let mut seen = [false; NUM_BLOCK_TYPES];
    let mut result = BlockExtents::new(
        [0; NUM_BLOCK_TYPES],
        extents.counters_per_block(),
        extents.values_type(),
    );

    for config in configs {
        let requested = &mut seen[config.ty.idx()];
        if *requested {
            return Err(invalid_input(ConfigError::DuplicateBlockType(config.ty)));
        }
        *requested = true;
        result = result.with_num_blocks_of_type(config.ty, extents.num_blocks_of_type(config.ty));
    }

    Ok(result)
}

/// Reader of either counter interface, picked from the instance's backend type.
pub enum Backend<S: Syscall = Sys> {
    Vinstr(vinstr::Backend<S>),
    KinstrPrfcnt(kinstr_prfcnt::Backend<S>),
}

impl<S: Syscall> Backend<S> {
    /// A zero `period_ns` sets up a manual sampler.
    fn new(instance: &Instance<'_, S>, period_ns: u64, configs: &[Configuration]) -> Result<Self> {
        let ty = instance.backend_type();
        log::debug!("Setting up {} sampler, period {} ns", ty.name(), period_ns);

        let backend = match ty {
            BackendType::Vinstr | BackendType::VinstrPreR21 => {
                let args = vinstr::setup(instance, period_ns, configs)?;
                Self::Vinstr(vinstr::Backend::new(args, instance.sys().clone()))
            }
            BackendType::KinstrPrfcnt | BackendType::KinstrPrfcntBad => {
                let args = kinstr_prfcnt::setup(instance, period_ns, configs)?;
                let remap = kinstr_prfcnt::BlockIndexRemap::Nop;
                Self::KinstrPrfcnt(kinstr_prfcnt::Backend::new(args, remap, instance.sys().clone()))
            }
            BackendType::KinstrPrfcntWa => {
                let args = kinstr_prfcnt::setup(instance, period_ns, configs)?;
                let remap = kinstr_prfcnt::BlockIndexRemap::Sparse(args.sc_mask);
                Self::KinstrPrfcnt(kinstr_prfcnt::Backend::new(args, remap, instance.sys().clone()))
            }
        };
        Ok(backend)
    }

    fn start(&mut self, user_data: u64) -> Result<()> {
        match self {
            Self::Vinstr(it) => it.start(user_data),
            Self::KinstrPrfcnt(it) => it.start(user_data),
        }
    }

    fn stop(&mut self, user_data: u64) -> Result<()> {
        match self {
            Self::Vinstr(it) => it.stop(user_data),
            Self::KinstrPrfcnt(it) => it.stop(user_data),
        }
    }

    fn request_sample(&mut self, user_data: u64) -> Result<()> {
        match self {
            Self::Vinstr(it) => it.request_sample(user_data),
            Self::KinstrPrfcnt(it) => it.request_sample(user_data),
        }
    }
}

impl<S: Syscall> Reader for Backend<S> {
    fn fd(&self) -> RawFd {
        match self {
            Self::Vinstr(it) => it.fd(),
            Self::KinstrPrfcnt(it) => it.fd(),
        }
    }

    fn features(&self) -> &Features {
        match self {
            Self::Vinstr(it) => it.features(),
            Self::KinstrPrfcnt(it) => it.features(),
        }
    }

    fn block_extents(&self) -> &BlockExtents {
        match self {
            Self::Vinstr(it) => it.block_extents(),
            Self::KinstrPrfcnt(it) => it.block_extents(),
        }
    }

    fn get_sample(&mut self) -> Result<(SampleMetadata, SampleHandle)> {
        match self {
            Self::Vinstr(it) => it.get_sample(),
            Self::KinstrPrfcnt(it) => it.get_sample(),
        }
    }

    fn next(&self, sample: SampleHandle, block: &mut BlockHandle) -> Option<BlockMetadata<'_>> {
        match self {
            Self::Vinstr(it) => it.next(sample, block),
            Self::KinstrPrfcnt(it) => it.next(sample, block),
        }
    }

    fn put_sample(&mut self, sample: SampleHandle) -> Result<()> {
        match self {
            Self::Vinstr(it) => it.put_sample(sample),
            Self::KinstrPrfcnt(it) => it.put_sample(sample),
        }
    }

    fn discard(&mut self) -> Result<()> {
        match self {
            Self::Vinstr(it) => it.discard(),
            Self::KinstrPrfcnt(it) => it.discard(),
        }
    }
}

/// Sampler taking a sample whenever one is requested.
///
/// Counters accumulate between `accumulation_start` and `accumulation_stop`,
/// stopping takes one final sample.
pub struct ManualSampler<S: Syscall = Sys> {
    backend: Backend<S>,
}

impl<S: Syscall> ManualSampler<S> {
    pub fn new(instance: &Instance<'_, S>, configs: &[Configuration]) -> Result<Self> {
        let backend = Backend::new(instance, 0, configs)?;
        Ok(Self { backend })
    }

    pub fn accumulation_start(&mut self, user_data: u64) -> Result<()> {
        self.backend.start(user_data)
    }

    pub fn accumulation_stop(&mut self, user_data: u64) -> Result<()> {
        self.backend.stop(user_data)
    }

    pub fn request_sample(&mut self, user_data: u64) -> Result<()> {
        self.backend.request_sample(user_data)
    }

    pub fn reader(&mut self) -> &mut Backend<S> {
        &mut self.backend
    }
}

/// Sampler taking a sample every `period_ns` nanoseconds while sampling.
pub struct PeriodicSampler<S: Syscall = Sys> {
    backend: Backend<S>,
}

impl<S: Syscall> PeriodicSampler<S> {
    pub fn new(instance: &Instance<'_, S>, period_ns: u64, configs: &[Configuration]) -> Result<Self> {
        if period_ns == 0 {
            return Err(invalid_input(ConfigError::ZeroPeriod));
        }
        let backend = Backend::new(instance, period_ns, configs)?;
        Ok(Self { backend })
    }

    pub fn sampling_start(&mut self, user_data: u64) -> Result<()> {
        self.backend.start(user_data)
    }

    pub fn sampling_stop(&mut self, user_data: u64) -> Result<()> {
        self.backend.stop(user_data)
    }

    pub fn reader(&mut self) -> &mut Backend<S> {
        &mut self.backend
    }
}
