//! Backend for the kinstr_prfcnt reader of kbase r32 and newer.
//!
//! Every sample in the ring buffer starts with a list of metadata items: one
//! sample item, one clock item, one item per enabled block and a terminating
//! item. Block items point at the counter values inside the same mapping.

use std::io::Result;
use std::os::fd::RawFd;

use super::fd::FdGuard;
use super::memory::MappedMemory;
use super::poll::wait_for_sample;
use crate::ffi::ioctl::ioctl_wire;
use crate::ffi::ioctl::kinstr_prfcnt::{self, control_cmd, ControlCmd, MetadataItem, SampleAccess};
use crate::ffi::{Sys, Syscall, Wire};
use crate::hwcnt::{BlockExtents, BlockHandle, BlockMetadata, Features, Reader};
use crate::hwcnt::{SampleHandle, SampleMetadata};

mod convert;
mod enum_info;
mod metadata;
mod remap;
mod setup;


pub use enum_info::EnumInfo;
pub use remap::BlockIndexRemap;
pub(crate) use enum_info::parse_enum_info;
pub(crate) use setup::{setup, Args};

pub struct Backend<S: Syscall = Sys> {
    // Unmapped before the descriptor is closed.
    memory: MappedMemory<S>,
    fd: FdGuard<S>,
    sys: S,
    features: Features,
    extents: BlockExtents,
    metadata_item_size: usize,
    remap: BlockIndexRemap,
}

impl<S: Syscall> Backend<S> {
    pub(crate) fn new(args: Args<S>, remap: BlockIndexRemap, sys: S) -> Self {
        Self {
            memory: args.memory,
            fd: args.fd,
            sys,
            features: args.features,
            extents: args.extents,
            metadata_item_size: args.metadata_item_size,
            remap,
        }
    }

    pub(crate) fn start(&mut self, user_data: u64) -> Result<()> {
        self.issue_command(control_cmd::START, user_data)
    }

    pub(crate) fn stop(&mut self, user_data: u64) -> Result<()> {
        self.issue_command(control_cmd::STOP, user_data)
    }

    pub(crate) fn request_sample(&mut self, user_data: u64) -> Result<()> {
        self.issue_command(control_cmd::SAMPLE_SYNC, user_data)
    }

    fn issue_command(&self, cmd: u16, user_data: u64) -> Result<()> {
        let mut command = ControlCmd { cmd, user_data };
        ioctl_wire(&self.sys, self.fd.raw(), kinstr_prfcnt::ISSUE_COMMAND, &mut command)?;
        Ok(())
    }

    fn metadata_item(&self, sample: SampleHandle, index: usize) -> Option<MetadataItem> {
        let start = index
            .checked_mul(self.metadata_item_size)?
            .checked_add(usize::try_from(sample.0[1]).ok()?)?;
        let end = start.checked_add(MetadataItem::SIZE)?;
        let item = self.memory.as_slice().get(start..end)?;
        Some(MetadataItem::decode(item))
    }
}

impl<S: Syscall> Reader for Backend<S> {
    fn fd(&self) -> RawFd {
        self.fd.raw()
    }

    fn features(&self) -> &Features {
        &self.features
    }

    fn block_extents(&self) -> &BlockExtents {
        &self.extents
    }

    fn get_sample(&mut self) -> Result<(SampleMetadata, SampleHandle)> {
        wait_for_sample(&self.sys, self.fd.raw())?;

        let mut access = SampleAccess::default();
        ioctl_wire(&self.sys, self.fd.raw(), kinstr_prfcnt::GET_SAMPLE, &mut access)?;
        let handle = SampleHandle([access.sequence, access.sample_offset_bytes]);

        let parsed = metadata::parse_metadata(
            self.memory.as_slice(),
            usize::try_from(access.sample_offset_bytes).unwrap_or(usize::MAX),
            self.metadata_item_size,
            &self.extents,
            self.remap,
        );
        match parsed {
            Ok(metadata) => Ok((metadata, handle)),
            Err(e) => {
                if let Err(put) = self.put_sample(handle) {
                    log::warn!("Failed to put back malformed sample {}: {}", access.sequence, put);
                }
                Err(e)
            }
        }
    }

    fn next(&self, sample: SampleHandle, block: &mut BlockHandle) -> Option<BlockMetadata<'_>> {
        loop {
            let item = self.metadata_item(sample, block.0)?;
            let (ty, block_idx, set, block_state, values_offset) = match item {
                MetadataItem::Block {
                    ty,
                    block_idx,
                    set,
                    block_state,
                    values_offset,
                } => (ty, block_idx, set, block_state, values_offset),
                MetadataItem::None => return None,
                _ => {
                    block.0 += 1;
                    continue;
                }
            };
            block.0 += 1;

            // Items were validated when the sample was checked out.
            let ty = convert::block_type_from_wire(ty).ok()?;
            let start = values_offset as usize;
            let end = start.checked_add(self.extents.block_size())?;
            let values = self.memory.as_slice().get(start..end)?;

            return Some(BlockMetadata {
                ty,
                index: self.remap.remap(ty, block_idx).ok()?,
                set: convert::set_from_wire(set).ok()?,
                state: convert::block_state(block_state),
                values_type: self.extents.values_type(),
                values,
            });
        }
    }

    fn put_sample(&mut self, sample: SampleHandle) -> Result<()> {
        let [sequence, sample_offset_bytes] = sample.0;
        let mut access = SampleAccess {
            sequence,
            sample_offset_bytes,
        };
        ioctl_wire(&self.sys, self.fd.raw(), kinstr_prfcnt::PUT_SAMPLE, &mut access)?;
        Ok(())
    }

    fn discard(&mut self) -> Result<()> {
        self.issue_command(control_cmd::DISCARD, 0)
    }
}
