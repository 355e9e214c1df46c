//! Backend for the vinstr reader of kbase drivers older than r32.
//!
//! The driver dumps every enabled block into one of 32 slots of a ring
//! buffer. The dump carries no per-block metadata, block positions come from
//! a fixed [`layout::SampleLayout`] and timestamps from the reader itself.

use std::collections::VecDeque;
use std::io::Result;
use std::os::fd::RawFd;

use self::layout::{SampleLayout, BLOCK_SIZE};
use self::session::{Session, UserDataQueue};
use super::fd::FdGuard;
use super::memory::MappedMemory;
use super::poll::{check_ready_read, wait_for_sample};
use crate::error::{invalid_data, invalid_input, ConfigError, ParseError};
use crate::ffi::ioctl::vinstr::{
    self, ReaderEvent, ReaderFeatures, ReaderMetadata, ReaderMetadataWithCycles,
};
use crate::ffi::ioctl::ioctl_wire;
use crate::ffi::{Sys, Syscall};
use crate::hwcnt::{BlockExtents, BlockHandle, BlockMetadata, BlockState, Features};
use crate::hwcnt::{PrfcntSet, Reader, SampleFlags, SampleHandle, SampleMetadata, SampleValuesType};

mod convert;
mod layout;
mod session;
mod setup;


pub(crate) use setup::{setup, Args};

pub struct Backend<S: Syscall = Sys> {
    // Unmapped before the descriptor is closed.
    memory: MappedMemory<S>,
    fd: FdGuard<S>,
    sys: S,
    // Zero for a manual reader.
    period_ns: u64,
    features: Features,
    reader_features: ReaderFeatures,
    extents: BlockExtents,
    buffer_size: usize,
    layout: SampleLayout,
    active: bool,
    sampling: bool,
    user_data_manual: UserDataQueue,
    sessions: VecDeque<Session>,
    sample_nr: u64,
}

impl<S: Syscall> Backend<S> {
    pub(crate) fn new(args: Args<S>, sys: S) -> Self {
        Self {
            memory: args.memory,
            fd: args.fd,
            sys,
            period_ns: args.period_ns,
            features: args.features,
            reader_features: args.reader_features,
            extents: args.extents,
            buffer_size: args.buffer_size,
            layout: args.layout,
            active: false,
            sampling: false,
            user_data_manual: UserDataQueue::default(),
            sessions: VecDeque::new(),
            sample_nr: 0,
        }
    }

    fn is_periodic(&self) -> bool {
        self.period_ns != 0
    }

    pub(crate) fn start(&mut self, user_data: u64) -> Result<()> {
        if self.active {
            return Ok(());
        }

        self.sys.ioctl_arg(self.fd.raw(), vinstr::CLEAR, 0)?;
        let now = self.sys.clock_gettime(libc::CLOCK_MONOTONIC_RAW)?;

        if self.is_periodic() {
            self.sys
                .ioctl_arg(self.fd.raw(), vinstr::SET_INTERVAL, self.period_ns)?;
            self.sampling = true;
        }

        self.sessions.push_back(Session::new(now, user_data));
        self.active = true;
        Ok(())
    }

    pub(crate) fn stop(&mut self, user_data: u64) -> Result<()> {
        if !self.active {
            return Ok(());
        }

        if self.is_periodic() && self.sampling {
            self.sys.ioctl_arg(self.fd.raw(), vinstr::SET_INTERVAL, 0)?;
            self.sampling = false;
        }

        self.dump(user_data)?;

        let stop_sample_nr = self.user_data_manual.push_count();
        if let Some(session) = self.sessions.back_mut() {
            session.stop(stop_sample_nr);
        }
        self.active = false;
        Ok(())
    }

    pub(crate) fn request_sample(&mut self, user_data: u64) -> Result<()> {
        if self.is_periodic() {
            return Err(invalid_input(ConfigError::NotManual));
        }
        self.dump(user_data)
    }

    fn dump(&mut self, user_data: u64) -> Result<()> {
        if !self.active {
            return Err(invalid_input(ConfigError::Inactive));
        }
        self.sys.ioctl_arg(self.fd.raw(), vinstr::DUMP, 0)?;
        self.user_data_manual.push(user_data);
        Ok(())
    }

    fn read_metadata(&self) -> Result<ReaderMetadataWithCycles> {
        let fd = self.fd.raw();
        if self.reader_features.is_empty() {
            let mut metadata = ReaderMetadata::default();
            ioctl_wire(&self.sys, fd, vinstr::GET_BUFFER, &mut metadata)?;
            return Ok(ReaderMetadataWithCycles {
                metadata,
                ..Default::default()
            });
        }
        let mut metadata = ReaderMetadataWithCycles::default();
        ioctl_wire(&self.sys, fd, vinstr::GET_BUFFER_WITH_CYCLES, &mut metadata)?;
        Ok(metadata)
    }
}

fn to_handle(metadata: &ReaderMetadata) -> SampleHandle {
    let packed = (metadata.event_id as u64) | ((metadata.buffer_idx as u64) << 32);
    SampleHandle([metadata.timestamp, packed])
}

fn from_handle(sample: SampleHandle) -> ReaderMetadata {
    let [timestamp, packed] = sample.0;
    ReaderMetadata {
        timestamp,
        event_id: packed as u32,
        buffer_idx: (packed >> 32) as u32,
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

        let reader_metadata = self.read_metadata()?;
        let handle = to_handle(&reader_metadata.metadata);

        if self.sessions.is_empty() {
            if let Err(e) = self.put_sample(handle) {
                log::warn!("Failed to put back sample without session: {}", e);
            }
            return Err(invalid_data(ParseError::NoSession));
        }

        let event = ReaderEvent::from_raw(reader_metadata.metadata.event_id);
        let is_manual = event == Some(ReaderEvent::Manual);
        let timestamp_ns_end = reader_metadata.metadata.timestamp;

        let session = &mut self.sessions[0];
        let user_data = match is_manual {
            true => self.user_data_manual.pop().unwrap_or(0),
            false => session.user_data_periodic(),
        };
        let timestamp_ns_begin = session.update_ts(timestamp_ns_end);

        if is_manual && session.can_erase(self.user_data_manual.pop_count()) {
            self.sessions.pop_front();
        }

        let gpu_cycle = match self.reader_features.contains(ReaderFeatures::CYCLES_TOP) {
            true => reader_metadata.top,
            false => 0,
        };
        let mut sc_cycle = match self.reader_features.contains(ReaderFeatures::CYCLES_SHADER_CORE) {
            true => reader_metadata.shader_cores,
            false => 0,
        };
        // Shader cores share the GPU clock unless reported separately.
        if sc_cycle == 0 {
            sc_cycle = gpu_cycle;
        }

        let metadata = SampleMetadata {
            user_data,
            flags: SampleFlags::empty(),
            sample_nr: self.sample_nr,
            timestamp_ns_begin,
            timestamp_ns_end,
            gpu_cycle,
            sc_cycle,
        };
        self.sample_nr += 1;

        Ok((metadata, handle))
    }

    fn next(&self, sample: SampleHandle, block: &mut BlockHandle) -> Option<BlockMetadata<'_>> {
        let entry = self.layout.get(block.0)?;
        let buffer_idx = from_handle(sample).buffer_idx as usize;

        let start = self.buffer_size * buffer_idx + entry.offset;
        let values = self.memory.as_slice().get(start..start + BLOCK_SIZE)?;
        block.0 += 1;

        Some(BlockMetadata {
            ty: entry.ty,
            index: entry.index,
            set: PrfcntSet::Primary,
            state: BlockState::empty(),
            values_type: SampleValuesType::U32,
            values,
        })
    }

    fn put_sample(&mut self, sample: SampleHandle) -> Result<()> {
        let mut metadata = from_handle(sample);
        ioctl_wire(&self.sys, self.fd.raw(), vinstr::PUT_BUFFER, &mut metadata)?;
        Ok(())
    }

    fn discard(&mut self) -> Result<()> {
        while check_ready_read(&self.sys, self.fd.raw())? {
            let metadata = self.read_metadata()?;
            self.put_sample(to_handle(&metadata.metadata))?;
        }
        Ok(())
    }
}
