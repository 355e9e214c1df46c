use std::io::Result;
use std::iter::FusedIterator;
use std::mem::ManuallyDrop;
use std::os::fd::RawFd;
use std::ptr;

use super::{BlockExtents, BlockMetadata, Features, SampleMetadata};

/// Opaque reference to a sample checked out of a reader.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SampleHandle(pub(crate) [u64; 2]);

/// Opaque iteration cursor over the blocks of a sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BlockHandle(pub(crate) usize);

/// Per-sample protocol shared by every counter backend.
///
/// At most one sample is checked out at a time: every successful
/// [`get_sample`](Reader::get_sample) must be followed by one
/// [`put_sample`](Reader::put_sample) before the next one. [`Sample`] wraps
/// this pairing.
pub trait Reader {
    /// Descriptor that becomes readable once a sample is ready.
    fn fd(&self) -> RawFd;

    fn features(&self) -> &Features;

    fn block_extents(&self) -> &BlockExtents;

    /// Waits for the next sample and checks it out.
    fn get_sample(&mut self) -> Result<(SampleMetadata, SampleHandle)>;

    /// Returns the block at `block` and advances it, `None` once the sample
    /// has no more blocks.
    fn next(&self, sample: SampleHandle, block: &mut BlockHandle) -> Option<BlockMetadata<'_>>;

    fn put_sample(&mut self, sample: SampleHandle) -> Result<()>;

    /// Drops every sample that is ready without consuming it.
    fn discard(&mut self) -> Result<()>;
}

/// A sample checked out of a reader, put back on drop.
pub struct Sample<'r, R: Reader + ?Sized> {
    reader: &'r mut R,
    metadata: SampleMetadata,
    handle: SampleHandle,
}

impl<'r, R: Reader + ?Sized> Sample<'r, R> {
    /// Checks out the next sample. Nothing is put back if this fails.
    pub fn new(reader: &'r mut R) -> Result<Self> {
        let (metadata, handle) = reader.get_sample()?;
        log::trace!("Got sample {}", metadata.sample_nr);
        Ok(Self {
            reader,
            metadata,
            handle,
        })
    }

    pub fn metadata(&self) -> &SampleMetadata {
        &self.metadata
    }

    pub fn handle(&self) -> SampleHandle {
        self.handle
    }

    pub fn blocks(&self) -> BlockIter<'_, R> {
        BlockIter::new(self.reader, self.handle)
    }

    /// Puts the sample back and reports the outcome, dropping reports it to the log only.
    pub fn put(self) -> Result<()> {
        let mut this = ManuallyDrop::new(self);
        let handle = this.handle;
        this.reader.put_sample(handle)
    }
}

impl<R: Reader + ?Sized> Drop for Sample<'_, R> {
    fn drop(&mut self) {
        if let Err(e) = self.reader.put_sample(self.handle) {
            log::warn!("Failed to put sample {}: {}", self.metadata.sample_nr, e);
        }
    }
}

/// Lazy iterator over the blocks of one sample.
///
/// The default value is the end iterator. A bound iterator compares equal to
/// it once the reader reported the last block.
pub struct BlockIter<'a, R: Reader + ?Sized> {
    state: Option<(&'a R, SampleHandle, BlockHandle)>,
}

impl<'a, R: Reader + ?Sized> BlockIter<'a, R> {
    pub fn new(reader: &'a R, sample: SampleHandle) -> Self {
        Self {
            state: Some((reader, sample, BlockHandle::default())),
        }
    }
}

impl<R: Reader + ?Sized> Default for BlockIter<'_, R> {
    fn default() -> Self {
        Self { state: None }
    }
}

impl<R: Reader + ?Sized> Clone for BlockIter<'_, R> {
    fn clone(&self) -> Self {
        Self { state: self.state }
    }
}

impl<R: Reader + ?Sized> PartialEq for BlockIter<'_, R> {
    fn eq(&self, other: &Self) -> bool {
        match (self.state, other.state) {
            (None, None) => true,
            (Some((lhs, lhs_sample, lhs_block)), Some((rhs, rhs_sample, rhs_block))) => {
                ptr::addr_eq(lhs, rhs) && lhs_sample == rhs_sample && lhs_block == rhs_block
            }
            _ => false,
        }
    }
}

impl<R: Reader + ?Sized> Eq for BlockIter<'_, R> {}

impl<'a, R: Reader + ?Sized> Iterator for BlockIter<'a, R> {
    type Item = BlockMetadata<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (reader, sample, block) = self.state.as_mut()?;
        let metadata = Reader::next(*reader, *sample, block);
        if metadata.is_none() {
            self.state = None;
        }
        metadata
    }
}

impl<R: Reader + ?Sized> FusedIterator for BlockIter<'_, R> {}
