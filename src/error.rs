//! Error payloads carried inside [`std::io::Error`].
//!
//! Every fallible operation returns [`std::io::Result`]. Failures coming from
//! the kernel are plain OS errors, failures detected by this crate carry one of
//! the payloads below and an [`ErrorKind`] describing their category.

use std::fmt;
use std::io::{Error, ErrorKind};

use thiserror::Error;

use crate::hwcnt::{BlockType, PrfcntSet};

/// Caller supplied configuration rejected before reaching the kernel.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("block type {0:?} is requested more than once")]
    DuplicateBlockType(BlockType),
    #[error("counter set {set:?} is not supported for {ty:?} blocks")]
    UnsupportedSet { ty: BlockType, set: PrfcntSet },
    #[error("{ty:?} block {index} is not present")]
    AbsentBlock { ty: BlockType, index: u8 },
    #[error("sampling period must be non-zero")]
    ZeroPeriod,
    #[error("sampler is not active")]
    Inactive,
    #[error("samples can only be requested from a manual sampler")]
    NotManual,
}

/// Driver supplied data that violates the expected layout.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unknown item type {0:#06x}")]
    UnknownItem(u16),
    #[error("unknown block type {0}")]
    UnknownBlockType(u8),
    #[error("unknown counter set {0}")]
    UnknownSet(u8),
    #[error("more than one {0} item")]
    Duplicate(&'static str),
    #[error("missing {0} item")]
    Missing(&'static str),
    #[error("item found after the sentinel")]
    AfterSentinel,
    #[error("blocks disagree on {0}")]
    Inconsistent(&'static str),
    #[error("{0} block instances exceed the supported maximum")]
    TooManyInstances(u16),
    #[error("{0} clock domains exceed the supported maximum")]
    TooManyClockDomains(u32),
    #[error("{ty:?} block {index} is out of order")]
    BlockOrder { ty: BlockType, index: u8 },
    #[error("{0} blocks reported, {1} expected")]
    BlockCount(usize, usize),
    #[error("sample has no open session")]
    NoSession,
    #[error("data lies outside of the buffer")]
    OutOfBounds,
    #[error("item size {0} is smaller than the item layout")]
    ItemSize(u32),
    #[error("sample layout exceeds {0} blocks")]
    LayoutOverflow(usize),
    #[error("request type {0} does not support the reader api version")]
    UnsupportedRequest(u16),
}

/// Step of the sampler negotiation that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupStage {
    Filter,
    Convert,
    ReaderSetup,
    ApiVersion,
    BufferSize,
    Mmap,
    Layout,
    EnumInfo,
}

impl fmt::Display for SetupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            Self::Filter => "block extents filter",
            Self::Convert => "configuration conversion",
            Self::ReaderSetup => "reader setup",
            Self::ApiVersion => "api version query",
            Self::BufferSize => "buffer size query",
            Self::Mmap => "ring buffer mapping",
            Self::Layout => "sample layout",
            Self::EnumInfo => "counter enumeration",
        };
        f.write_str(stage)
    }
}

/// Sampler setup failure, the source error keeps its kind.
#[derive(Debug, Error)]
#[error("sampler setup failed at {stage}: {source}")]
pub struct SetupError {
    pub stage: SetupStage,
    #[source]
    pub source: Error,
}

impl SetupStage {
    pub(crate) fn fail(self, source: Error) -> Error {
        Error::new(source.kind(), SetupError { stage: self, source })
    }
}

pub(crate) fn invalid_input(e: ConfigError) -> Error {
    Error::new(ErrorKind::InvalidInput, e)
}

pub(crate) fn unsupported(e: ConfigError) -> Error {
    Error::new(ErrorKind::Unsupported, e)
}

pub(crate) fn invalid_data(e: ParseError) -> Error {
    Error::new(ErrorKind::InvalidData, e)
}
