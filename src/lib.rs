//! User-space hardware counter sampler for Arm Mali GPUs.
//!
//! Counters are read through the kbase kernel driver. Three generations of
//! its counter interface are supported: the legacy pre-r21 vinstr reader,
//! the post-r21 vinstr reader and the kinstr_prfcnt reader. The interface is
//! detected when the device is probed, samplers hide the difference.
//!
//! ## Example
//!
//! Sample the first four counters of every shader core once per millisecond.
//!
//! ```rust,no_run
//! use mali_hwcnt::handle::Handle;
//! use mali_hwcnt::hwcnt::sampler::{Configuration, PeriodicSampler};
//! use mali_hwcnt::hwcnt::{BlockType, PrfcntSet, Sample};
//! use mali_hwcnt::instance::Instance;
//!
//! let handle = Handle::create(0).unwrap(); // Opens /dev/mali0.
//! let instance = Instance::new(&handle).unwrap();
//! println!("{:?} using {}", instance.product_id(), instance.backend_type().name());
//!
//! let configs = [Configuration::new(BlockType::Core, PrfcntSet::Primary, 0b1111)];
//! let mut sampler = PeriodicSampler::new(&instance, 1_000_000, &configs).unwrap();
//!
//! sampler.sampling_start(0).unwrap();
//! for _ in 0..10 {
//!     let sample = Sample::new(sampler.reader()).unwrap();
//!     println!("{:?}", sample.metadata());
//!     for block in sample.blocks() {
//!         let counters: Vec<u64> = block.counters().collect();
//!         println!("{:?}[{}]: {:?}", block.ty, block.index, counters);
//!     }
//! }
//! sampler.sampling_stop(0).unwrap();
//! ```
//!
//! ## Driver compatibility
//!
//! Job manager drivers from r10.2 of the legacy interface onwards and CSF
//! drivers are supported. Set `HWCPIPE_BACKEND_INTERFACE` to one of the
//! [`hwcnt::BackendType`] names to force a specific counter interface.

mod error;
mod ffi;
pub mod handle;
pub mod hwcnt;
pub mod instance;
pub mod product;
pub mod version;

pub use error::{ConfigError, ParseError, SetupError, SetupStage};
pub use ffi::{Sys, Syscall};
