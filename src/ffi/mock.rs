//! Scripted [`Syscall`] implementation recording every call.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::io::{Error, Result};
use std::os::fd::RawFd;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use super::{Syscall, Wire};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Open(PathBuf),
    Close(RawFd),
    Ioctl { fd: RawFd, op: u64 },
    Mmap { fd: RawFd, len: usize },
    Munmap { len: usize },
    Poll { fd: RawFd, timeout: i32 },
}

type Handler = Box<dyn FnMut(RawFd, &mut [u8]) -> Result<i32>>;
type ArgHandler = Box<dyn FnMut(RawFd, u64) -> Result<i32>>;

pub struct MockSys {
    calls: RefCell<Vec<Call>>,
    ioctls: RefCell<HashMap<u64, Handler>>,
    ioctl_args: RefCell<HashMap<u64, ArgHandler>>,
    open_fd: Cell<RawFd>,
    open_errno: Cell<Option<i32>>,
    char_device: Cell<bool>,
    close_errno: Cell<Option<i32>>,
    mmap_errno: Cell<Option<i32>>,
    mapping: RefCell<Vec<u8>>,
    regions: RefCell<Vec<Box<[u8]>>>,
    polls: RefCell<VecDeque<std::result::Result<usize, i32>>>,
    now: Cell<u64>,
}

impl MockSys {
    pub fn new() -> Self {
        Self {
            calls: RefCell::default(),
            ioctls: RefCell::default(),
            ioctl_args: RefCell::default(),
            open_fd: Cell::new(42),
            open_errno: Cell::new(None),
            char_device: Cell::new(true),
            close_errno: Cell::new(None),
            mmap_errno: Cell::new(None),
            mapping: RefCell::default(),
            regions: RefCell::default(),
            polls: RefCell::default(),
            now: Cell::new(0),
        }
    }

    pub fn on_ioctl<F>(&self, op: u64, f: F)
    where
        F: FnMut(RawFd, &mut [u8]) -> Result<i32> + 'static,
    {
        self.ioctls.borrow_mut().insert(op, Box::new(f));
    }

    pub fn on_ioctl_arg<F>(&self, op: u64, f: F)
    where
        F: FnMut(RawFd, u64) -> Result<i32> + 'static,
    {
        self.ioctl_args.borrow_mut().insert(op, Box::new(f));
    }

    /// Answers `op` with `reply` written through the argument pointer.
    pub fn reply<T: Wire + 'static>(&self, op: u64, ret: i32, reply: T) {
        self.on_ioctl(op, move |_, buf| {
            reply.encode(buf);
            Ok(ret)
        });
    }

    pub fn fail_ioctl(&self, op: u64, errno: i32) {
        self.on_ioctl(op, move |_, _| Err(Error::from_raw_os_error(errno)));
        self.on_ioctl_arg(op, move |_, _| Err(Error::from_raw_os_error(errno)));
    }

    pub fn set_open_fd(&self, fd: RawFd) {
        self.open_fd.set(fd);
    }

    pub fn fail_open(&self, errno: i32) {
        self.open_errno.set(Some(errno));
    }

    pub fn set_char_device(&self, char_device: bool) {
        self.char_device.set(char_device);
    }

    pub fn fail_close(&self, errno: i32) {
        self.close_errno.set(Some(errno));
    }

    pub fn fail_mmap(&self, errno: i32) {
        self.mmap_errno.set(Some(errno));
    }

    /// Content copied into the next mapping.
    pub fn set_mapping(&self, content: Vec<u8>) {
        *self.mapping.borrow_mut() = content;
    }

    /// Overwrites bytes of the most recent mapping.
    pub fn write_mapping(&self, offset: usize, bytes: &[u8]) {
        let mut regions = self.regions.borrow_mut();
        if let Some(region) = regions.last_mut() {
            region[offset..offset + bytes.len()].copy_from_slice(bytes);
        }
    }

    pub fn push_poll(&self, result: std::result::Result<usize, i32>) {
        self.polls.borrow_mut().push_back(result);
    }

    pub fn set_now(&self, ns: u64) {
        self.now.set(ns);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn closed(&self) -> Vec<RawFd> {
        let calls = self.calls.borrow();
        calls
            .iter()
            .filter_map(|call| match call {
                Call::Close(fd) => Some(*fd),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, op: u64) -> usize {
        let calls = self.calls.borrow();
        calls
            .iter()
            .filter(|call| matches!(call, Call::Ioctl { op: it, .. } if *it == op))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

fn not_scripted() -> Error {
    Error::from_raw_os_error(libc::ENOTTY)
}

impl Syscall for &MockSys {
    fn open(&self, path: &Path) -> Result<RawFd> {
        self.record(Call::Open(path.to_path_buf()));
        match self.open_errno.get() {
            Some(errno) => Err(Error::from_raw_os_error(errno)),
            None => Ok(self.open_fd.get()),
        }
    }

    fn is_char_device(&self, _: RawFd) -> Result<bool> {
        Ok(self.char_device.get())
    }

    fn close(&self, fd: RawFd) -> Result<()> {
        self.record(Call::Close(fd));
        match self.close_errno.get() {
            Some(errno) => Err(Error::from_raw_os_error(errno)),
            None => Ok(()),
        }
    }

    fn ioctl_arg(&self, fd: RawFd, op: u64, arg: u64) -> Result<i32> {
        self.record(Call::Ioctl { fd, op });
        match self.ioctl_args.borrow_mut().get_mut(&op) {
            Some(handler) => handler(fd, arg),
            None => Err(not_scripted()),
        }
    }

    fn ioctl_argp(&self, fd: RawFd, op: u64, argp: &mut [u8]) -> Result<i32> {
        self.record(Call::Ioctl { fd, op });
        match self.ioctls.borrow_mut().get_mut(&op) {
            Some(handler) => handler(fd, argp),
            None => Err(not_scripted()),
        }
    }

    fn mmap(&self, len: usize, _: i32, _: i32, fd: RawFd, _: i64) -> Result<NonNull<u8>> {
        self.record(Call::Mmap { fd, len });
        if let Some(errno) = self.mmap_errno.get() {
            return Err(Error::from_raw_os_error(errno));
        }
        let mut region = vec![0; len.max(1)].into_boxed_slice();
        let content = self.mapping.borrow();
        let n = content.len().min(len);
        region[..n].copy_from_slice(&content[..n]);
        drop(content);
        let mut regions = self.regions.borrow_mut();
        regions.push(region);
        let region = regions.last_mut().map(|region| region.as_mut_ptr());
        region.and_then(NonNull::new).ok_or_else(not_scripted)
    }

    unsafe fn munmap(&self, _: NonNull<u8>, len: usize) -> Result<()> {
        self.record(Call::Munmap { len });
        Ok(())
    }

    fn poll(&self, fd: RawFd, _: i16, timeout: i32) -> Result<usize> {
        self.record(Call::Poll { fd, timeout });
        match self.polls.borrow_mut().pop_front() {
            Some(Ok(ready)) => Ok(ready),
            Some(Err(errno)) => Err(Error::from_raw_os_error(errno)),
            None => Ok(1),
        }
    }

    fn clock_gettime(&self, _: libc::clockid_t) -> Result<u64> {
        Ok(self.now.get())
    }
}
