//! # linux
//! Regions obtained with direct `mmap` syscalls through `rustix`, so that no
//! `libc` is required to map heap memory. Requests are rounded up to whole
//! pages. Mappings are made `NORESERVE` since a refill may carve far more
//! chunks than are ever touched. Mapping does not log, as it also backs the
//! global allocator.
use core::{
    ffi::c_void,
    ptr::null_mut,
    slice::{from_raw_parts, from_raw_parts_mut},
};

use log::{error, trace};
use rustix::{
    io::Errno,
    mm::{MapFlags, ProtFlags, mmap_anonymous, munmap},
};
use thiserror::Error;

use crate::{GuestAddr, PAGE_SIZE, align_up, mmap::Mmap};

#[derive(Ord, PartialOrd, PartialEq, Eq, Debug)]
pub struct LinuxMmap {
    base: GuestAddr,
    len: usize,
}

impl Mmap for LinuxMmap {
    type Error = LinuxMapError;

    fn map(len: usize) -> Result<Self, Self::Error> {
        if len == 0 {
            Err(LinuxMapError::ZeroLength)?;
        }
        let Some(len) = align_up(len, PAGE_SIZE) else {
            return Err(LinuxMapError::LengthOverflow(len));
        };
        let base = unsafe {
            mmap_anonymous(
                null_mut(),
                len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::PRIVATE | MapFlags::NORESERVE,
            )
        }
        .map_err(|errno| LinuxMapError::FailedToMap(len, errno))? as GuestAddr;
        Ok(LinuxMmap { base, len })
    }

    fn as_slice(&self) -> &[u8] {
        unsafe { from_raw_parts(self.base as *const u8, self.len) }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { from_raw_parts_mut(self.base as *mut u8, self.len) }
    }

    fn addr(&self) -> GuestAddr {
        self.base
    }

    fn len(&self) -> usize {
        self.len
    }
}

impl Drop for LinuxMmap {
    fn drop(&mut self) {
        match unsafe { munmap(self.base as *mut c_void, self.len) } {
            Ok(()) => trace!("unmap - base: {:#x}, len: {:#x}", self.base, self.len),
            Err(errno) => error!(
                "Failed to unmap - base: {:#x}, len: {:#x}, errno: {errno}",
                self.base, self.len
            ),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum LinuxMapError {
    #[error("Failed to map - len: {0:#x}, errno: {1}")]
    FailedToMap(usize, Errno),
    #[error("Length overflow - len: {0:#x}")]
    LengthOverflow(usize),
    #[error("Zero length")]
    ZeroLength,
}
