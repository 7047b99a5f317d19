//! # heap
//! This implementation of `Mmap` draws page-aligned, zeroed blocks from the
//! global allocator of the host program. It works on any target, but the
//! host's allocator must not itself be backed by this crate.
use alloc::alloc::{Layout, alloc_zeroed, dealloc};
use core::slice::{from_raw_parts, from_raw_parts_mut};

use log::trace;
use thiserror::Error;

use crate::{GuestAddr, PAGE_SIZE, mmap::Mmap};

#[derive(Ord, PartialOrd, PartialEq, Eq, Debug)]
pub struct HeapMmap {
    addr: GuestAddr,
    len: usize,
}

impl Mmap for HeapMmap {
    type Error = HeapMapError;

    fn map(len: usize) -> Result<Self, Self::Error> {
        if len == 0 {
            Err(HeapMapError::ZeroLength)?;
        }
        let layout =
            Layout::from_size_align(len, PAGE_SIZE).map_err(|_| HeapMapError::InvalidLength(len))?;
        let addr = unsafe { alloc_zeroed(layout) } as GuestAddr;
        if addr == 0 {
            Err(HeapMapError::FailedToMap(len))?;
        }
        trace!("Mapped: {:#x}-{:#x}", addr, addr + len);
        Ok(Self { addr, len })
    }

    fn as_slice(&self) -> &[u8] {
        unsafe { from_raw_parts(self.addr as *const u8, self.len) }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { from_raw_parts_mut(self.addr as *mut u8, self.len) }
    }
}

impl Drop for HeapMmap {
    fn drop(&mut self) {
        unsafe {
            dealloc(
                self.addr as *mut u8,
                Layout::from_size_align_unchecked(self.len, PAGE_SIZE),
            )
        };
        trace!("Unmapped: {:#x}-{:#x}", self.addr, self.addr + self.len);
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum HeapMapError {
    #[error("Failed to map - len: {0}")]
    FailedToMap(usize),
    #[error("Invalid length: {0}")]
    InvalidLength(usize),
    #[error("Zero length")]
    ZeroLength,
}
