//! # mmap
//! This module provides the source of the memory which the allocator carves
//! into chunks. Implementations must return zero-filled regions aligned to
//! at least `PAGE_SIZE`. A mapping is released when the `Mmap` is dropped,
//! the allocator therefore retains every mapping it obtains for as long as
//! it lives.
use core::fmt::Debug;

use crate::GuestAddr;

pub mod heap;

#[cfg(all(feature = "linux", target_os = "linux"))]
pub mod linux;

pub trait Mmap: Sized + Debug + Send {
    type Error: Debug;
    fn map(len: usize) -> Result<Self, Self::Error>;
    fn as_slice(&self) -> &[u8];
    fn as_mut_slice(&mut self) -> &mut [u8];

    fn addr(&self) -> GuestAddr {
        self.as_slice().as_ptr() as GuestAddr
    }

    fn len(&self) -> usize {
        self.as_slice().len()
    }
}
