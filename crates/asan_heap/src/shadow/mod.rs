//! # shadow
//! The shadow map records, for every granule of heap memory, whether it may
//! be accessed. The allocator poisons whole regions when it obtains them,
//! unpoisons the user-visible part of a chunk when it is handed out and
//! poisons it again when it is freed. The access checks which consult the
//! map on each load and store live outside of this crate.
use core::fmt::Debug;

use crate::GuestAddr;

pub mod sparse;

/// The number of bytes of memory described by a single shadow byte.
pub const SHADOW_GRANULE: usize = 1 << SHADOW_SHIFT;
pub const SHADOW_SHIFT: usize = 3;

/// The shadow byte written to mark the reason memory is inaccessible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PoisonType {
    AsanUser = 0xf7,
    AsanHeapLeftRz = 0xfa,
    AsanHeapRightRz = 0xfb,
    AsanHeapFreed = 0xfd,
    AsanInternal = 0xfe,
}

impl From<PoisonType> for u8 {
    fn from(val: PoisonType) -> Self {
        val as u8
    }
}

pub trait Shadow: Sized + Debug + Send {
    type Error: Debug;
    fn poison(&mut self, start: GuestAddr, len: usize, val: PoisonType)
    -> Result<(), Self::Error>;
    fn unpoison(&mut self, start: GuestAddr, len: usize) -> Result<(), Self::Error>;
    fn is_poison(&self, start: GuestAddr, len: usize) -> Result<bool, Self::Error>;
}
