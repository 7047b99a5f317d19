//! # asan_heap
//! A heap allocator for address sanitizer runtimes. Every allocation is
//! surrounded by redzones, freed memory is held back in a size-bounded
//! quarantine before it can be handed out again, and the validity of every
//! byte of heap memory is recorded in a shadow map which instrumented code
//! consults on each load and store.
//!
//! The allocator itself does not detect invalid accesses, it only maintains
//! the conditions (poisoned redzones, poisoned freed chunks, delayed reuse)
//! under which a separate access check can.
//!
//! The crate is split into the following components:
//! - `mmap` - The source of fresh, zeroed pages of memory.
//! - `shadow` - The shadow map recording which bytes may be accessed.
//! - `allocator` - The chunk bookkeeping: size classes, quarantine and the
//!   `AllocationDirectory` which ties them together.
//! - `hooks` - The C allocation family, backed by a process-wide directory.
//!
//! Internal inconsistencies are never recoverable. Any violation of the
//! allocator's invariants (a double free, a corrupted chunk header, a failed
//! page mapping) is reported through [`error::fatal`] which logs the
//! violation and panics.
#![no_std]

extern crate alloc;
#[cfg(test)]
extern crate std;

pub mod allocator;
pub mod config;
pub mod error;
#[cfg(feature = "hooks")]
pub mod global;
#[cfg(feature = "hooks")]
pub mod hooks;
pub mod mem;
pub mod mmap;
pub mod shadow;
pub mod stats;

/// An address in the memory space served by the allocator.
pub type GuestAddr = usize;

#[allow(non_camel_case_types)]
pub type size_t = usize;

/// The size of a machine word, the granule of the allocator's own copies.
pub const WORD_SIZE: usize = core::mem::size_of::<GuestAddr>();

/// The size of the pages requested from an `Mmap` implementation.
pub const PAGE_SIZE: usize = 4096;

#[inline]
pub const fn is_power_of_two(n: usize) -> bool {
    n != 0 && (n & (n - 1)) == 0
}

#[inline]
pub const fn is_aligned(addr: GuestAddr, alignment: usize) -> bool {
    addr & (alignment - 1) == 0
}

/// Rounds `n` up to the next multiple of `alignment` which must be a power of
/// two. Returns `None` on overflow.
#[inline]
pub const fn align_up(n: usize, alignment: usize) -> Option<usize> {
    match n.checked_add(alignment - 1) {
        Some(v) => Some(v & !(alignment - 1)),
        None => None,
    }
}
