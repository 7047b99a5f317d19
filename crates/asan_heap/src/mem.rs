//! # mem
//! Word granular copies used by the allocator when moving or clearing the
//! contents of a chunk. Chunk addresses are always aligned to the redzone
//! size, which is at least a word, so there is no byte-wise fallback.
//!
//! With the `global_allocator` feature the process-wide Rust allocator is
//! also installed here. It runs `dlmalloc` over pages mapped directly with
//! `LinuxMmap`, so the heap's bookkeeping never reaches the C allocation
//! hooks, even when those hooks stand in for the process allocator.
use core::ptr::{read_volatile, write_volatile};

#[cfg(all(feature = "global_allocator", target_os = "linux"))]
use crate::{
    PAGE_SIZE, allocator::backend::dlmalloc::DlmallocBackend, mmap::linux::LinuxMmap,
};
use crate::{
    GuestAddr, WORD_SIZE,
    error::{HeapViolation, fatal},
    is_aligned,
};

#[cfg(all(feature = "global_allocator", target_os = "linux"))]
#[global_allocator]
static GLOBAL_ALLOCATOR: DlmallocBackend<LinuxMmap> = DlmallocBackend::new(PAGE_SIZE);

/// Copies `words` words from `src` to `dst`.
///
/// # Safety
/// `src` must be valid for reads and `dst` valid for writes of
/// `words * WORD_SIZE` bytes and the two ranges must not overlap.
pub unsafe fn copy_words(dst: GuestAddr, src: GuestAddr, words: usize) {
    check_aligned(dst);
    check_aligned(src);
    let dst = dst as *mut usize;
    let src = src as *const usize;
    for i in 0..words {
        unsafe { write_volatile(dst.add(i), read_volatile(src.add(i))) };
    }
}

/// Zeroes `words` words starting at `dst`.
///
/// # Safety
/// `dst` must be valid for writes of `words * WORD_SIZE` bytes.
pub unsafe fn clear_words(dst: GuestAddr, words: usize) {
    check_aligned(dst);
    let dst = dst as *mut usize;
    for i in 0..words {
        unsafe { write_volatile(dst.add(i), 0) };
    }
}

/// The number of words needed to cover `len` bytes.
pub const fn words_for(len: usize) -> usize {
    len.div_ceil(WORD_SIZE)
}

fn check_aligned(addr: GuestAddr) {
    if !is_aligned(addr, WORD_SIZE) {
        fatal(HeapViolation::InvalidAlignment(addr));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_words() {
        let src = [1usize, 2, 3, 4];
        let mut dst = [0usize; 4];
        unsafe { copy_words(dst.as_mut_ptr() as GuestAddr, src.as_ptr() as GuestAddr, 3) };
        assert_eq!(dst, [1, 2, 3, 0]);
    }

    #[test]
    fn test_clear_words() {
        let mut buf = [usize::MAX; 4];
        unsafe { clear_words(buf.as_mut_ptr() as GuestAddr + WORD_SIZE, 2) };
        assert_eq!(buf, [usize::MAX, 0, 0, usize::MAX]);
    }

    #[test]
    fn test_words_for() {
        assert_eq!(words_for(0), 0);
        assert_eq!(words_for(1), 1);
        assert_eq!(words_for(WORD_SIZE), 1);
        assert_eq!(words_for(WORD_SIZE + 1), 2);
    }

    #[test]
    #[should_panic]
    fn test_unaligned_copy() {
        let mut buf = [0usize; 4];
        let addr = buf.as_mut_ptr() as GuestAddr;
        unsafe { copy_words(addr + 1, addr + 2 * WORD_SIZE, 1) };
    }
}
