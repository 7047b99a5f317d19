//! # hooks
//! The C allocation family, exported under an `asan_heap_` prefix so that a
//! runtime can route the real symbols to them. Each hook locks the global
//! heap for the duration of the call.
use core::{ffi::c_void, ptr::null_mut};

use crate::GuestAddr;

pub mod aligned_alloc;
pub mod calloc;
pub mod free;
pub mod malloc;
pub mod malloc_usable_size;
pub mod memalign;
pub mod posix_memalign;
pub mod pvalloc;
pub mod realloc;
pub mod valloc;

fn into_ptr(addr: Option<GuestAddr>) -> *mut c_void {
    addr.map_or(null_mut(), |addr| addr as *mut c_void)
}
