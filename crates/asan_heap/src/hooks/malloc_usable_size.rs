use core::ffi::c_void;

use log::trace;

use crate::{GuestAddr, global::heap, size_t};

/// # Safety
/// See man pages
#[unsafe(export_name = "asan_heap_malloc_usable_size")]
pub unsafe extern "C" fn malloc_usable_size(p: *const c_void) -> size_t {
    trace!("malloc_usable_size - p: {p:p}");
    heap().usable_size(p as GuestAddr)
}
