use core::ffi::c_void;

use log::trace;

use crate::{GuestAddr, global::heap, hooks::into_ptr, size_t};

/// # Safety
/// See man pages
#[unsafe(export_name = "asan_heap_realloc")]
pub unsafe extern "C" fn realloc(p: *mut c_void, size: size_t) -> *mut c_void {
    trace!("realloc - p: {p:p}, size: {size:#x}");
    into_ptr(heap().reallocate(p as GuestAddr, size))
}
