use core::ffi::c_void;

use log::trace;

use crate::{global::heap, hooks::into_ptr, size_t};

/// # Safety
/// See man pages
#[unsafe(export_name = "asan_heap_aligned_alloc")]
pub unsafe extern "C" fn aligned_alloc(alignment: size_t, size: size_t) -> *mut c_void {
    trace!("aligned_alloc - alignment: {alignment:#x}, size: {size:#x}");
    into_ptr(heap().allocate_aligned(alignment, size))
}
