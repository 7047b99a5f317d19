use core::ffi::c_void;

use log::trace;

use crate::{global::heap, hooks::into_ptr, size_t};

/// # Safety
/// See man pages
#[unsafe(export_name = "asan_heap_memalign")]
pub unsafe extern "C" fn memalign(align: size_t, size: size_t) -> *mut c_void {
    trace!("memalign - align: {align:#x}, size: {size:#x}");
    into_ptr(heap().allocate_aligned(align, size))
}
