use core::ffi::c_void;

use log::trace;

use crate::{global::heap, hooks::into_ptr, size_t};

/// # Safety
/// See man pages
#[unsafe(export_name = "asan_heap_valloc")]
pub unsafe extern "C" fn valloc(size: size_t) -> *mut c_void {
    trace!("valloc - size: {size:#x}");
    into_ptr(heap().allocate_page_aligned(size))
}
