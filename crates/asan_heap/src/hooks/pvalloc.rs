use core::ffi::c_void;

use log::trace;

use crate::{global::heap, hooks::into_ptr, size_t};

/// # Safety
/// See man pages
#[unsafe(export_name = "asan_heap_pvalloc")]
pub unsafe extern "C" fn pvalloc(size: size_t) -> *mut c_void {
    trace!("pvalloc - size: {size:#x}");
    into_ptr(heap().allocate_page_rounded(size))
}
