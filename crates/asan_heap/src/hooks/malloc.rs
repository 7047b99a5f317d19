use core::ffi::c_void;

use log::trace;

use crate::{global::heap, hooks::into_ptr, size_t};

/// # Safety
/// See man pages
#[unsafe(export_name = "asan_heap_malloc")]
pub unsafe extern "C" fn malloc(size: size_t) -> *mut c_void {
    trace!("malloc - size: {size:#x}");
    into_ptr(heap().allocate(size))
}
