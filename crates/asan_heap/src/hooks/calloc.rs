use core::ffi::c_void;

use log::trace;

use crate::{global::heap, hooks::into_ptr, size_t};

/// # Safety
/// See man pages
#[unsafe(export_name = "asan_heap_calloc")]
pub unsafe extern "C" fn calloc(nobj: size_t, size: size_t) -> *mut c_void {
    trace!("calloc - nobj: {nobj:#x}, size: {size:#x}");
    into_ptr(heap().allocate_zeroed(nobj, size))
}
