use core::ffi::{c_int, c_void};

use log::trace;

use crate::{global::heap, hooks::into_ptr, size_t};

/// # Safety
/// See man pages
#[unsafe(export_name = "asan_heap_posix_memalign")]
pub unsafe extern "C" fn posix_memalign(
    memptr: *mut *mut c_void,
    align: size_t,
    size: size_t,
) -> c_int {
    trace!("posix_memalign - memptr: {memptr:p}, align: {align:#x}, size: {size:#x}");
    if memptr.is_null() {
        return libc::EINVAL;
    }
    let (addr, ret) = heap().posix_aligned_allocate(align, size);
    unsafe { *memptr = into_ptr(addr) };
    ret
}
