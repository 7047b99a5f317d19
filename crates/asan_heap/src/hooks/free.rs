use core::ffi::c_void;

use log::trace;

use crate::{GuestAddr, global::heap};

/// # Safety
/// See man pages
#[unsafe(export_name = "asan_heap_free")]
pub unsafe extern "C" fn free(p: *mut c_void) {
    trace!("free - p: {p:p}");
    heap().deallocate(p as GuestAddr);
}
