//! # dlmalloc
//! A `GlobalAlloc` running `dlmalloc` over pages obtained directly from an
//! `Mmap` implementation. Pages are never returned, `dlmalloc` recycles
//! freed memory internally. Nothing on the allocation path logs, since a
//! logger may itself allocate while the lock is held.
use core::{
    alloc::{GlobalAlloc, Layout},
    fmt::{self, Debug, Formatter},
    marker::PhantomData,
    mem::ManuallyDrop,
    ptr::null_mut,
};

use dlmalloc::{Allocator, Dlmalloc};
use spin::Mutex;

use crate::mmap::Mmap;

/// Supplies `dlmalloc` with fresh mappings. Each mapping is leaked on
/// success so that dropping it never unmaps memory still in use.
pub struct PageSource<M: Mmap> {
    page_size: usize,
    _phantom: PhantomData<M>,
}

impl<M: Mmap> PageSource<M> {
    pub const fn new(page_size: usize) -> Self {
        PageSource {
            page_size,
            _phantom: PhantomData,
        }
    }
}

unsafe impl<M: Mmap> Allocator for PageSource<M> {
    fn alloc(&self, size: usize) -> (*mut u8, usize, u32) {
        let Ok(map) = M::map(size) else {
            return (null_mut(), 0, 0);
        };
        let mut map = ManuallyDrop::new(map);
        let pages = map.as_mut_slice();
        (pages.as_mut_ptr(), pages.len(), 0)
    }

    fn remap(&self, _ptr: *mut u8, _old: usize, _new: usize, _can_move: bool) -> *mut u8 {
        null_mut()
    }

    fn free_part(&self, _ptr: *mut u8, _old: usize, _new: usize) -> bool {
        false
    }

    fn free(&self, _ptr: *mut u8, _size: usize) -> bool {
        false
    }

    fn can_release_part(&self, _flags: u32) -> bool {
        false
    }

    fn allocates_zeros(&self) -> bool {
        true
    }

    fn page_size(&self) -> usize {
        self.page_size
    }
}

pub struct DlmallocBackend<M: Mmap> {
    dlmalloc: Mutex<Dlmalloc<PageSource<M>>>,
}

impl<M: Mmap> DlmallocBackend<M> {
    pub const fn new(page_size: usize) -> Self {
        DlmallocBackend {
            dlmalloc: Mutex::new(Dlmalloc::new_with_allocator(PageSource::new(page_size))),
        }
    }
}

impl<M: Mmap> Debug for DlmallocBackend<M> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "DlmallocBackend")
    }
}

unsafe impl<M: Mmap> GlobalAlloc for DlmallocBackend<M> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        unsafe { self.dlmalloc.lock().malloc(layout.size(), layout.align()) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        unsafe { self.dlmalloc.lock().calloc(layout.size(), layout.align()) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe {
            self.dlmalloc
                .lock()
                .free(ptr, layout.size(), layout.align())
        }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        unsafe {
            self.dlmalloc
                .lock()
                .realloc(ptr, layout.size(), layout.align(), new_size)
        }
    }
}
