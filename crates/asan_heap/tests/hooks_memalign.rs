#[cfg(test)]
#[cfg(feature = "hooks")]
mod tests {
    use core::ptr::null_mut;

    use asan_heap::{
        GuestAddr, PAGE_SIZE,
        hooks::{
            aligned_alloc::aligned_alloc, free::free, malloc_usable_size::malloc_usable_size,
            memalign::memalign, pvalloc::pvalloc, valloc::valloc,
        },
    };

    #[test]
    fn test_memalign_zero() {
        let p = unsafe { memalign(64, 0) };
        assert_eq!(p, null_mut());
    }

    #[test]
    fn test_memalign() {
        for shift in 3..14 {
            let align = 1 << shift;
            let p = unsafe { memalign(align, 33) };
            assert_ne!(p, null_mut());
            assert_eq!(p as GuestAddr % align, 0);
            unsafe { free(p) };
        }
    }

    #[test]
    fn test_aligned_alloc() {
        let p = unsafe { aligned_alloc(128, 100) };
        assert_ne!(p, null_mut());
        assert_eq!(p as GuestAddr % 128, 0);
        unsafe { free(p) };
        assert_eq!(unsafe { aligned_alloc(128, 0) }, null_mut());
    }

    #[test]
    fn test_aligned_alloc_small_alignment() {
        for align in [1, 2, 4] {
            let p = unsafe { aligned_alloc(align, 16) };
            assert_ne!(p, null_mut());
            assert_eq!(p as GuestAddr % 8, 0);
            assert_eq!(unsafe { malloc_usable_size(p) }, 16);
            unsafe { free(p) };
        }
    }

    #[test]
    fn test_valloc() {
        let p = unsafe { valloc(10) };
        assert_ne!(p, null_mut());
        assert_eq!(p as GuestAddr % PAGE_SIZE, 0);
        assert_eq!(unsafe { malloc_usable_size(p) }, 10);
        unsafe { free(p) };
    }

    #[test]
    fn test_pvalloc() {
        let p = unsafe { pvalloc(10) };
        assert_ne!(p, null_mut());
        assert_eq!(p as GuestAddr % PAGE_SIZE, 0);
        assert_eq!(unsafe { malloc_usable_size(p) }, PAGE_SIZE);
        unsafe { free(p) };
    }
}
