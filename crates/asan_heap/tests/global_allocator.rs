#[cfg(test)]
#[cfg(all(feature = "global_allocator", feature = "hooks", target_os = "linux"))]
mod tests {
    use core::ptr::null_mut;

    use asan_heap::{
        GuestAddr,
        global::heap,
        hooks::{free::free, malloc::malloc, realloc::realloc},
    };

    #[test]
    fn test_allocate_while_heap_locked() {
        let h = heap();
        let before = h.stats();
        let mut v = Vec::<u64>::with_capacity(16);
        for i in 0..0x10000 {
            v.push(i);
        }
        let boxed = Box::new([0u8; 4096]);
        assert_eq!(h.stats(), before);
        assert_eq!(h.try_resolve_chunk(v.as_ptr() as GuestAddr), None);
        assert_eq!(h.try_resolve_chunk(boxed.as_ptr() as GuestAddr), None);
    }

    #[test]
    fn test_hooks_grow_bookkeeping() {
        let mut ptrs = Vec::new();
        for round in 0..4 {
            for shift in 0..20 {
                let p = unsafe { malloc((1 << shift) + round) };
                assert_ne!(p, null_mut());
                ptrs.push(p);
            }
        }
        for p in ptrs.iter_mut().step_by(3) {
            *p = unsafe { realloc(*p, 3 * 4096) };
            assert_ne!(*p, null_mut());
        }
        {
            let h = heap();
            for p in &ptrs {
                assert!(h.try_resolve_chunk(*p as GuestAddr).is_some());
            }
            h.verify();
        }
        for p in ptrs {
            unsafe { free(p) };
        }
        heap().verify();
    }
}
