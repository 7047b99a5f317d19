#[cfg(test)]
#[cfg(feature = "hooks")]
mod tests {
    use core::{ptr::null_mut, slice::from_raw_parts};

    use asan_heap::hooks::{calloc::calloc, free::free};

    #[test]
    fn test_zero_length() {
        let ret = unsafe { calloc(0, 0) };
        assert_eq!(ret, null_mut());
    }

    #[test]
    fn test_big_nobj() {
        let ret = unsafe { calloc(65536, 1) };
        assert_ne!(ret, null_mut());
        unsafe { free(ret) };
    }

    #[test]
    fn test_is_zeroed() {
        let ret = unsafe { calloc(37, 3) };
        assert_ne!(ret, null_mut());
        unsafe { from_raw_parts(ret as *const u8, 37 * 3) }
            .iter()
            .for_each(|x| assert_eq!(*x, 0));
        unsafe { free(ret) };
    }
}
