#[cfg(test)]
#[cfg(feature = "hooks")]
mod tests {
    use core::{ffi::c_void, ptr::null_mut};

    use asan_heap::{
        GuestAddr,
        hooks::{free::free, posix_memalign::posix_memalign},
    };

    #[test]
    fn test_posix_memalign_null_memptr() {
        let ret = unsafe { posix_memalign(null_mut(), 8, 10) };
        assert_eq!(ret, libc::EINVAL);
    }

    #[test]
    fn test_posix_memalign_zero() {
        let mut p = 0x1000 as *mut c_void;
        let ret = unsafe { posix_memalign(&mut p, 8, 0) };
        assert_eq!(ret, 0);
        assert_eq!(p, null_mut());
    }

    #[test]
    fn test_posix_memalign() {
        let mut p: *mut c_void = null_mut();
        let ret = unsafe { posix_memalign(&mut p, 1024, 10) };
        assert_eq!(ret, 0);
        assert_ne!(p, null_mut());
        assert_eq!(p as GuestAddr % 1024, 0);
        unsafe { free(p) };
    }
}
