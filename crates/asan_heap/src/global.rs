//! # global
//! The process-wide heap used by the C allocation hooks. It is created on
//! first use from the options found in the `ASAN_HEAP_OPTIONS` environment
//! variable and is guarded by a single lock which every hook holds for the
//! whole of its operation.
use alloc::format;
use core::ffi::CStr;

use log::{debug, warn};
use spin::{Lazy, Mutex, MutexGuard};

use crate::{
    allocator::AllocationDirectory,
    config::HeapConfig,
    error::{HeapViolation, fatal},
    shadow::sparse::SparseShadow,
};

#[cfg(all(feature = "linux", target_os = "linux"))]
pub type DefaultMmap = crate::mmap::linux::LinuxMmap;

#[cfg(not(all(feature = "linux", target_os = "linux")))]
pub type DefaultMmap = crate::mmap::heap::HeapMmap;

pub type DefaultDirectory = AllocationDirectory<DefaultMmap, SparseShadow>;

/// The environment variable holding the option string of the global heap.
pub const OPTIONS_ENV: &CStr = c"ASAN_HEAP_OPTIONS";

static HEAP: Lazy<Mutex<DefaultDirectory>> = Lazy::new(|| Mutex::new(init()));

/// Locks the process-wide heap.
pub fn heap() -> MutexGuard<'static, DefaultDirectory> {
    HEAP.lock()
}

fn init() -> DefaultDirectory {
    let config = options();
    debug!("init - config: {config:?}");
    let shadow = SparseShadow::new()
        .unwrap_or_else(|e| fatal(HeapViolation::ShadowFailed(0, 0, format!("{e:?}"))));
    DefaultDirectory::new(shadow, config)
        .unwrap_or_else(|e| fatal(HeapViolation::InvalidConfig(e)))
}

fn options() -> HeapConfig {
    let value = unsafe { libc::getenv(OPTIONS_ENV.as_ptr()) };
    if value.is_null() {
        return HeapConfig::new();
    }
    let Ok(options) = unsafe { CStr::from_ptr(value) }.to_str() else {
        warn!("{OPTIONS_ENV:?} is not valid UTF-8, using defaults");
        return HeapConfig::new();
    };
    HeapConfig::parse(options).unwrap_or_else(|e| {
        warn!("{OPTIONS_ENV:?} is invalid: {e}, using defaults");
        HeapConfig::new()
    })
}
