//! # stats
//! Counters describing the traffic seen by an `AllocationDirectory`. They are
//! only ever updated while the directory is exclusively borrowed, so plain
//! integers suffice.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    /// Number of successful allocations, including those made by `realloc`.
    pub mallocs: u64,
    /// Bytes requested by those allocations.
    pub malloced: u64,
    pub frees: u64,
    pub freed: u64,
    pub reallocs: u64,
    /// Bytes copied from old to new chunks by reallocation.
    pub realloced: u64,
    /// Number of regions obtained from the page supplier.
    pub mmaps: u64,
    pub mmaped: u64,
    /// Number of chunks returned from the quarantine to the free lists.
    pub evictions: u64,
}

impl HeapStats {
    pub const fn new() -> Self {
        HeapStats {
            mallocs: 0,
            malloced: 0,
            frees: 0,
            freed: 0,
            reallocs: 0,
            realloced: 0,
            mmaps: 0,
            mmaped: 0,
            evictions: 0,
        }
    }

    /// Bytes requested by allocations which have not yet been freed.
    pub const fn in_use(&self) -> u64 {
        self.malloced.saturating_sub(self.freed)
    }
}
