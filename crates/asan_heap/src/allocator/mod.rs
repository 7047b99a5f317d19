//! # allocator
//! The chunk bookkeeping of the heap. Memory obtained from an `Mmap` is
//! carved into power-of-two sized chunks by the `SizeClassPool`, handed out
//! and tracked by the `AllocationDirectory` and, once freed, held back by the
//! `Quarantine` until enough other memory has been freed after it.
pub mod backend;
pub mod chunk;
pub mod directory;
pub mod pool;
pub mod quarantine;
pub mod ring;

pub use directory::AllocationDirectory;
