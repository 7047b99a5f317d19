//! # backend
//! Allocators for the heap's own bookkeeping, as opposed to the chunks it
//! hands out. The chunk arena, the region index and the shadow pages all
//! live in ordinary Rust collections, and when the hooks replace the
//! process allocator those collections must be served from somewhere other
//! than the hooks themselves.
#[cfg(feature = "dlmalloc")]
pub mod dlmalloc;
