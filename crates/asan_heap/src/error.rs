//! # error
//! Violations of the allocator's own invariants. None of these can be
//! recovered from: the bookkeeping of a sanitizer heap which has observed one
//! can no longer be trusted, so each is logged and then raised as a panic by
//! [`fatal`]. Errors raised by the collaborators (mapping pages, updating the
//! shadow) are wrapped into a violation at the point they are observed.
use alloc::string::String;

use log::error;
use thiserror::Error;

use crate::{GuestAddr, allocator::chunk::ChunkState, config::ConfigError};

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum HeapViolation {
    #[error("Chunk state mismatch - chunk: {0:#x}, expected: {1:?}, found: {2:?}")]
    StateMismatch(GuestAddr, ChunkState, ChunkState),
    #[error("Double free - addr: {0:#x}")]
    DoubleFree(GuestAddr),
    #[error("Invalid free - addr: {0:#x}")]
    InvalidFree(GuestAddr),
    #[error("Corrupt chunk header - header: {0:#x}, tag: {1:#x}")]
    CorruptHeader(GuestAddr, usize),
    #[error("Not a power of two: {0:#x}")]
    NotPowerOfTwo(usize),
    #[error("Invalid alignment: {0:#x}")]
    InvalidAlignment(usize),
    #[error("Size overflow - count: {0:#x}, size: {1:#x}")]
    SizeOverflow(usize, usize),
    #[error("Failed to map pages - len: {0:#x}, error: {1}")]
    PageSupplyFailed(usize, String),
    #[error("Failed to update shadow - start: {0:#x}, len: {1:#x}, error: {2}")]
    ShadowFailed(GuestAddr, usize, String),
    #[error("Quarantine underflow - held: {0:#x}, chunk: {1:#x}")]
    QuarantineUnderflow(usize, usize),
    #[error("Quarantine over budget - held: {0:#x}, budget: {1:#x}")]
    QuarantineOverBudget(usize, usize),
    #[error("Chunk list mismatch - chunk: {0:#x}, {1}")]
    ListMismatch(GuestAddr, &'static str),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(ConfigError),
}

/// Reports an invariant violation and aborts the current operation.
#[cold]
#[track_caller]
pub fn fatal(violation: HeapViolation) -> ! {
    error!("{violation}");
    panic!("asan_heap: {violation}");
}
