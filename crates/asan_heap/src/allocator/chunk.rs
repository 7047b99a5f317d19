//! # chunk
//! A chunk is the unit of the allocator's bookkeeping: a power-of-two sized
//! slot carved from a mapped region. The authoritative record of each chunk
//! lives in the `ChunkArena` and is addressed by its `ChunkId`. In addition,
//! a two word header is written into the chunk's leading redzone so that a
//! user pointer can be traced back to its record. When a chunk is handed out
//! at an alignment beyond the redzone size, an alignment marker carrying the
//! same id is written directly before the returned address instead.
use alloc::vec::Vec;
use core::ptr::{read_volatile, write_volatile};

use crate::{
    GuestAddr, WORD_SIZE,
    error::{HeapViolation, fatal},
};

/// The size of the in-memory header or alignment marker.
pub const HEADER_SIZE: usize = 2 * WORD_SIZE;

const CHUNK_AVAILABLE: usize = 0x573B5CE5;
const CHUNK_ALLOCATED: usize = 0x32041A36;
const CHUNK_QUARANTINE: usize = 0x1978BAE3;
const CHUNK_MEMALIGN: usize = 0xDC68ECD8;

/// Chunks move strictly through `Available -> Allocated -> Quarantined ->
/// Available`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkState {
    Available,
    Allocated,
    Quarantined,
}

impl ChunkState {
    pub const fn tag(self) -> usize {
        match self {
            ChunkState::Available => CHUNK_AVAILABLE,
            ChunkState::Allocated => CHUNK_ALLOCATED,
            ChunkState::Quarantined => CHUNK_QUARANTINE,
        }
    }

    pub const fn from_tag(tag: usize) -> Option<Self> {
        match tag {
            CHUNK_AVAILABLE => Some(ChunkState::Available),
            CHUNK_ALLOCATED => Some(ChunkState::Allocated),
            CHUNK_QUARANTINE => Some(ChunkState::Quarantined),
            _ => None,
        }
    }

    pub const fn next(self) -> Self {
        match self {
            ChunkState::Available => ChunkState::Allocated,
            ChunkState::Allocated => ChunkState::Quarantined,
            ChunkState::Quarantined => ChunkState::Available,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkId(usize);

impl ChunkId {
    pub const fn index(self) -> usize {
        self.0
    }
}

/// The word pair found one redzone before a user pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderWord {
    Head { state: ChunkState, chunk: ChunkId },
    AlignmentMarker { chunk: ChunkId },
}

#[repr(C)]
struct RawHeader {
    tag: usize,
    chunk: usize,
}

impl HeaderWord {
    /// Decodes the header at `addr`, returning the raw tag if it is not
    /// recognised.
    ///
    /// # Safety
    /// `addr` must be word aligned and valid for reads of `HEADER_SIZE` bytes.
    pub unsafe fn read(addr: GuestAddr) -> Result<HeaderWord, usize> {
        let raw = unsafe { read_volatile(addr as *const RawHeader) };
        let chunk = ChunkId(raw.chunk);
        match raw.tag {
            CHUNK_MEMALIGN => Ok(HeaderWord::AlignmentMarker { chunk }),
            tag => ChunkState::from_tag(tag)
                .map(|state| HeaderWord::Head { state, chunk })
                .ok_or(tag),
        }
    }

    /// # Safety
    /// `addr` must be word aligned and valid for writes of `HEADER_SIZE` bytes.
    pub unsafe fn write(self, addr: GuestAddr) {
        let raw = match self {
            HeaderWord::Head { state, chunk } => RawHeader {
                tag: state.tag(),
                chunk: chunk.0,
            },
            HeaderWord::AlignmentMarker { chunk } => RawHeader {
                tag: CHUNK_MEMALIGN,
                chunk: chunk.0,
            },
        };
        unsafe { write_volatile(addr as *mut RawHeader, raw) };
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRecord {
    /// Address of the chunk, where its header lives.
    pub base: GuestAddr,
    /// Total size of the chunk including redzones, a power of two.
    pub allocated_size: usize,
    /// Size requested by the caller for the current or last allocation.
    pub used_size: usize,
    /// Address handed to the caller for the current or last allocation.
    pub user_addr: GuestAddr,
    pub state: ChunkState,
    pub(crate) prev: Option<ChunkId>,
    pub(crate) next: Option<ChunkId>,
}

impl ChunkRecord {
    pub fn available(base: GuestAddr, allocated_size: usize) -> Self {
        ChunkRecord {
            base,
            allocated_size,
            used_size: 0,
            user_addr: 0,
            state: ChunkState::Available,
            prev: None,
            next: None,
        }
    }

    pub fn is_linked(&self) -> bool {
        self.prev.is_some() || self.next.is_some()
    }
}

/// Snapshot of a chunk as seen by callers outside the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    pub base: GuestAddr,
    pub user_addr: GuestAddr,
    pub allocated_size: usize,
    pub used_size: usize,
    pub state: ChunkState,
}

impl From<&ChunkRecord> for ChunkInfo {
    fn from(record: &ChunkRecord) -> Self {
        ChunkInfo {
            base: record.base,
            user_addr: record.user_addr,
            allocated_size: record.allocated_size,
            used_size: record.used_size,
            state: record.state,
        }
    }
}

#[derive(Debug, Default)]
pub struct ChunkArena {
    records: Vec<ChunkRecord>,
}

impl ChunkArena {
    pub fn new() -> Self {
        ChunkArena::default()
    }

    /// Registers a fresh chunk and writes its header into memory.
    ///
    /// # Safety
    /// `record.base` must be word aligned and writable for `HEADER_SIZE` bytes.
    pub unsafe fn insert(&mut self, record: ChunkRecord) -> ChunkId {
        let id = ChunkId(self.records.len());
        let header = HeaderWord::Head {
            state: record.state,
            chunk: id,
        };
        unsafe { header.write(record.base) };
        self.records.push(record);
        id
    }

    pub fn get(&self, id: ChunkId) -> Option<&ChunkRecord> {
        self.records.get(id.0)
    }

    pub fn record(&self, id: ChunkId) -> &ChunkRecord {
        match self.records.get(id.0) {
            Some(record) => record,
            None => fatal(HeapViolation::ListMismatch(id.0, "unknown chunk id")),
        }
    }

    pub fn record_mut(&mut self, id: ChunkId) -> &mut ChunkRecord {
        match self.records.get_mut(id.0) {
            Some(record) => record,
            None => fatal(HeapViolation::ListMismatch(id.0, "unknown chunk id")),
        }
    }

    /// Moves a chunk from `from` to the following state, mirroring the new
    /// state into the in-memory header.
    pub fn advance(&mut self, id: ChunkId, from: ChunkState) {
        let record = self.record_mut(id);
        if record.state != from {
            fatal(HeapViolation::StateMismatch(record.base, from, record.state));
        }
        record.state = from.next();
        let header = HeaderWord::Head {
            state: record.state,
            chunk: id,
        };
        unsafe { header.write(record.base) };
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
