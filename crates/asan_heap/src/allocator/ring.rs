//! # ring
//! A circular doubly-linked list of chunks, threaded through the `prev` and
//! `next` links of the records in a `ChunkArena`. A chunk is linked into at
//! most one ring at a time: the free list of its size class, the live list or
//! the quarantine. A ring holding a single chunk has it linked to itself.
use crate::{
    allocator::chunk::{ChunkArena, ChunkId, ChunkRecord},
    error::{HeapViolation, fatal},
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Ring {
    head: Option<ChunkId>,
    len: usize,
}

impl Ring {
    pub const fn new() -> Self {
        Ring { head: None, len: 0 }
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub const fn front(&self) -> Option<ChunkId> {
        self.head
    }

    pub fn back(&self, arena: &ChunkArena) -> Option<ChunkId> {
        self.head.and_then(|head| arena.record(head).prev)
    }

    pub fn push_front(&mut self, arena: &mut ChunkArena, id: ChunkId) {
        let record = arena.record(id);
        if record.is_linked() {
            fatal(HeapViolation::ListMismatch(record.base, "chunk already linked"));
        }
        match self.head {
            None => {
                let record = arena.record_mut(id);
                record.prev = Some(id);
                record.next = Some(id);
            }
            Some(head) => {
                let tail = Self::link(arena, head, |r| r.prev);
                arena.record_mut(tail).next = Some(id);
                arena.record_mut(head).prev = Some(id);
                let record = arena.record_mut(id);
                record.prev = Some(tail);
                record.next = Some(head);
            }
        }
        self.head = Some(id);
        self.len += 1;
    }

    pub fn pop_front(&mut self, arena: &mut ChunkArena) -> Option<ChunkId> {
        let head = self.head?;
        self.remove(arena, head);
        Some(head)
    }

    pub fn pop_back(&mut self, arena: &mut ChunkArena) -> Option<ChunkId> {
        let tail = self.back(arena)?;
        self.remove(arena, tail);
        Some(tail)
    }

    /// Unlinks `id`, which must currently be a member of this ring.
    pub fn remove(&mut self, arena: &mut ChunkArena, id: ChunkId) {
        let Some(head) = self.head else {
            fatal(HeapViolation::ListMismatch(
                arena.record(id).base,
                "remove from empty ring",
            ));
        };
        let prev = Self::link(arena, id, |r| r.prev);
        let next = Self::link(arena, id, |r| r.next);
        if next == id {
            if head != id {
                fatal(HeapViolation::ListMismatch(
                    arena.record(id).base,
                    "chunk not in ring",
                ));
            }
            self.head = None;
        } else {
            arena.record_mut(prev).next = Some(next);
            arena.record_mut(next).prev = Some(prev);
            if head == id {
                self.head = Some(next);
            }
        }
        let record = arena.record_mut(id);
        record.prev = None;
        record.next = None;
        self.len -= 1;
    }

    /// Iterates from the most recently pushed chunk to the oldest.
    pub fn iter<'a>(&self, arena: &'a ChunkArena) -> RingIter<'a> {
        RingIter {
            arena,
            next: self.head,
            remaining: self.len,
        }
    }

    fn link(
        arena: &ChunkArena,
        id: ChunkId,
        f: impl Fn(&ChunkRecord) -> Option<ChunkId>,
    ) -> ChunkId {
        let record = arena.record(id);
        match f(record) {
            Some(link) => link,
            None => fatal(HeapViolation::ListMismatch(record.base, "chunk not linked")),
        }
    }
}

pub struct RingIter<'a> {
    arena: &'a ChunkArena,
    next: Option<ChunkId>,
    remaining: usize,
}

impl Iterator for RingIter<'_> {
    type Item = ChunkId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next?;
        self.remaining -= 1;
        self.next = self.arena.record(current).next;
        Some(current)
    }
}
