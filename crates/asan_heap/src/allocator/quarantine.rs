//! # quarantine
//! Freed chunks are not made available again straight away. They are queued
//! here in the order they were freed, and only once the total size of the
//! queued chunks exceeds the configured budget are the oldest evicted back to
//! the `SizeClassPool`. A dangling pointer therefore keeps pointing at
//! poisoned memory until at least `budget` bytes have been freed after it.
use log::debug;

use crate::{
    allocator::{
        chunk::{ChunkArena, ChunkId, ChunkState},
        pool::SizeClassPool,
        ring::Ring,
    },
    error::{HeapViolation, fatal},
    mmap::Mmap,
    stats::HeapStats,
};

#[derive(Debug)]
pub struct Quarantine {
    ring: Ring,
    held: usize,
    budget: usize,
}

impl Quarantine {
    pub const fn new(budget: usize) -> Self {
        Quarantine {
            ring: Ring::new(),
            held: 0,
            budget,
        }
    }

    /// The total `allocated_size` of the chunks currently held.
    pub const fn held(&self) -> usize {
        self.held
    }

    pub const fn budget(&self) -> usize {
        self.budget
    }

    pub const fn len(&self) -> usize {
        self.ring.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Queues a `Quarantined` chunk, then evicts the oldest chunks until the
    /// quarantine is back within its budget. The chunk just queued is evicted
    /// too if it alone exceeds the budget.
    pub fn enqueue<M: Mmap>(
        &mut self,
        arena: &mut ChunkArena,
        pool: &mut SizeClassPool<M>,
        id: ChunkId,
        stats: &mut HeapStats,
    ) {
        let record = arena.record(id);
        if record.state != ChunkState::Quarantined {
            fatal(HeapViolation::StateMismatch(
                record.base,
                ChunkState::Quarantined,
                record.state,
            ));
        }
        let size = record.allocated_size;
        self.held = match self.held.checked_add(size) {
            Some(held) => held,
            None => fatal(HeapViolation::SizeOverflow(self.held, size)),
        };
        self.ring.push_front(arena, id);
        self.drain(arena, pool, stats);
    }

    /// Changes the budget, evicting immediately if the quarantine now holds
    /// more than it allows.
    pub fn set_budget<M: Mmap>(
        &mut self,
        arena: &mut ChunkArena,
        pool: &mut SizeClassPool<M>,
        budget: usize,
        stats: &mut HeapStats,
    ) {
        debug!("set_budget - old: {:#x}, new: {budget:#x}", self.budget);
        self.budget = budget;
        self.drain(arena, pool, stats);
    }

    fn drain<M: Mmap>(
        &mut self,
        arena: &mut ChunkArena,
        pool: &mut SizeClassPool<M>,
        stats: &mut HeapStats,
    ) {
        while self.held > self.budget {
            let Some(oldest) = self.ring.pop_back(arena) else {
                fatal(HeapViolation::QuarantineUnderflow(self.held, 0));
            };
            let record = arena.record(oldest);
            let size = record.allocated_size;
            self.held = match self.held.checked_sub(size) {
                Some(held) => held,
                None => fatal(HeapViolation::QuarantineUnderflow(self.held, size)),
            };
            debug!(
                "evict - base: {:#x}, size: {size:#x}, held: {:#x}",
                record.base, self.held
            );
            arena.advance(oldest, ChunkState::Quarantined);
            pool.release(arena, oldest);
            stats.evictions += 1;
        }
    }

    /// Checks that every queued chunk is `Quarantined` and that their sizes
    /// add up to the tracked total, which must be within the budget.
    pub fn verify(&self, arena: &ChunkArena) {
        let mut total = 0usize;
        for id in self.ring.iter(arena) {
            let record = arena.record(id);
            if record.state != ChunkState::Quarantined {
                fatal(HeapViolation::StateMismatch(
                    record.base,
                    ChunkState::Quarantined,
                    record.state,
                ));
            }
            total = match total.checked_add(record.allocated_size) {
                Some(total) => total,
                None => fatal(HeapViolation::SizeOverflow(total, record.allocated_size)),
            };
        }
        if total != self.held {
            fatal(HeapViolation::QuarantineUnderflow(self.held, total));
        }
        if self.held > self.budget {
            fatal(HeapViolation::QuarantineOverBudget(self.held, self.budget));
        }
    }
}
