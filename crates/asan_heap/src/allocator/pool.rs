//! # pool
//! The size class pool owns one free list per power-of-two chunk size. A
//! class whose list runs dry is refilled with a fresh region from the `Mmap`
//! implementation: the whole region is poisoned and then carved into
//! equally sized chunks. Regions are never returned, so every chunk ever
//! carved stays addressable for the lifetime of the pool.
//!
//! Each region is mapped one page larger than the memory carved from it. The
//! trailing page is never handed out and stays poisoned, so the last chunk in
//! a region is followed by invalid memory just like every other chunk.
use alloc::{collections::BTreeMap, format};

use log::debug;

use crate::{
    GuestAddr, PAGE_SIZE,
    allocator::{
        chunk::{ChunkArena, ChunkId, ChunkRecord, ChunkState},
        ring::Ring,
    },
    error::{HeapViolation, fatal},
    is_power_of_two,
    mmap::Mmap,
    shadow::{PoisonType, Shadow},
    stats::HeapStats,
};

const NUM_CLASSES: usize = usize::BITS as usize;

#[derive(Debug)]
struct Region<M: Mmap> {
    _map: M,
    carved: usize,
}

#[derive(Debug)]
pub struct SizeClassPool<M: Mmap> {
    free_lists: [Ring; NUM_CLASSES],
    regions: BTreeMap<GuestAddr, Region<M>>,
    min_batch_size: usize,
}

impl<M: Mmap> SizeClassPool<M> {
    pub fn new(min_batch_size: usize) -> Self {
        SizeClassPool {
            free_lists: [Ring::new(); NUM_CLASSES],
            regions: BTreeMap::new(),
            min_batch_size,
        }
    }

    const fn class_index(class: usize) -> usize {
        class.trailing_zeros() as usize
    }

    /// Takes a chunk of exactly `class` bytes off its free list, refilling
    /// the list first if it is empty. The chunk is still `Available`.
    pub fn acquire<S: Shadow>(
        &mut self,
        arena: &mut ChunkArena,
        shadow: &mut S,
        class: usize,
        stats: &mut HeapStats,
    ) -> ChunkId {
        if !is_power_of_two(class) {
            fatal(HeapViolation::NotPowerOfTwo(class));
        }
        let index = Self::class_index(class);
        if self.free_lists[index].is_empty() {
            self.refill(arena, shadow, class, stats);
        }
        match self.free_lists[index].pop_front(arena) {
            Some(id) => id,
            None => fatal(HeapViolation::ListMismatch(class, "free list empty after refill")),
        }
    }

    fn refill<S: Shadow>(
        &mut self,
        arena: &mut ChunkArena,
        shadow: &mut S,
        class: usize,
        stats: &mut HeapStats,
    ) {
        let region_size = class.max(self.min_batch_size);
        let Some(len) = region_size.checked_add(PAGE_SIZE) else {
            fatal(HeapViolation::SizeOverflow(region_size, PAGE_SIZE));
        };
        debug!("refill - class: {class:#x}, len: {len:#x}");
        let map = M::map(len)
            .unwrap_or_else(|e| fatal(HeapViolation::PageSupplyFailed(len, format!("{e:?}"))));
        let base = map.addr();
        shadow
            .poison(base, len, PoisonType::AsanHeapLeftRz)
            .unwrap_or_else(|e| fatal(HeapViolation::ShadowFailed(base, len, format!("{e:?}"))));

        let list = &mut self.free_lists[Self::class_index(class)];
        for offset in (0..region_size).step_by(class).rev() {
            let id = unsafe { arena.insert(ChunkRecord::available(base + offset, class)) };
            list.push_front(arena, id);
        }
        debug!(
            "refill - base: {base:#x}, chunks: {:#x}",
            region_size / class
        );

        self.regions.insert(
            base,
            Region {
                _map: map,
                carved: region_size,
            },
        );
        stats.mmaps += 1;
        stats.mmaped += len as u64;
    }

    /// Returns an `Available` chunk to the free list of its class. Chunks are
    /// handed out again most recently released first.
    pub fn release(&mut self, arena: &mut ChunkArena, id: ChunkId) {
        let record = arena.record(id);
        if record.state != ChunkState::Available {
            fatal(HeapViolation::StateMismatch(
                record.base,
                ChunkState::Available,
                record.state,
            ));
        }
        let index = Self::class_index(record.allocated_size);
        self.free_lists[index].push_front(arena, id);
    }

    /// Whether `[addr, addr + len)` lies within memory carved into chunks.
    pub fn contains(&self, addr: GuestAddr, len: usize) -> bool {
        let Some(end) = addr.checked_add(len) else {
            return false;
        };
        self.regions
            .range(..=addr)
            .next_back()
            .is_some_and(|(base, region)| end <= base + region.carved)
    }

    pub fn free_count(&self, class: usize) -> usize {
        if !is_power_of_two(class) {
            return 0;
        }
        self.free_lists[Self::class_index(class)].len()
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Checks that every chunk on a free list is `Available`, belongs to the
    /// class of its list and lies inside a region. Returns the number of free
    /// chunks.
    pub fn verify(&self, arena: &ChunkArena) -> usize {
        let mut count = 0;
        for (index, list) in self.free_lists.iter().enumerate() {
            for id in list.iter(arena) {
                let record = arena.record(id);
                if record.state != ChunkState::Available {
                    fatal(HeapViolation::StateMismatch(
                        record.base,
                        ChunkState::Available,
                        record.state,
                    ));
                }
                if record.allocated_size != 1 << index {
                    fatal(HeapViolation::ListMismatch(
                        record.base,
                        "chunk on free list of another class",
                    ));
                }
                if !self.contains(record.base, record.allocated_size) {
                    fatal(HeapViolation::ListMismatch(
                        record.base,
                        "free chunk outside of any region",
                    ));
                }
                count += 1;
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mmap::heap::HeapMmap, shadow::sparse::SparseShadow};

    struct Fixture {
        arena: ChunkArena,
        shadow: SparseShadow,
        stats: HeapStats,
        pool: SizeClassPool<HeapMmap>,
    }

    fn fixture() -> Fixture {
        Fixture {
            arena: ChunkArena::new(),
            shadow: SparseShadow::new().unwrap(),
            stats: HeapStats::new(),
            pool: SizeClassPool::new(PAGE_SIZE),
        }
    }

    impl Fixture {
        fn acquire(&mut self, class: usize) -> ChunkId {
            self.pool
                .acquire(&mut self.arena, &mut self.shadow, class, &mut self.stats)
        }
    }

    #[test]
    fn test_refill_carves_region() {
        let mut f = fixture();
        let first = f.acquire(128);
        let second = f.acquire(128);
        let a = f.arena.record(first).clone();
        let b = f.arena.record(second).clone();
        assert_eq!(a.allocated_size, 128);
        assert_eq!(a.state, ChunkState::Available);
        assert_eq!(b.base, a.base + 128);
        assert_eq!(f.pool.free_count(128), PAGE_SIZE / 128 - 2);
        assert_eq!(f.pool.region_count(), 1);
        assert_eq!(f.stats.mmaps, 1);
        assert_eq!(f.stats.mmaped, 2 * PAGE_SIZE as u64);
        assert!(f.pool.contains(a.base, PAGE_SIZE));
        assert!(!f.pool.contains(a.base + PAGE_SIZE, 1));
        assert!(f.shadow.is_poison(a.base, 2 * PAGE_SIZE).unwrap());
    }

    #[test]
    fn test_large_class_gets_own_region() {
        let mut f = fixture();
        let id = f.acquire(4 * PAGE_SIZE);
        assert_eq!(f.arena.record(id).allocated_size, 4 * PAGE_SIZE);
        assert_eq!(f.pool.free_count(4 * PAGE_SIZE), 0);
        assert_eq!(f.stats.mmaped, 5 * PAGE_SIZE as u64);
    }

    #[test]
    fn test_release_is_reused_first() {
        let mut f = fixture();
        let first = f.acquire(256);
        let second = f.acquire(256);
        f.arena.advance(first, ChunkState::Available);
        f.arena.advance(first, ChunkState::Allocated);
        f.arena.advance(first, ChunkState::Quarantined);
        f.pool.release(&mut f.arena, first);
        assert_eq!(f.acquire(256), first);
        assert_ne!(f.acquire(256), second);
        assert_eq!(f.pool.verify(&f.arena), PAGE_SIZE / 256 - 3);
    }

    #[test]
    #[should_panic]
    fn test_release_allocated_chunk() {
        let mut f = fixture();
        let id = f.acquire(128);
        f.arena.advance(id, ChunkState::Available);
        f.pool.release(&mut f.arena, id);
    }

    #[test]
    #[should_panic]
    fn test_acquire_not_power_of_two() {
        let mut f = fixture();
        f.acquire(96);
    }
}
