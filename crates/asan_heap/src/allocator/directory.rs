//! # directory
//! The `AllocationDirectory` is the front of the heap. It computes the
//! redzone-padded size class of each request, takes a chunk from the
//! `SizeClassPool`, places the user allocation inside it and unpoisons
//! exactly the bytes the caller asked for. On release the usable range is
//! poisoned again and the chunk is handed to the `Quarantine`.
//!
//! Every address handed out is aligned to at least the redzone size, and the
//! chunk header always sits at least one redzone in front of it. A user
//! pointer is traced back to its chunk by reading the header word one
//! redzone before it, which is either the chunk's own head or, for
//! allocations aligned beyond the redzone size, an alignment marker naming
//! the chunk.
use alloc::{format, vec::Vec};

use log::{debug, trace};

use crate::{
    GuestAddr, PAGE_SIZE, WORD_SIZE,
    allocator::{
        chunk::{ChunkArena, ChunkId, ChunkInfo, ChunkState, HEADER_SIZE, HeaderWord},
        pool::SizeClassPool,
        quarantine::Quarantine,
        ring::Ring,
    },
    align_up,
    config::{self, ConfigError, HeapConfig},
    error::{HeapViolation, fatal},
    is_aligned, is_power_of_two,
    mem::{clear_words, copy_words, words_for},
    mmap::Mmap,
    shadow::{PoisonType, Shadow},
    stats::HeapStats,
};

#[derive(Debug)]
pub struct AllocationDirectory<M: Mmap, S: Shadow> {
    config: HeapConfig,
    arena: ChunkArena,
    pool: SizeClassPool<M>,
    quarantine: Quarantine,
    live: Ring,
    shadow: S,
    stats: HeapStats,
}

impl<M: Mmap, S: Shadow> AllocationDirectory<M, S> {
    pub const DEFAULT_REDZONE_SIZE: usize = config::DEFAULT_REDZONE_SIZE;
    pub const DEFAULT_QUARANTINE_SIZE: usize = config::DEFAULT_QUARANTINE_SIZE;

    pub fn new(shadow: S, config: HeapConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        debug!(
            "new - redzone: {:#x}, quarantine: {:#x}, min_batch: {:#x}",
            config.redzone_size, config.quarantine_size, config.min_batch_size
        );
        Ok(AllocationDirectory {
            config,
            arena: ChunkArena::new(),
            pool: SizeClassPool::new(config.min_batch_size),
            quarantine: Quarantine::new(config.quarantine_size),
            live: Ring::new(),
            shadow,
            stats: HeapStats::new(),
        })
    }

    pub fn allocate(&mut self, size: usize) -> Option<GuestAddr> {
        self.allocate_aligned(0, size)
    }

    /// Allocates `size` bytes aligned to `alignment`, where an alignment of
    /// zero means the redzone size. Returns `None` for a zero sized request.
    pub fn allocate_aligned(&mut self, alignment: usize, size: usize) -> Option<GuestAddr> {
        trace!("allocate_aligned - alignment: {alignment:#x}, size: {size:#x}");
        if size == 0 {
            return None;
        }
        let redzone = self.config.redzone_size;
        let alignment = self.effective_alignment(alignment);
        let class = self.size_class(alignment, size);
        let id = self
            .pool
            .acquire(&mut self.arena, &mut self.shadow, class, &mut self.stats);
        self.arena.advance(id, ChunkState::Available);

        let base = self.arena.record(id).base;
        let mut addr = base + redzone;
        if !is_aligned(addr, alignment) {
            addr = match align_up(addr, alignment) {
                Some(addr) => addr,
                None => fatal(HeapViolation::SizeOverflow(addr, alignment)),
            };
            unsafe { HeaderWord::AlignmentMarker { chunk: id }.write(addr - redzone) };
        }

        let record = self.arena.record_mut(id);
        record.used_size = size;
        record.user_addr = addr;
        self.live.push_front(&mut self.arena, id);
        self.unpoison(addr, size);

        self.stats.mallocs += 1;
        self.stats.malloced += size as u64;
        trace!("allocate_aligned - addr: {addr:#x}, base: {base:#x}, class: {class:#x}");
        Some(addr)
    }

    /// Allocates space for `count` objects of `size` bytes and zeroes it.
    pub fn allocate_zeroed(&mut self, count: usize, size: usize) -> Option<GuestAddr> {
        trace!("allocate_zeroed - count: {count:#x}, size: {size:#x}");
        let Some(total) = count.checked_mul(size) else {
            fatal(HeapViolation::SizeOverflow(count, size));
        };
        let addr = self.allocate(total)?;
        unsafe { clear_words(addr, words_for(total)) };
        Some(addr)
    }

    /// Page aligned allocation, as `valloc`.
    pub fn allocate_page_aligned(&mut self, size: usize) -> Option<GuestAddr> {
        self.allocate_aligned(PAGE_SIZE, size)
    }

    /// Page aligned allocation of a whole number of pages, as `pvalloc`. A
    /// zero sized request is given a single page.
    pub fn allocate_page_rounded(&mut self, size: usize) -> Option<GuestAddr> {
        let size = match size {
            0 => PAGE_SIZE,
            size => match align_up(size, PAGE_SIZE) {
                Some(size) => size,
                None => fatal(HeapViolation::SizeOverflow(size, PAGE_SIZE)),
            },
        };
        self.allocate_aligned(PAGE_SIZE, size)
    }

    /// Aligned allocation with `posix_memalign` semantics. The alignment must
    /// be a power of two multiple of the word size. Returns the allocation
    /// together with the error code to report, which is always zero since
    /// failures are fatal.
    pub fn posix_aligned_allocate(
        &mut self,
        alignment: usize,
        size: usize,
    ) -> (Option<GuestAddr>, i32) {
        trace!("posix_aligned_allocate - alignment: {alignment:#x}, size: {size:#x}");
        if !is_power_of_two(alignment) || alignment % WORD_SIZE != 0 {
            fatal(HeapViolation::InvalidAlignment(alignment));
        }
        if size == 0 {
            return (None, 0);
        }
        (self.allocate_aligned(alignment, size), 0)
    }

    /// Moves an allocation to a chunk of `size` bytes, copying the smaller of
    /// the old and new sizes. A null pointer allocates and a zero size frees.
    pub fn reallocate(&mut self, ptr: GuestAddr, size: usize) -> Option<GuestAddr> {
        trace!("reallocate - ptr: {ptr:#x}, size: {size:#x}");
        if ptr == 0 {
            return self.allocate(size);
        }
        if size == 0 {
            self.deallocate(ptr);
            return None;
        }
        let old = self.resolve_allocated(ptr);
        let old_size = self.arena.record(old).used_size;
        let addr = self.allocate(size)?;
        let copied = old_size.min(size);
        unsafe { copy_words(addr, ptr, words_for(copied)) };
        self.deallocate(ptr);
        self.stats.reallocs += 1;
        self.stats.realloced += copied as u64;
        Some(addr)
    }

    pub fn deallocate(&mut self, ptr: GuestAddr) {
        trace!("deallocate - ptr: {ptr:#x}");
        if ptr == 0 {
            return;
        }
        let id = self.resolve_allocated(ptr);
        let used = self.arena.record(id).used_size;
        let rounded = self.rounded_usable(used);
        self.poison(ptr, rounded, PoisonType::AsanHeapFreed);
        self.live.remove(&mut self.arena, id);
        self.arena.advance(id, ChunkState::Allocated);
        self.stats.frees += 1;
        self.stats.freed += used as u64;
        self.quarantine
            .enqueue(&mut self.arena, &mut self.pool, id, &mut self.stats);
    }

    /// The size requested for the live allocation at `ptr`, zero for null.
    pub fn usable_size(&self, ptr: GuestAddr) -> usize {
        if ptr == 0 {
            return 0;
        }
        let id = self.resolve_allocated(ptr);
        self.arena.record(id).used_size
    }

    /// Looks up the chunk behind a pointer previously handed out, whatever
    /// its current state.
    pub fn resolve_chunk(&self, ptr: GuestAddr) -> ChunkInfo {
        ChunkInfo::from(self.arena.record(self.resolve(ptr)))
    }

    /// As `resolve_chunk`, but `None` for a pointer which was never handed out
    /// by this directory instead of a fatal error.
    pub fn try_resolve_chunk(&self, ptr: GuestAddr) -> Option<ChunkInfo> {
        let id = self.try_resolve(ptr).ok()?;
        Some(ChunkInfo::from(self.arena.record(id)))
    }

    /// Every allocation which has not yet been freed, most recent first.
    pub fn live_chunks(&self) -> Vec<ChunkInfo> {
        self.live
            .iter(&self.arena)
            .map(|id| ChunkInfo::from(self.arena.record(id)))
            .collect()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// The total size of the chunks currently held in the quarantine.
    pub fn quarantined_bytes(&self) -> usize {
        self.quarantine.held()
    }

    pub fn quarantine_size(&self) -> usize {
        self.quarantine.budget()
    }

    /// Changes the quarantine budget, evicting straight away if the
    /// quarantine holds more than the new budget allows.
    pub fn set_quarantine_size(&mut self, quarantine_size: usize) {
        self.config.quarantine_size = quarantine_size;
        self.quarantine.set_budget(
            &mut self.arena,
            &mut self.pool,
            quarantine_size,
            &mut self.stats,
        );
    }

    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    pub fn shadow(&self) -> &S {
        &self.shadow
    }

    pub fn shadow_mut(&mut self) -> &mut S {
        &mut self.shadow
    }

    /// The size of the chunk which backs an allocation of `size` bytes at
    /// `alignment`.
    pub fn size_class(&self, alignment: usize, size: usize) -> usize {
        let redzone = self.config.redzone_size;
        let alignment = self.effective_alignment(alignment);
        let rounded = self.rounded_usable(size);
        let slack = if alignment > redzone { alignment } else { 0 };
        let needed = rounded
            .checked_add(redzone)
            .and_then(|n| n.checked_add(slack))
            .and_then(usize::checked_next_power_of_two);
        match needed {
            Some(class) => class.max(self.config.min_alloc_size()),
            None => fatal(HeapViolation::SizeOverflow(size, alignment)),
        }
    }

    /// Walks every list and checks that each chunk is on exactly the list
    /// matching its state.
    pub fn verify(&self) {
        let redzone = self.config.redzone_size;
        for id in self.live.iter(&self.arena) {
            let record = self.arena.record(id);
            if record.state != ChunkState::Allocated {
                fatal(HeapViolation::StateMismatch(
                    record.base,
                    ChunkState::Allocated,
                    record.state,
                ));
            }
            let end = record.user_addr + self.rounded_usable(record.used_size);
            if record.user_addr < record.base + redzone
                || end > record.base + record.allocated_size
            {
                fatal(HeapViolation::ListMismatch(
                    record.base,
                    "allocation outside of its chunk",
                ));
            }
        }
        self.quarantine.verify(&self.arena);
        let free = self.pool.verify(&self.arena);
        if self.live.len() + self.quarantine.len() + free != self.arena.len() {
            fatal(HeapViolation::ListMismatch(0, "chunk missing from every list"));
        }
    }

    fn effective_alignment(&self, alignment: usize) -> usize {
        let redzone = self.config.redzone_size;
        match alignment {
            0 => redzone,
            alignment if !is_power_of_two(alignment) => {
                fatal(HeapViolation::NotPowerOfTwo(alignment))
            }
            alignment => alignment.max(redzone),
        }
    }

    fn rounded_usable(&self, size: usize) -> usize {
        let redzone = self.config.redzone_size;
        match align_up(size, redzone) {
            Some(rounded) => rounded,
            None => fatal(HeapViolation::SizeOverflow(size, redzone)),
        }
    }

    /// Finds the chunk for a pointer handed out by this directory. Anything
    /// which cannot be traced back to a chunk it was handed out from is an
    /// invalid free.
    fn resolve(&self, ptr: GuestAddr) -> ChunkId {
        self.try_resolve(ptr).unwrap_or_else(|violation| fatal(violation))
    }

    fn try_resolve(&self, ptr: GuestAddr) -> Result<ChunkId, HeapViolation> {
        let redzone = self.config.redzone_size;
        if ptr < redzone || !is_aligned(ptr, redzone) {
            Err(HeapViolation::InvalidFree(ptr))?;
        }
        let candidate = ptr - redzone;
        if !self.pool.contains(candidate, HEADER_SIZE) {
            Err(HeapViolation::InvalidFree(ptr))?;
        }
        let header = unsafe { HeaderWord::read(candidate) }
            .map_err(|_| HeapViolation::InvalidFree(ptr))?;
        let id = match header {
            HeaderWord::Head { state, chunk } => {
                let record = self
                    .arena
                    .get(chunk)
                    .ok_or(HeapViolation::InvalidFree(ptr))?;
                if record.base != candidate {
                    Err(HeapViolation::InvalidFree(ptr))?;
                }
                if record.state != state {
                    Err(HeapViolation::CorruptHeader(candidate, state.tag()))?;
                }
                chunk
            }
            HeaderWord::AlignmentMarker { chunk } => {
                let record = self
                    .arena
                    .get(chunk)
                    .ok_or(HeapViolation::InvalidFree(ptr))?;
                if candidate <= record.base || candidate >= record.base + record.allocated_size {
                    Err(HeapViolation::InvalidFree(ptr))?;
                }
                chunk
            }
        };
        if self.arena.record(id).user_addr != ptr {
            Err(HeapViolation::InvalidFree(ptr))?;
        }
        Ok(id)
    }

    fn resolve_allocated(&self, ptr: GuestAddr) -> ChunkId {
        let id = self.resolve(ptr);
        let record = self.arena.record(id);
        match record.state {
            ChunkState::Allocated => id,
            ChunkState::Quarantined => fatal(HeapViolation::DoubleFree(ptr)),
            state => fatal(HeapViolation::StateMismatch(
                record.base,
                ChunkState::Allocated,
                state,
            )),
        }
    }

    fn poison(&mut self, start: GuestAddr, len: usize, val: PoisonType) {
        self.shadow
            .poison(start, len, val)
            .unwrap_or_else(|e| fatal(HeapViolation::ShadowFailed(start, len, format!("{e:?}"))));
    }

    fn unpoison(&mut self, start: GuestAddr, len: usize) {
        self.shadow
            .unpoison(start, len)
            .unwrap_or_else(|e| fatal(HeapViolation::ShadowFailed(start, len, format!("{e:?}"))));
    }
}
