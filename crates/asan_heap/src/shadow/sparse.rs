//! # sparse
//! This implementation of the shadow map keeps the shadow bytes in pages
//! which are created on first write and indexed by a sorted map. Memory for
//! which no shadow page exists is considered accessible. It uses the
//! conventional 8:1 encoding: a shadow byte of `0` marks a fully accessible
//! granule, `1..=7` marks that only that many leading bytes are accessible
//! and any value with the top bit set marks the whole granule as poisoned.
use alloc::{boxed::Box, collections::BTreeMap, vec};

use log::debug;
use thiserror::Error;

use crate::{
    GuestAddr,
    shadow::{PoisonType, SHADOW_GRANULE, SHADOW_SHIFT, Shadow},
};

const SHADOW_PAGE_SIZE: usize = 4096;

#[derive(Debug, Default)]
pub struct SparseShadow {
    pages: BTreeMap<usize, Box<[u8]>>,
}

impl Shadow for SparseShadow {
    type Error = SparseShadowError;

    fn poison(
        &mut self,
        start: GuestAddr,
        len: usize,
        val: PoisonType,
    ) -> Result<(), Self::Error> {
        debug!("poison - start: {start:#x}, len: {len:#x}, poison: {val:?}");
        let end = Self::end(start, len)?;
        if !Self::is_granule_aligned(start) {
            Err(SparseShadowError::UnalignedStartAddress(start))?;
        }
        if !Self::is_granule_aligned(end) {
            Err(SparseShadowError::UnalignedEndAddress(start, len))?;
        }
        self.fill(start >> SHADOW_SHIFT, end >> SHADOW_SHIFT, val.into());
        Ok(())
    }

    fn unpoison(&mut self, start: GuestAddr, len: usize) -> Result<(), Self::Error> {
        debug!("unpoison - start: {start:#x}, len: {len:#x}");
        let end = Self::end(start, len)?;
        if !Self::is_granule_aligned(start) {
            Err(SparseShadowError::UnalignedStartAddress(start))?;
        }
        self.fill(start >> SHADOW_SHIFT, end >> SHADOW_SHIFT, 0);
        let partial = end & (SHADOW_GRANULE - 1);
        if partial != 0 {
            *self.granule_mut(end >> SHADOW_SHIFT) = partial as u8;
        }
        Ok(())
    }

    fn is_poison(&self, start: GuestAddr, len: usize) -> Result<bool, Self::Error> {
        let end = Self::end(start, len)?;
        let mut addr = start;
        while addr < end {
            let val = self.granule(addr >> SHADOW_SHIFT);
            let granule_end = (addr | (SHADOW_GRANULE - 1)).saturating_add(1).min(end);
            if val != 0 {
                if val & 0x80 != 0 {
                    return Ok(true);
                }
                let last = (granule_end - 1) & (SHADOW_GRANULE - 1);
                if last >= val as usize {
                    return Ok(true);
                }
            }
            addr = granule_end;
        }
        Ok(false)
    }
}

impl SparseShadow {
    pub fn new() -> Result<Self, SparseShadowError> {
        Ok(SparseShadow::default())
    }

    /// Returns the raw shadow byte describing the granule containing `addr`.
    pub fn shadow_byte(&self, addr: GuestAddr) -> u8 {
        self.granule(addr >> SHADOW_SHIFT)
    }

    pub const fn is_granule_aligned(addr: GuestAddr) -> bool {
        addr & (SHADOW_GRANULE - 1) == 0
    }

    fn end(start: GuestAddr, len: usize) -> Result<GuestAddr, SparseShadowError> {
        start
            .checked_add(len)
            .ok_or(SparseShadowError::AddressRangeOverflow(start, len))
    }

    fn granule(&self, granule: usize) -> u8 {
        self.pages
            .get(&(granule / SHADOW_PAGE_SIZE))
            .map_or(0, |page| page[granule % SHADOW_PAGE_SIZE])
    }

    fn granule_mut(&mut self, granule: usize) -> &mut u8 {
        let page = self
            .pages
            .entry(granule / SHADOW_PAGE_SIZE)
            .or_insert_with(|| vec![0; SHADOW_PAGE_SIZE].into_boxed_slice());
        &mut page[granule % SHADOW_PAGE_SIZE]
    }

    fn fill(&mut self, mut first: usize, last: usize, val: u8) {
        while first < last {
            let page_idx = first / SHADOW_PAGE_SIZE;
            let offset = first % SHADOW_PAGE_SIZE;
            let count = (SHADOW_PAGE_SIZE - offset).min(last - first);
            if val == 0 && !self.pages.contains_key(&page_idx) {
                first += count;
                continue;
            }
            let page = self
                .pages
                .entry(page_idx)
                .or_insert_with(|| vec![0; SHADOW_PAGE_SIZE].into_boxed_slice());
            page[offset..offset + count].fill(val);
            first += count;
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum SparseShadowError {
    #[error("Address overflow: {0:#x}, len: {1:#x}")]
    AddressRangeOverflow(GuestAddr, usize),
    #[error("Unaligned start address: {0:#x}")]
    UnalignedStartAddress(GuestAddr),
    #[error("Unaligned end address: {0:#x}, len: {1:#x}")]
    UnalignedEndAddress(GuestAddr, usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: GuestAddr = 0x10_0000;

    #[test]
    fn test_untouched_memory_is_accessible() {
        let shadow = SparseShadow::new().unwrap();
        assert_eq!(shadow.is_poison(BASE, 0x1000), Ok(false));
    }

    #[test]
    fn test_poison_whole_granules() {
        let mut shadow = SparseShadow::new().unwrap();
        shadow.poison(BASE, 0x20, PoisonType::AsanHeapLeftRz).unwrap();
        assert_eq!(shadow.shadow_byte(BASE), 0xfa);
        assert_eq!(shadow.is_poison(BASE - 1, 1), Ok(false));
        assert_eq!(shadow.is_poison(BASE, 1), Ok(true));
        assert_eq!(shadow.is_poison(BASE + 0x1f, 1), Ok(true));
        assert_eq!(shadow.is_poison(BASE + 0x20, 1), Ok(false));
        assert_eq!(shadow.is_poison(BASE - 4, 8), Ok(true));
    }

    #[test]
    fn test_unpoison_partial_granule() {
        let mut shadow = SparseShadow::new().unwrap();
        shadow.poison(BASE, 0x40, PoisonType::AsanHeapLeftRz).unwrap();
        shadow.unpoison(BASE, 0x11).unwrap();
        assert_eq!(shadow.shadow_byte(BASE + 0x10), 1);
        for i in 0..0x40 {
            assert_eq!(shadow.is_poison(BASE + i, 1), Ok(i >= 0x11), "offset {i:#x}");
        }
        assert_eq!(shadow.is_poison(BASE, 0x11), Ok(false));
        assert_eq!(shadow.is_poison(BASE, 0x12), Ok(true));
    }

    #[test]
    fn test_poison_spans_shadow_pages() {
        let mut shadow = SparseShadow::new().unwrap();
        let len = SHADOW_PAGE_SIZE * SHADOW_GRANULE * 3;
        shadow.poison(BASE, len, PoisonType::AsanHeapFreed).unwrap();
        assert_eq!(shadow.is_poison(BASE + len - 1, 1), Ok(true));
        shadow.unpoison(BASE, len).unwrap();
        assert_eq!(shadow.is_poison(BASE, len), Ok(false));
    }

    #[test]
    fn test_poison_unaligned() {
        let mut shadow = SparseShadow::new().unwrap();
        assert_eq!(
            shadow.poison(BASE + 1, 8, PoisonType::AsanUser),
            Err(SparseShadowError::UnalignedStartAddress(BASE + 1))
        );
        assert_eq!(
            shadow.poison(BASE, 9, PoisonType::AsanUser),
            Err(SparseShadowError::UnalignedEndAddress(BASE, 9))
        );
    }

    #[test]
    fn test_overflow() {
        let shadow = SparseShadow::new().unwrap();
        assert_eq!(
            shadow.is_poison(GuestAddr::MAX, 2),
            Err(SparseShadowError::AddressRangeOverflow(GuestAddr::MAX, 2))
        );
    }
}
