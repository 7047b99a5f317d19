#![no_main]

use std::sync::LazyLock;

use arbitrary::Arbitrary;
use asan_heap::{
    GuestAddr, PAGE_SIZE,
    allocator::AllocationDirectory,
    config::HeapConfig,
    mmap::heap::HeapMmap,
    shadow::{Shadow, sparse::SparseShadow},
};
use libfuzzer_sys::fuzz_target;
use log::info;

type DF = AllocationDirectory<HeapMmap, SparseShadow>;

static INIT_LOGGER: LazyLock<()> = LazyLock::new(|| env_logger::init());

const MAX_LENGTH: usize = 0x3ff;
/*
 * Favour unaligned and minimally aligned requests since these are the most
 * common
 */
const ALIGNMENTS: [usize; 16] = [0, 0, 0, 0, 0, 8, 8, 8, 8, 16, 32, 64, 128, 256, 512, 1024];
const ALIGNMENTS_MASK: usize = ALIGNMENTS.len() - 1;

#[derive(Arbitrary, Debug)]
enum Op {
    Alloc { len: usize, align: usize },
    Free { idx: usize },
    Realloc { idx: usize, len: usize },
    SetQuarantine { pages: u8 },
}

#[derive(Arbitrary, Debug)]
struct Input {
    quarantine_pages: u8,
    ops: Vec<Op>,
}

fn check_live(directory: &DF, buf: GuestAddr, len: usize) {
    let redzone = directory.config().redzone_size;
    for i in buf - redzone..buf + len + redzone {
        let expected = i < buf || i >= buf + len;
        let poisoned = directory.shadow().is_poison(i, 1).unwrap();
        assert_eq!(expected, poisoned);
    }
}

fuzz_target!(|input: Input| {
    LazyLock::force(&INIT_LOGGER);
    let config = HeapConfig::new()
        .with_quarantine_size(input.quarantine_pages as usize * PAGE_SIZE)
        .with_min_batch_size(16 * PAGE_SIZE);
    let mut directory = DF::new(SparseShadow::new().unwrap(), config).unwrap();
    let mut live: Vec<(GuestAddr, usize)> = Vec::new();

    for op in input.ops {
        info!("op: {op:?}");
        match op {
            Op::Alloc { len, align } => {
                let len = len & MAX_LENGTH;
                let align = ALIGNMENTS[align & ALIGNMENTS_MASK];
                match directory.allocate_aligned(align, len) {
                    Some(buf) => {
                        assert!(align == 0 || buf % align == 0);
                        check_live(&directory, buf, len);
                        live.push((buf, len));
                    }
                    None => assert_eq!(len, 0),
                }
            }
            Op::Free { idx } => {
                if !live.is_empty() {
                    let (buf, len) = live.swap_remove(idx % live.len());
                    directory.deallocate(buf);
                    assert!(directory.shadow().is_poison(buf, len).unwrap());
                }
            }
            Op::Realloc { idx, len } => {
                if !live.is_empty() {
                    let len = len & MAX_LENGTH;
                    let (buf, _) = live.swap_remove(idx % live.len());
                    if let Some(new) = directory.reallocate(buf, len) {
                        check_live(&directory, new, len);
                        live.push((new, len));
                    }
                }
            }
            Op::SetQuarantine { pages } => {
                directory.set_quarantine_size(pages as usize * PAGE_SIZE);
            }
        }
        assert!(directory.quarantined_bytes() <= directory.quarantine_size());
    }

    assert_eq!(directory.live_count(), live.len());
    directory.verify();
});
