//! Fuzz testing for page allocation state transitions.
//!
//! This fuzz target drives a page through arbitrary sequences of alloc,
//! realloc, release, and reset-when-empty operations to ensure the
//! allocator's accounting stays consistent and no reachable sequence
//! panics. (Reset with live buffers panics by contract and is therefore
//! never issued here.)

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use evcache::Page;

#[derive(Debug, Arbitrary)]
enum PageOp {
    Alloc { size: u16 },
    Realloc { index: u8, new_size: u16 },
    Release { index: u8 },
    ResetWhenEmpty,
}

#[derive(Debug, Arbitrary)]
struct OpsInput {
    capacity: u16,
    ops: Vec<PageOp>,
}

fuzz_target!(|input: OpsInput| {
    let dir = tempfile::tempdir().unwrap();
    let mut page =
        match Page::create(dir.path().join("fuzz.page"), 1, input.capacity as usize) {
            Ok(page) => page,
            Err(_) => return,
        };

    // Offsets of buffers the "cache" still holds; kept in sync with the
    // page's own live_count.
    let mut live: Vec<usize> = Vec::new();

    for op in input.ops {
        match op {
            PageOp::Alloc { size } => {
                if let Some(off) = page.alloc(size as usize) {
                    live.push(off);
                }
            }
            PageOp::Realloc { index, new_size } => {
                if live.is_empty() {
                    continue;
                }
                let i = index as usize % live.len();
                if let Some(off) = page.realloc(live[i], new_size as usize).unwrap() {
                    live[i] = off;
                }
            }
            PageOp::Release { index } => {
                if live.is_empty() {
                    continue;
                }
                let i = index as usize % live.len();
                let off = live.swap_remove(i);
                page.release(off).unwrap();
            }
            PageOp::ResetWhenEmpty => {
                if page.live_count() == 0 {
                    live.clear();
                    page.reset();
                }
            }
        }

        assert_eq!(page.live_count(), live.len());
        assert!(page.free_bytes() <= page.size());
    }
});
