//! # Page Lifecycle Tests
//!
//! This module tests the full life of a cache page from the owning cache
//! manager's point of view, specifically:
//! 1. Construction accounting and capacity planning accessors
//! 2. Allocation until exhaustion and fallback signaling
//! 3. In-place and copy-based resizing across buffer positions
//! 4. Release bookkeeping, reset recycling, and the fail-fast reset defect
//! 5. Temporary-file hygiene across the page's lifetime
//!
//! ## Background
//!
//! A page never reclaims space buffer by buffer. The cache manager releases
//! buffers as replication events expire, watches `live_count`, and resets
//! the page once it is empty. Resetting earlier would hand out space the
//! cache still references, which is why that path must crash instead of
//! returning an error.
//!
//! ## Requirements Tested
//!
//! - R1: A fresh page exposes its full capacity and no live buffers
//! - R2: Exhaustion is signaled by `None` with no state mutated
//! - R3: Only the tail buffer resizes in place; earlier buffers are locked
//! - R4: Reset restores full capacity only once every buffer is released
//! - R5: The backing file exists for the page's lifetime and no longer

use evcache::{Page, StorageClass, BUFFER_HEADER_SIZE, SEQNO_NONE};
use tempfile::tempdir;

mod construction_tests {
    use super::*;

    #[test]
    fn fresh_page_has_full_capacity_and_no_live_buffers() {
        let dir = tempdir().unwrap();
        let page = Page::create(dir.path().join("cache.page.000001"), 1, 1000).unwrap();

        assert_eq!(page.free_bytes(), 1000 + BUFFER_HEADER_SIZE);
        assert_eq!(page.live_count(), 0);
        assert_eq!(page.size(), 1000 + BUFFER_HEADER_SIZE);
    }

    #[test]
    fn zero_capacity_page_fits_exactly_the_bootstrap_header() {
        let dir = tempdir().unwrap();
        let mut page = Page::create(dir.path().join("cache.page.000001"), 1, 0).unwrap();

        assert_eq!(page.free_bytes(), BUFFER_HEADER_SIZE);
        // Room for one header, none for any payload-bearing buffer.
        assert!(page.alloc(1).is_none());
        assert_eq!(page.alloc(0).unwrap(), BUFFER_HEADER_SIZE);
        assert_eq!(page.free_bytes(), 0);
    }

    #[test]
    fn pages_carry_their_identity() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.page.000007");
        let mut page = Page::create(&path, 7, 1000).unwrap();

        assert_eq!(page.id(), 7);
        assert!(page.name().ends_with("cache.page.000007"));

        let buf = page.alloc(16).unwrap();
        assert_eq!(page.header(buf).unwrap().page_id(), 7);
    }
}

mod allocation_tests {
    use super::*;

    #[test]
    fn cache_manager_scenario_alloc_fail_release_reset() {
        let dir = tempdir().unwrap();
        let mut page = Page::create(dir.path().join("cache.page.000001"), 1, 1000).unwrap();
        let full = page.free_bytes();

        let buf = page.alloc(100).unwrap();
        assert_eq!(page.free_bytes(), full - 100 - BUFFER_HEADER_SIZE);

        // Too large for the page: the signal to go create another page.
        assert!(page.alloc(2000).is_none());
        assert_eq!(page.free_bytes(), full - 100 - BUFFER_HEADER_SIZE);
        assert_eq!(page.live_count(), 1);

        page.release(buf).unwrap();
        assert_eq!(page.live_count(), 0);

        page.reset();
        assert_eq!(page.free_bytes(), full);
    }

    #[test]
    fn sequential_allocations_account_exactly() {
        let dir = tempdir().unwrap();
        let mut page = Page::create(dir.path().join("cache.page.000001"), 1, 4096).unwrap();
        let initial = page.free_bytes();

        let sizes = [512usize, 64, 0, 1024, 256];
        let mut offsets = Vec::new();
        for size in sizes {
            offsets.push(page.alloc(size).unwrap());
        }

        let consumed: usize = sizes.iter().map(|s| s + BUFFER_HEADER_SIZE).sum();
        assert_eq!(page.free_bytes(), initial - consumed);
        assert_eq!(page.live_count(), sizes.len());

        // Offsets are strictly increasing and non-overlapping.
        for pair in offsets.windows(2) {
            assert!(pair[1] >= pair[0] + BUFFER_HEADER_SIZE);
        }
    }

    #[test]
    fn payloads_do_not_alias() {
        let dir = tempdir().unwrap();
        let mut page = Page::create(dir.path().join("cache.page.000001"), 1, 4096).unwrap();

        let a = page.alloc(32).unwrap();
        let b = page.alloc(32).unwrap();

        page.payload_mut(a).unwrap().fill(0xAA);
        page.payload_mut(b).unwrap().fill(0xBB);

        assert!(page.payload(a).unwrap().iter().all(|&x| x == 0xAA));
        assert!(page.payload(b).unwrap().iter().all(|&x| x == 0xBB));
    }

    #[test]
    fn owner_orders_buffers_after_allocation() {
        let dir = tempdir().unwrap();
        let mut page = Page::create(dir.path().join("cache.page.000001"), 1, 4096).unwrap();

        let buf = page.alloc(128).unwrap();
        assert_eq!(page.header(buf).unwrap().seqno(), SEQNO_NONE);
        assert_eq!(page.header(buf).unwrap().storage_class(), StorageClass::InPage);

        page.header_mut(buf).unwrap().set_seqno(1042);

        assert_eq!(page.header(buf).unwrap().seqno(), 1042);
    }
}

mod resize_tests {
    use super::*;

    #[test]
    fn tail_buffer_grows_and_shrinks_in_place() {
        let dir = tempdir().unwrap();
        let mut page = Page::create(dir.path().join("cache.page.000001"), 1, 4096).unwrap();

        let buf = page.alloc(100).unwrap();
        page.payload_mut(buf).unwrap()[..3].copy_from_slice(b"abc");
        let before = page.free_bytes();

        assert_eq!(page.realloc(buf, 300).unwrap(), Some(buf));
        assert_eq!(page.free_bytes(), before - 200);

        assert_eq!(page.realloc(buf, 50).unwrap(), Some(buf));
        assert_eq!(page.free_bytes(), before + 50);

        assert_eq!(&page.payload(buf).unwrap()[..3], b"abc");
        assert_eq!(page.live_count(), 1);
    }

    #[test]
    fn non_tail_growth_preserves_old_payload_prefix() {
        let dir = tempdir().unwrap();
        let mut page = Page::create(dir.path().join("cache.page.000001"), 1, 4096).unwrap();

        let old = page.alloc(64).unwrap();
        let pattern: Vec<u8> = (0..64).map(|i| i as u8).collect();
        page.payload_mut(old).unwrap().copy_from_slice(&pattern);
        page.alloc(16).unwrap();

        let live_before = page.live_count();
        let new = page.realloc(old, 128).unwrap().unwrap();

        assert_ne!(new, old);
        assert_eq!(&page.payload(new).unwrap()[..64], &pattern[..]);
        // Old slot released, new slot allocated: net zero bookkeeping.
        assert_eq!(page.live_count(), live_before);
    }

    #[test]
    fn non_tail_shrink_returns_same_offset_untouched() {
        let dir = tempdir().unwrap();
        let mut page = Page::create(dir.path().join("cache.page.000001"), 1, 4096).unwrap();

        let old = page.alloc(64).unwrap();
        page.alloc(16).unwrap();
        let state = (page.free_bytes(), page.live_count());

        assert_eq!(page.realloc(old, 10).unwrap(), Some(old));
        assert_eq!(page.realloc(old, 64).unwrap(), Some(old));

        assert_eq!((page.free_bytes(), page.live_count()), state);
    }

    #[test]
    fn failed_growth_leaves_page_usable() {
        let dir = tempdir().unwrap();
        let mut page = Page::create(dir.path().join("cache.page.000001"), 1, 1024).unwrap();

        let buf = page.alloc(100).unwrap();

        assert!(page.realloc(buf, 100_000).unwrap().is_none());

        // The caller falls back to another page; this one still works.
        assert!(page.alloc(100).is_some());
        assert_eq!(page.live_count(), 2);
    }
}

mod reset_tests {
    use super::*;

    #[test]
    fn reset_recycles_page_for_reuse() {
        let dir = tempdir().unwrap();
        let mut page = Page::create(dir.path().join("cache.page.000001"), 1, 2048).unwrap();
        let full = page.free_bytes();

        for _ in 0..3 {
            let a = page.alloc(256).unwrap();
            let b = page.alloc(512).unwrap();
            page.release(a).unwrap();
            page.release(b).unwrap();
            page.reset();

            assert_eq!(page.free_bytes(), full);
            assert_eq!(page.live_count(), 0);
        }
    }

    #[test]
    #[should_panic(expected = "used by 1 buffers")]
    fn reset_with_live_buffer_is_a_defect() {
        let dir = tempdir().unwrap();
        let mut page = Page::create(dir.path().join("cache.page.000001"), 1, 2048).unwrap();

        page.alloc(64).unwrap();

        page.reset();
    }

    #[test]
    fn drop_fs_cache_is_safe_at_any_point() {
        let dir = tempdir().unwrap();
        let mut page = Page::create(dir.path().join("cache.page.000001"), 1, 2048).unwrap();

        page.drop_fs_cache();

        let buf = page.alloc(64).unwrap();
        page.payload_mut(buf).unwrap().fill(0x7E);
        page.drop_fs_cache();

        assert!(page.payload(buf).unwrap().iter().all(|&x| x == 0x7E));
    }
}

mod file_hygiene_tests {
    use super::*;

    #[test]
    fn backing_file_lives_and_dies_with_the_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.page.000001");

        let page = Page::create(&path, 1, 1024).unwrap();
        assert!(path.exists());

        drop(page);
        assert!(!path.exists());
    }
}
