//! # Buffer Header Layout
//!
//! Every buffer allocated from a page is prefixed by a fixed 32-byte header
//! describing its extent and ownership. Headers are packed back to back with
//! their payloads, so the cache can walk a page front to back by following
//! `total_size`, stopping at a cleared (all-zero) sentinel header.
//!
//! ## Header Layout (32 bytes)
//!
//! ```text
//! Offset  Size  Field       Description
//! ------  ----  ----------  -----------------------------------------
//! 0       8     total_size  Header + payload bytes for this allocation
//! 8       8     seqno       Cache-assigned ordering value, or SEQNO_NONE
//! 16      8     page_id     Identity of the page that allocated the buffer
//! 24      4     flags       Cache-level metadata, opaque to this crate
//! 28      1     store       Storage class tag (StorageClass)
//! 29      3     reserved    Zero
//! ```
//!
//! ## Ownership
//!
//! `page_id` is an identity reference only: an index into the cache
//! manager's externally-owned table of pages. The header never participates
//! in the page's lifetime.
//!
//! `seqno` and `flags` belong to the surrounding cache. The allocator writes
//! `SEQNO_NONE` and zero flags at allocation time and never touches either
//! field again; the cache mutates them through `Page::header_mut`.
//!
//! ## Zerocopy Safety
//!
//! The header derives the zerocopy traits (`FromBytes`, `IntoBytes`,
//! `Immutable`, `KnownLayout`, `Unaligned`) so it can be read and written
//! in place at arbitrary offsets of the mmap region. All multi-byte fields
//! use little-endian encoding; the layout must stay byte-stable within a
//! single process's cache lifetime.

use eyre::{ensure, Result};
use zerocopy::little_endian::{I64, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::BUFFER_HEADER_SIZE;

/// Identity of a page, assigned by the owning cache manager.
///
/// An index into an externally-owned page table, not an ownership edge.
pub type PageId = u64;

/// Sentinel seqno for buffers the cache has not ordered yet.
pub const SEQNO_NONE: i64 = -1;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    /// Cleared header / not an allocated buffer.
    Unknown = 0x00,
    /// Buffer lives inside a page's mapped region.
    InPage = 0x01,
    /// Buffer lives in a heap-allocated overflow slot (cache-defined).
    InHeap = 0x02,
}

impl StorageClass {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0x01 => StorageClass::InPage,
            0x02 => StorageClass::InHeap,
            _ => StorageClass::Unknown,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct BufferHeader {
    total_size: U64,
    seqno: I64,
    page_id: U64,
    flags: U32,
    store: u8,
    reserved: [u8; 3],
}

const _: () = assert!(std::mem::size_of::<BufferHeader>() == BUFFER_HEADER_SIZE);

impl BufferHeader {
    /// Header for a freshly allocated in-page buffer of `total_size` bytes
    /// (header included), not yet ordered by the cache.
    pub fn new(total_size: u64, page_id: PageId) -> Self {
        Self {
            total_size: U64::new(total_size),
            seqno: I64::new(SEQNO_NONE),
            page_id: U64::new(page_id),
            flags: U32::new(0),
            store: StorageClass::InPage as u8,
            reserved: [0u8; 3],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        ensure!(
            bytes.len() >= BUFFER_HEADER_SIZE,
            "buffer too small for BufferHeader: {} < {}",
            bytes.len(),
            BUFFER_HEADER_SIZE
        );

        Self::ref_from_bytes(&bytes[..BUFFER_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read BufferHeader: {:?}", e))
    }

    pub fn from_bytes_mut(bytes: &mut [u8]) -> Result<&mut Self> {
        ensure!(
            bytes.len() >= BUFFER_HEADER_SIZE,
            "buffer too small for BufferHeader: {} < {}",
            bytes.len(),
            BUFFER_HEADER_SIZE
        );

        Self::mut_from_bytes(&mut bytes[..BUFFER_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read BufferHeader: {:?}", e))
    }

    /// True for the cleared sentinel that terminates a page's allocations.
    pub fn is_cleared(&self) -> bool {
        self.total_size.get() == 0
    }

    pub fn total_size(&self) -> u64 {
        self.total_size.get()
    }

    pub(crate) fn set_total_size(&mut self, total_size: u64) {
        self.total_size = U64::new(total_size);
    }

    pub fn payload_size(&self) -> u64 {
        self.total_size.get().saturating_sub(BUFFER_HEADER_SIZE as u64)
    }

    pub fn seqno(&self) -> i64 {
        self.seqno.get()
    }

    pub fn set_seqno(&mut self, seqno: i64) {
        self.seqno = I64::new(seqno);
    }

    pub fn page_id(&self) -> PageId {
        self.page_id.get()
    }

    pub fn flags(&self) -> u32 {
        self.flags.get()
    }

    pub fn set_flags(&mut self, flags: u32) {
        self.flags = U32::new(flags);
    }

    pub fn storage_class(&self) -> StorageClass {
        StorageClass::from_byte(self.store)
    }
}
