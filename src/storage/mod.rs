//! # Storage Module
//!
//! This module provides the storage layer for evcache: a fixed-capacity,
//! memory-mapped page that serves buffers to a replication-event cache
//! through a bump allocator.
//!
//! ## Architecture Overview
//!
//! The storage layer is built around memory-mapped I/O. Instead of copying
//! event payloads between kernel and user space, each page maps a
//! pre-sized temporary file directly into the process address space:
//!
//! - **Zero-copy access**: Payload accessors return `&[u8]` slices pointing
//!   directly into the mmap region
//! - **One-write allocation**: Allocating a buffer writes a 32-byte header
//!   and bumps a cursor, nothing else
//! - **OS-managed residency**: Cold pages can be dropped from the working
//!   set with `madvise`/`posix_fadvise` without affecting correctness
//!
//! ## Allocation Model
//!
//! A page is a bump allocator. Buffers are packed back to back, each
//! prefixed by a [`BufferHeader`] recording its extent, sequence number,
//! owning page, and storage class. Space is never reclaimed buffer by
//! buffer; once every buffer has been released, the whole page is reset and
//! its full capacity becomes available again.
//!
//! Only the most recently allocated buffer may change size in place. Any
//! earlier buffer is locked where it sits, because later allocations hold
//! positions behind it that the cache may still reference.
//!
//! ## Safety Model
//!
//! The public API works in payload byte offsets, not pointers. Offset to
//! header conversion happens in one bounds-checked choke point inside
//! [`Page`], so a stale or corrupt offset surfaces as an error instead of
//! undefined behavior.
//!
//! ## Module Organization
//!
//! - `mmap`: Temporary file creation and mapping (`MappedRegion`)
//! - `header`: Buffer header layout and storage-class tags
//! - `page`: The bump allocator itself (`Page`)
//!
//! ## Thread Safety
//!
//! `Page` is `Send` but performs no internal locking. Single-writer access
//! serialized by the owning cache manager is a precondition of every
//! mutating operation.

mod header;
mod mmap;
mod page;

pub use header::{BufferHeader, PageId, StorageClass, SEQNO_NONE};
pub use mmap::MappedRegion;
pub use page::Page;

pub const BUFFER_HEADER_SIZE: usize = 32;
