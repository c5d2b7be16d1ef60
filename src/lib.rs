//! # evcache - Memory-Mapped Replication Event Cache Pages
//!
//! evcache provides the backing allocator for a replication-event cache:
//! fixed-capacity, file-backed pages that hand out tagged buffers through a
//! bump allocator. This implementation prioritizes:
//!
//! - **Zero-copy data access**: Payloads live directly in the mmap region
//! - **Zero allocation per buffer**: One header write, one cursor bump
//! - **Fail-fast recycling**: Resetting a page with live buffers is a defect,
//!   not a recoverable error
//!
//! ## Quick Start
//!
//! ```ignore
//! use evcache::Page;
//!
//! let mut page = Page::create("/tmp/cache.page.000001", 1, 1 << 20)?;
//!
//! let buf = page.alloc(4096).expect("page has room");
//! page.payload_mut(buf)?.copy_from_slice(&event_bytes);
//! page.header_mut(buf)?.set_seqno(seqno);
//!
//! page.release(buf)?;
//! if page.live_count() == 0 {
//!     page.reset();
//! }
//! ```
//!
//! ## Architecture
//!
//! A surrounding cache manager owns a collection of pages and routes
//! allocation requests across them; this crate implements a single page:
//!
//! ```text
//! +--------------------------------------------------+
//! |        Cache Manager (out of scope)              |
//! |  page rotation, seqno assignment, routing        |
//! +--------------------------------------------------+
//! |        Page (bump allocator)                     |
//! |  alloc / realloc / release / reset / fadvise     |
//! +--------------------------------------------------+
//! |        BufferHeader (32-byte tagged prefix)      |
//! +--------------------------------------------------+
//! |        MappedRegion (temporary file + mmap)      |
//! +--------------------------------------------------+
//! ```
//!
//! ## Region Layout
//!
//! A page's region is a packed run of `[header | payload]` records followed
//! by a cleared sentinel header marking the end of allocations:
//!
//! ```text
//! +--------+---------+--------+---------+----------+------------+
//! | header | payload | header | payload | sentinel | free space |
//! +--------+---------+--------+---------+----------+------------+
//!                                       ^ cursor
//! ```
//!
//! ## Threading Contract
//!
//! Pages perform no internal locking. A page assumes single-writer access
//! serialized by its owning cache manager; concurrent readers of
//! already-returned payloads are fine because payload bytes never move once
//! written.
//!
//! ## Module Overview
//!
//! - [`storage`]: Mapped region, buffer header layout, and the page allocator

pub mod storage;

pub use storage::{
    BufferHeader, MappedRegion, Page, PageId, StorageClass, BUFFER_HEADER_SIZE, SEQNO_NONE,
};
