//! # Cache Page Allocator
//!
//! This module implements `Page`, a bump allocator over one memory-mapped
//! region. A page hands out buffers at strictly increasing offsets, each
//! prefixed by a [`BufferHeader`]; space comes back only when every buffer
//! has been released and the whole page is reset.
//!
//! ## Allocation Cursor
//!
//! ```text
//! +--------+---------+--------+---------+----------+------------+
//! | header | payload | header | payload | sentinel | free space |
//! +--------+---------+--------+---------+----------+------------+
//! 0                                     ^ cursor                ^ len
//! ```
//!
//! `cursor + free_bytes == region length` holds at every observable point.
//! A cleared sentinel header sits at `cursor` whenever one fits, so a linear
//! scan of the page terminates without running off the end; when fewer than
//! `BUFFER_HEADER_SIZE` free bytes remain, no sentinel is written and the
//! page is exhausted for every request anyway.
//!
//! ## Resizing Rules
//!
//! Only the tail buffer (the one ending exactly at `cursor`) may change
//! size in place; its payload bytes never move, only the recorded extent
//! and the cursor. Earlier buffers are locked where they sit: growing one
//! allocates a fresh buffer and copies the payload, shrinking one is a
//! no-op. The bytes of a superseded buffer stay inside the page,
//! unreclaimed, until the page resets; there is no compaction.
//!
//! ## Offsets, Not Pointers
//!
//! Callers address buffers by payload byte offset. The single
//! `header_offset_of` choke point converts a payload offset back to its
//! header with full bounds checking, so stale offsets surface as errors.
//!
//! ## Failure Severities
//!
//! - Page exhaustion on `alloc`/growing `realloc` returns `None`, the
//!   normal signal to fall back to another page.
//! - An offset that is not a live allocation returns an `eyre` error.
//! - Resetting a page with live buffers panics: continuing would hand out
//!   space the cache still references, so silent corruption is traded for
//!   a crash.

use std::path::Path;

use eyre::{ensure, Result};
use zerocopy::IntoBytes;

use super::header::{BufferHeader, PageId};
use super::mmap::MappedRegion;
use super::BUFFER_HEADER_SIZE;

#[derive(Debug)]
pub struct Page {
    name: String,
    id: PageId,
    region: MappedRegion,
    /// Offset where free space begins; every header lies in `[0, cursor)`.
    cursor: usize,
    /// Bytes remaining between `cursor` and the end of the region.
    space: usize,
    /// Buffers allocated and not yet released.
    used: usize,
}

impl Page {
    /// Create a page able to hold `capacity` payload bytes.
    ///
    /// The backing region is sized `capacity` plus one header, so the
    /// bootstrap sentinel always fits. The file at `path` is created fresh;
    /// page files are strictly temporary storage.
    pub fn create<P: AsRef<Path>>(path: P, id: PageId, capacity: usize) -> Result<Self> {
        let path = path.as_ref();

        let region_len = capacity.checked_add(BUFFER_HEADER_SIZE).ok_or_else(|| {
            eyre::eyre!("page capacity {} overflows with header overhead", capacity)
        })?;

        let region = MappedRegion::create(path, region_len)?;

        let mut page = Self {
            name: path.display().to_string(),
            id,
            region,
            cursor: 0,
            space: region_len,
            used: 0,
        };
        page.write_sentinel();

        tracing::info!("created temporary page '{}' of {} bytes", page.name, region_len);

        Ok(page)
    }

    /// Allocate a buffer for `size` payload bytes.
    ///
    /// Returns the payload offset, or `None` when the page cannot fit the
    /// buffer. Exhaustion is an expected outcome and mutates no state.
    pub fn alloc(&mut self, size: usize) -> Option<usize> {
        let buf_size = size.checked_add(BUFFER_HEADER_SIZE)?;

        if buf_size > self.space {
            tracing::debug!(
                "failed to allocate {} bytes in page '{}', space left: {}, total allocated: {}",
                buf_size,
                self.name,
                self.space,
                self.cursor
            );
            return None;
        }

        let header_off = self.cursor;
        let header = BufferHeader::new(buf_size as u64, self.id);
        self.region.bytes_mut()[header_off..header_off + BUFFER_HEADER_SIZE]
            .copy_from_slice(header.as_bytes());

        self.cursor += buf_size;
        self.space -= buf_size;
        self.used += 1;
        self.write_sentinel();

        debug_assert!(self.cursor <= self.region.len());
        debug_assert_eq!(self.cursor + self.space, self.region.len());

        Some(header_off + BUFFER_HEADER_SIZE)
    }

    /// Resize the buffer at `payload_off` to `new_size` payload bytes.
    ///
    /// The tail buffer grows and shrinks in place, keeping its offset.
    /// A non-tail buffer is locked: growing it allocates a fresh buffer and
    /// copies the old payload (the old slot is released, its bytes
    /// unreclaimed until reset), shrinking it returns the offset unchanged.
    ///
    /// `Ok(None)` means the growth did not fit in this page; no state
    /// changed and the old buffer is still valid. `Err` means `payload_off`
    /// is not a live allocation of this page.
    pub fn realloc(&mut self, payload_off: usize, new_size: usize) -> Result<Option<usize>> {
        let header_off = self.header_offset_of(payload_off)?;
        let total = BufferHeader::from_bytes(&self.region.bytes()[header_off..])?.total_size()
            as usize;
        let old_size = total - BUFFER_HEADER_SIZE;

        if header_off + total == self.cursor {
            // Tail buffer: extent may change in place, payload bytes stay put.
            if new_size >= old_size {
                let delta = new_size - old_size;
                if delta >= self.space {
                    tracing::debug!(
                        "failed to grow tail buffer by {} bytes in page '{}', space left: {}",
                        delta,
                        self.name,
                        self.space
                    );
                    return Ok(None);
                }
                self.set_total_size(header_off, (total + delta) as u64)?;
                self.cursor += delta;
                self.space -= delta;
            } else {
                let delta = old_size - new_size;
                self.set_total_size(header_off, (total - delta) as u64)?;
                self.cursor -= delta;
                self.space += delta;
            }
            self.write_sentinel();

            debug_assert_eq!(self.cursor + self.space, self.region.len());

            Ok(Some(payload_off))
        } else if new_size > old_size {
            match self.alloc(new_size) {
                Some(new_off) => {
                    self.region
                        .bytes_mut()
                        .copy_within(payload_off..payload_off + old_size, new_off);
                    // The old slot is logically released; its bytes stay in
                    // the page until reset.
                    self.used -= 1;
                    Ok(Some(new_off))
                }
                None => Ok(None),
            }
        } else {
            // Locked in place by later allocations; the extra bytes remain
            // allocated but unused until release.
            Ok(Some(payload_off))
        }
    }

    /// Record that the cache no longer references the buffer at
    /// `payload_off`. Its bytes are reclaimed only by `reset`.
    pub fn release(&mut self, payload_off: usize) -> Result<()> {
        self.header_offset_of(payload_off)?;

        ensure!(
            self.used > 0,
            "release on page '{}' with no live buffers",
            self.name
        );

        self.used -= 1;
        Ok(())
    }

    /// Recycle the page's whole capacity for new allocations.
    ///
    /// # Panics
    ///
    /// Panics if any buffer is still live. A live buffer here means the
    /// cache holds an offset into space this call would hand out again, so
    /// continuing would corrupt memory the cache still trusts.
    pub fn reset(&mut self) {
        if self.used > 0 {
            tracing::error!(
                "attempt to reset page '{}' used by {} buffers",
                self.name,
                self.used
            );
            panic!(
                "attempt to reset page '{}' used by {} buffers",
                self.name, self.used
            );
        }

        self.space = self.region.len();
        self.cursor = 0;
        self.write_sentinel();
    }

    /// Advise the OS to drop the page's resident memory and file cache.
    ///
    /// Best-effort: failures are logged and never escalated. Intended for
    /// pages known to hold cold data.
    pub fn drop_fs_cache(&self) {
        self.region.dont_need();

        #[cfg(target_os = "linux")]
        {
            use std::os::unix::io::AsRawFd;

            // SAFETY: posix_fadvise is advisory and cannot cause undefined
            // behavior. The fd is open for self's lifetime and the range
            // covers exactly the backing file. Errors come back as the
            // return value, not via errno.
            let err = unsafe {
                libc::posix_fadvise(
                    self.region.file().as_raw_fd(),
                    0,
                    self.region.file_size() as libc::off_t,
                    libc::POSIX_FADV_DONTNEED,
                )
            };
            if err != 0 {
                tracing::warn!(
                    "failed to set POSIX_FADV_DONTNEED on '{}': {}",
                    self.name,
                    std::io::Error::from_raw_os_error(err)
                );
            }
        }
    }

    /// Buffer header at `payload_off`, for reading seqno/flags/extent.
    pub fn header(&self, payload_off: usize) -> Result<&BufferHeader> {
        let header_off = self.header_offset_of(payload_off)?;
        BufferHeader::from_bytes(&self.region.bytes()[header_off..])
    }

    /// Mutable buffer header at `payload_off`. The owning cache assigns
    /// `seqno` and `flags` through this; the allocator never reads them.
    pub fn header_mut(&mut self, payload_off: usize) -> Result<&mut BufferHeader> {
        let header_off = self.header_offset_of(payload_off)?;
        BufferHeader::from_bytes_mut(&mut self.region.bytes_mut()[header_off..])
    }

    /// Payload bytes of the buffer at `payload_off`.
    pub fn payload(&self, payload_off: usize) -> Result<&[u8]> {
        let header_off = self.header_offset_of(payload_off)?;
        let len =
            BufferHeader::from_bytes(&self.region.bytes()[header_off..])?.payload_size() as usize;
        Ok(&self.region.bytes()[payload_off..payload_off + len])
    }

    /// Mutable payload bytes of the buffer at `payload_off`.
    pub fn payload_mut(&mut self, payload_off: usize) -> Result<&mut [u8]> {
        let header_off = self.header_offset_of(payload_off)?;
        let len =
            BufferHeader::from_bytes(&self.region.bytes()[header_off..])?.payload_size() as usize;
        Ok(&mut self.region.bytes_mut()[payload_off..payload_off + len])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    /// Total region size in bytes (capacity plus one header).
    pub fn size(&self) -> usize {
        self.region.len()
    }

    /// Bytes remaining for allocation.
    pub fn free_bytes(&self) -> usize {
        self.space
    }

    /// Buffers allocated and not yet released.
    pub fn live_count(&self) -> usize {
        self.used
    }

    /// True when every buffer has been released and the page may be reset.
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Convert a payload offset back to its header offset.
    ///
    /// The single choke point for offset arithmetic: guarantees the header
    /// lies inside `[0, cursor)` and records an extent that ends at or
    /// before `cursor`, so every caller downstream can slice without
    /// further checks.
    fn header_offset_of(&self, payload_off: usize) -> Result<usize> {
        ensure!(
            payload_off >= BUFFER_HEADER_SIZE && payload_off <= self.cursor,
            "payload offset {} is outside the allocated range of page '{}' (cursor {})",
            payload_off,
            self.name,
            self.cursor
        );

        let header_off = payload_off - BUFFER_HEADER_SIZE;
        let total = BufferHeader::from_bytes(&self.region.bytes()[header_off..])?.total_size()
            as usize;

        ensure!(
            total >= BUFFER_HEADER_SIZE && header_off + total <= self.cursor,
            "buffer at offset {} in page '{}' has invalid extent {}",
            header_off,
            self.name,
            total
        );

        Ok(header_off)
    }

    fn set_total_size(&mut self, header_off: usize, total_size: u64) -> Result<()> {
        let header = BufferHeader::from_bytes_mut(&mut self.region.bytes_mut()[header_off..])?;
        header.set_total_size(total_size);
        Ok(())
    }

    /// Clear a header-sized run at the cursor when one fits, terminating
    /// linear scans. When none fits the page is exhausted for every
    /// request, which scanners treat the same as a cleared header.
    fn write_sentinel(&mut self) {
        if self.space >= BUFFER_HEADER_SIZE {
            let at = self.cursor;
            self.region.bytes_mut()[at..at + BUFFER_HEADER_SIZE].fill(0);
        }
    }
}
