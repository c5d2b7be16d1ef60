//! # Memory-Mapped Page Files
//!
//! This module implements `MappedRegion`, the file/mapping primitive behind
//! a cache page: a freshly created, fixed-size temporary file mapped
//! writable into the process address space.
//!
//! ## Internal Component
//!
//! `MappedRegion` is owned exclusively by one [`Page`](super::Page) for the
//! page's whole lifetime. The region never grows, shrinks, or remaps; all
//! reuse happens by resetting the page's bump-allocation state on top of the
//! same mapping.
//!
//! ## Temporary Storage
//!
//! Page files hold transient replication events, not durable data. `create`
//! truncates any stale file left behind by a prior run, and the file is
//! removed again when the region is dropped. Nothing is ever `msync`ed; if
//! the OS writes dirty pages back, the bytes are simply never read again.
//!
//! ## Cache Eviction
//!
//! `dont_need` advises the kernel to drop the region's resident pages from
//! the working set (`madvise(MADV_DONTNEED)` on a shared file mapping marks
//! them refetchable from the backing file). The call is best-effort: failure
//! costs memory footprint, never correctness.
//!
//! ## Error Handling
//!
//! All fallible operations return `eyre::Result` with the file path and the
//! operation being performed; advisory operations log at `warn` and return.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};
use memmap2::MmapMut;

#[derive(Debug)]
pub struct MappedRegion {
    path: PathBuf,
    file: File,
    mmap: MmapMut,
}

impl MappedRegion {
    /// Create a fresh page file of exactly `len` bytes and map it writable.
    ///
    /// Any stale file at `path` from a prior run is truncated away; page
    /// files are strictly temporary storage.
    pub fn create<P: AsRef<Path>>(path: P, len: usize) -> Result<Self> {
        let path = path.as_ref();

        ensure!(len > 0, "mapped region length must be at least 1 byte");

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .wrap_err_with(|| format!("failed to create page file '{}'", path.display()))?;

        file.set_len(len as u64)
            .wrap_err_with(|| format!("failed to size page file '{}' to {} bytes", path.display(), len))?;

        // SAFETY: MmapMut::map_mut is unsafe because memory-mapped files can be
        // modified externally, leading to undefined behavior. This is safe because:
        // 1. We just created/truncated this file and hold it for exclusive use
        // 2. Page files are process-private temporary storage, not shared data
        // 3. The mmap lifetime is tied to MappedRegion, preventing use-after-unmap
        // 4. All access goes through bytes()/bytes_mut(), bounded by the mapping
        let mmap = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        Ok(Self {
            path: path.to_path_buf(),
            file,
            mmap,
        })
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.mmap
    }

    /// Handle to the backing file, for fadvise-style calls on the whole file.
    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn file_size(&self) -> u64 {
        self.mmap.len() as u64
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Advise the kernel to release the region's resident pages.
    ///
    /// Best-effort: failures are logged and otherwise ignored.
    pub fn dont_need(&self) {
        #[cfg(unix)]
        {
            // SAFETY: madvise with MADV_DONTNEED is advisory and cannot cause
            // undefined behavior on a valid range. This range is valid because:
            // 1. The pointer and length come straight from the live mapping
            // 2. The mapping cannot be remapped or resized during self's lifetime
            // 3. MAP_SHARED file pages are refetched from the file on next access
            let ret = unsafe {
                libc::madvise(
                    self.mmap.as_ptr() as *mut libc::c_void,
                    self.mmap.len(),
                    libc::MADV_DONTNEED,
                )
            };
            if ret != 0 {
                tracing::warn!(
                    "madvise(MADV_DONTNEED) failed on '{}': {}",
                    self.path.display(),
                    std::io::Error::last_os_error()
                );
            }
        }
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!("failed to remove page file '{}': {}", self.path.display(), e);
        }
    }
}
