//! # Memory-Mapped Page Storage
//!
//! This module implements `MappedFileStorage`, the page manager underneath the
//! records storage. It owns the backing file and hands out fixed-size pages of
//! it, each an independent read/write mapping created on first access.
//!
//! ## Why Per-Page Mappings?
//!
//! A single mapping of the whole file must be remapped whenever the file
//! grows, which invalidates every outstanding reference into it. Readers and
//! writers here touch the mapped memory concurrently and without locks, so a
//! remap would need hazard pointers or epochs to be safe.
//!
//! Instead the file is cut into power-of-two pages and every page is mapped
//! separately, exactly once. A page is never unmapped or remapped while the
//! storage is alive, so `&Page` borrows stay valid for the storage lifetime and
//! growing the file only ever adds pages.
//!
//! ## Page Table
//!
//! ```text
//! directory: [chunk 0] [chunk 1] ... [chunk n]      (OnceLock each)
//!                │
//!                └─> [slot 0] [slot 1] ... [slot 1023]   (OnceLock<Page> each)
//! ```
//!
//! The table is sized for the whole addressable record space up front, but
//! chunks are only allocated when one of their pages is first created. Lookups
//! are two `OnceLock::get` calls, no locking.
//!
//! ## Page Creation
//!
//! Creation is the only critical section. It runs under the mutex that owns
//! the file handle, with a re-check of the slot after acquiring it
//! (double-checked locking). If the file is shorter than the page, it is
//! extended by writing zero-filled chunks: relying on sparse files is not
//! portable, and a mapping past EOF faults on access.
//!
//! ## Closing
//!
//! `close()` drops the file handle. Existing mappings stay valid until the
//! storage itself is dropped; creating new pages fails with `Closed`.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::OnceLock;

use eyre::{bail, ensure, Result, WrapErr};
use memmap2::{MmapMut, MmapOptions};
use parking_lot::Mutex;
use tracing::debug;

use crate::config::{FILLER_CHUNK_SIZE, MAX_PAGE_SIZE, MAX_STORAGE_SIZE, MIN_PAGE_SIZE};
use crate::error::StorageError;

const PAGE_TABLE_CHUNK: usize = 1024;

type PageChunk = Box<[OnceLock<Page>]>;

/// A mapped page of the backing file.
#[derive(Debug)]
pub struct Page {
    index: usize,
    offset_in_file: u64,
    base: NonNull<u8>,
    len: usize,
    _mmap: MmapMut,
}

// SAFETY: `base` points into `_mmap`, which lives exactly as long as the page
// and is never remapped. All access through `base` goes through atomics
// (`u32_at`/`u64_at`), so sharing the page between threads cannot produce
// data races.
unsafe impl Send for Page {}
unsafe impl Sync for Page {}

impl Page {
    fn map(file: &File, path: &Path, index: usize, page_size: usize) -> Result<Self> {
        let offset_in_file = index as u64 * page_size as u64;

        // SAFETY: MmapOptions::map_mut is unsafe because the file can be
        // modified externally. This is safe because:
        // 1. The storage file is owned by this process for its lifetime
        // 2. The file was extended to cover [offset, offset + page_size) before mapping
        // 3. The mapping is owned by the Page and outlives every borrow of it
        // 4. All reads and writes go through aligned atomics (u32_at/u64_at)
        let mut mmap = unsafe {
            MmapOptions::new()
                .offset(offset_in_file)
                .len(page_size)
                .map_mut(file)
                .wrap_err_with(|| {
                    format!(
                        "failed to map page {} of '{}' at offset {}",
                        index,
                        path.display(),
                        offset_in_file
                    )
                })?
        };

        let base = NonNull::new(mmap.as_mut_ptr())
            .ok_or_else(|| eyre::eyre!("mapping of page {} returned a null pointer", index))?;

        Ok(Self {
            index,
            offset_in_file,
            base,
            len: page_size,
            _mmap: mmap,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn offset_in_file(&self) -> u64 {
        self.offset_in_file
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 32-bit atomic view of the page at `offset`.
    ///
    /// # Panics
    ///
    /// If `offset` is not 4-byte aligned or the word does not fit in the page.
    #[inline]
    pub(crate) fn u32_at(&self, offset: usize) -> &AtomicU32 {
        assert!(
            offset % 4 == 0 && offset + 4 <= self.len,
            "unaligned or out-of-page u32 access at {} (page len {})",
            offset,
            self.len
        );
        // SAFETY: the word lies inside the mapping (checked above), the mapping
        // base is page-aligned so the word is 4-byte aligned, and the memory is
        // only ever accessed atomically for the lifetime of `&self`.
        unsafe { AtomicU32::from_ptr(self.base.as_ptr().add(offset).cast::<u32>()) }
    }

    /// 64-bit atomic view of the page at `offset`.
    ///
    /// # Panics
    ///
    /// If `offset` is not 8-byte aligned or the word does not fit in the page.
    #[inline]
    pub(crate) fn u64_at(&self, offset: usize) -> &AtomicU64 {
        assert!(
            offset % 8 == 0 && offset + 8 <= self.len,
            "unaligned or out-of-page u64 access at {} (page len {})",
            offset,
            self.len
        );
        // SAFETY: same as u32_at, with 8-byte alignment.
        unsafe { AtomicU64::from_ptr(self.base.as_ptr().add(offset).cast::<u64>()) }
    }

    /// Hints the kernel that the page is about to be read front to back.
    pub fn advise_sequential(&self) {
        #[cfg(unix)]
        // SAFETY: madvise is only a hint and never invalidates the mapping.
        // The range [base, base + len) is exactly this page's mapping, which
        // is alive for the duration of the call.
        unsafe {
            libc::madvise(
                self.base.as_ptr() as *mut libc::c_void,
                self.len,
                libc::MADV_SEQUENTIAL,
            );
        }
    }
}

#[derive(Debug)]
pub struct MappedFileStorage {
    path: PathBuf,
    page_size: usize,
    page_bits: u32,
    max_pages: usize,
    /// Guards page creation and owns the file handle; `None` once closed.
    file: Mutex<Option<File>>,
    directory: Box<[OnceLock<PageChunk>]>,
    file_length: AtomicU64,
}

impl MappedFileStorage {
    /// Opens the file at `path`, creating it if absent. No page is mapped yet.
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let path = path.as_ref();

        ensure!(
            page_size.is_power_of_two() && (MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size),
            StorageError::InvalidPageSize(page_size)
        );

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .wrap_err_with(|| format!("failed to open storage file '{}'", path.display()))?;

        let file_length = file
            .metadata()
            .wrap_err_with(|| format!("failed to get metadata for '{}'", path.display()))?
            .len();

        let max_pages = MAX_STORAGE_SIZE.div_ceil(page_size as u64) as usize;
        let pages_in_file = file_length.div_ceil(page_size as u64);
        if pages_in_file > max_pages as u64 {
            bail!(StorageError::Corrupted {
                path: path.to_path_buf(),
                reason: format!(
                    "size {} exceeds the addressable maximum {}",
                    file_length, MAX_STORAGE_SIZE
                ),
            });
        }

        let directory = (0..max_pages.div_ceil(PAGE_TABLE_CHUNK))
            .map(|_| OnceLock::new())
            .collect();

        debug!(
            path = %path.display(),
            page_size,
            file_length,
            "opened mapped file storage"
        );

        Ok(Self {
            path: path.to_path_buf(),
            page_size,
            page_bits: page_size.trailing_zeros(),
            max_pages,
            file: Mutex::new(Some(file)),
            directory,
            file_length: AtomicU64::new(file_length),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Current length of the backing file, as last observed or grown.
    pub fn file_length(&self) -> u64 {
        self.file_length.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.file.lock().is_none()
    }

    #[inline]
    pub fn offset_in_page(&self, offset_in_file: u64) -> usize {
        (offset_in_file & (self.page_size as u64 - 1)) as usize
    }

    /// Returns the page containing `offset_in_file`, mapping it on first use.
    pub fn page_for(&self, offset_in_file: u64) -> Result<&Page> {
        let index = (offset_in_file >> self.page_bits) as usize;
        match self.cached_page(index) {
            Some(page) => Ok(page),
            None => self.create_page(index),
        }
    }

    /// Pages mapped so far, in index order.
    pub fn mapped_pages(&self) -> impl Iterator<Item = &Page> + '_ {
        self.directory
            .iter()
            .filter_map(|chunk| chunk.get())
            .flat_map(|chunk| chunk.iter().filter_map(|slot| slot.get()))
    }

    /// Releases the file handle. Returns `false` if it was already released.
    pub fn close(&self) -> bool {
        self.file.lock().take().is_some()
    }

    #[inline]
    fn cached_page(&self, index: usize) -> Option<&Page> {
        self.directory
            .get(index / PAGE_TABLE_CHUNK)?
            .get()?
            .get(index % PAGE_TABLE_CHUNK)?
            .get()
    }

    #[cold]
    fn create_page(&self, index: usize) -> Result<&Page> {
        ensure!(
            index < self.max_pages,
            StorageError::CapacityExceeded {
                requested: (index as u64 + 1) * self.page_size as u64,
                max: MAX_STORAGE_SIZE,
            }
        );

        let guard = self.file.lock();

        if let Some(page) = self.cached_page(index) {
            return Ok(page);
        }

        let Some(file) = guard.as_ref() else {
            bail!(StorageError::Closed);
        };

        let page_end = (index as u64 + 1) * self.page_size as u64;
        self.ensure_file_length(file, page_end)?;

        let page = Page::map(file, &self.path, index, self.page_size)?;

        let chunk = self.directory[index / PAGE_TABLE_CHUNK]
            .get_or_init(|| (0..PAGE_TABLE_CHUNK).map(|_| OnceLock::new()).collect());

        debug!(page = index, offset = page.offset_in_file(), "mapped storage page");

        Ok(chunk[index % PAGE_TABLE_CHUNK].get_or_init(|| page))
    }

    /// Extends the file with zeroes up to `required`. Must hold the file lock.
    fn ensure_file_length(&self, mut file: &File, required: u64) -> Result<()> {
        let current = file
            .metadata()
            .wrap_err_with(|| format!("failed to get metadata for '{}'", self.path.display()))?
            .len();

        if current >= required {
            return Ok(());
        }

        let filler = vec![0u8; FILLER_CHUNK_SIZE];
        let mut position = current;

        file.seek(SeekFrom::Start(position))
            .wrap_err_with(|| format!("failed to seek '{}' to {}", self.path.display(), position))?;

        while position < required {
            let chunk = (required - position).min(FILLER_CHUNK_SIZE as u64) as usize;
            file.write_all(&filler[..chunk]).wrap_err_with(|| {
                format!(
                    "failed to extend '{}' from {} to {} bytes",
                    self.path.display(),
                    current,
                    required
                )
            })?;
            position += chunk as u64;
        }

        self.file_length.store(required, Ordering::Release);

        debug!(
            path = %self.path.display(),
            from = current,
            to = required,
            "extended storage file"
        );

        Ok(())
    }
}
