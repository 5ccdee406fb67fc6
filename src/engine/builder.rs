//! # Records Storage Builder
//!
//! `RecordsStorageBuilder` configures and opens a [`RecordsStorage`].
//!
//! ## Configuration Options
//!
//! | Option    | Default | Description                                   |
//! |-----------|---------|-----------------------------------------------|
//! | page_size | 64 MiB  | Size of each mapped page, a power of two      |
//!
//! The page size is not recorded in the file. Reopening a file with a different
//! page size than it was written with shifts every record after page 0, so the
//! owner of the file must keep it constant.
//!
//! ## Usage
//!
//! ```ignore
//! let storage = RecordsStorage::open("records.dat")?;
//!
//! let storage = RecordsStorage::builder()
//!     .page_size(1 << 20)
//!     .open("records.dat")?;
//! ```

use std::path::Path;
use std::sync::atomic::Ordering;

use eyre::{bail, Result, WrapErr};
use tracing::debug;

use crate::config::{DEFAULT_PAGE_SIZE, HEADER_SIZE, RECORD_SIZE};
use crate::engine::{RecordsStorage, StorageState};
use crate::error::StorageError;
use crate::storage::headers::{HEADER_GLOBAL_MOD_COUNT_OFFSET, HEADER_RECORDS_ALLOCATED_OFFSET};
use crate::storage::{MappedFileStorage, RecordAddressing};

/// Builder for opening a [`RecordsStorage`].
///
/// Use `RecordsStorage::builder()` to create one.
#[derive(Debug, Clone)]
pub struct RecordsStorageBuilder {
    page_size: usize,
}

impl Default for RecordsStorageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordsStorageBuilder {
    pub fn new() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets the mapped page size. Must be a power of two within
    /// [`MIN_PAGE_SIZE`](crate::config::MIN_PAGE_SIZE) and
    /// [`MAX_PAGE_SIZE`](crate::config::MAX_PAGE_SIZE); checked by `open()`.
    pub fn page_size(mut self, bytes: usize) -> Self {
        self.page_size = bytes;
        self
    }

    /// Opens the storage at `path`, creating the file if it does not exist.
    ///
    /// The allocated records count and global mod count are loaded from the
    /// header as written by the last `force()`.
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<RecordsStorage> {
        let path = path.as_ref();
        let storage = MappedFileStorage::open(path, self.page_size)?;

        let header_page = storage
            .page_for(0)
            .wrap_err_with(|| format!("failed to map header of '{}'", path.display()))?;
        let allocated = header_page
            .u32_at(HEADER_RECORDS_ALLOCATED_OFFSET)
            .load(Ordering::Acquire) as i32;
        let global_mod_count = header_page
            .u32_at(HEADER_GLOBAL_MOD_COUNT_OFFSET)
            .load(Ordering::Acquire) as i32;

        if allocated < 0 {
            bail!(StorageError::Corrupted {
                path: path.to_path_buf(),
                reason: format!("negative records count {}", allocated),
            });
        }

        debug!(
            path = %path.display(),
            page_size = self.page_size,
            records = allocated,
            global_mod_count,
            "opened records storage"
        );

        Ok(RecordsStorage::from_parts(
            storage,
            RecordAddressing::new(self.page_size, HEADER_SIZE, RECORD_SIZE),
            StorageState::new(allocated, global_mod_count),
        ))
    }
}

impl RecordsStorage {
    pub fn builder() -> RecordsStorageBuilder {
        RecordsStorageBuilder::new()
    }

    /// Opens the storage at `path` with the default page size.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::builder().open(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MIN_PAGE_SIZE;
    use tempfile::tempdir;

    #[test]
    fn builder_defaults_to_64mib_pages() {
        assert_eq!(RecordsStorageBuilder::default().page_size, 64 * 1024 * 1024);
    }

    #[test]
    fn open_creates_file_with_header_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.dat");

        let storage = RecordsStorage::builder()
            .page_size(MIN_PAGE_SIZE)
            .open(&path)
            .unwrap();

        assert_eq!(storage.records_count(), 0);
        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            MIN_PAGE_SIZE as u64
        );
    }

    #[test]
    fn open_rejects_invalid_page_size() {
        let dir = tempdir().unwrap();

        let err = RecordsStorage::builder()
            .page_size(MIN_PAGE_SIZE + 8)
            .open(dir.path().join("records.dat"))
            .unwrap_err();

        assert_eq!(
            StorageError::of(&err),
            Some(&StorageError::InvalidPageSize(MIN_PAGE_SIZE + 8))
        );
    }

    #[test]
    fn open_rejects_negative_records_count() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.dat");
        let mut bytes = vec![0u8; MIN_PAGE_SIZE];
        bytes[HEADER_RECORDS_ALLOCATED_OFFSET..HEADER_RECORDS_ALLOCATED_OFFSET + 4]
            .copy_from_slice(&(-3i32).to_ne_bytes());
        std::fs::write(&path, bytes).unwrap();

        let err = RecordsStorage::builder()
            .page_size(MIN_PAGE_SIZE)
            .open(&path)
            .unwrap_err();

        assert!(matches!(
            StorageError::of(&err),
            Some(StorageError::Corrupted { .. })
        ));
    }

    #[test]
    fn open_loads_counters_from_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.dat");
        let mut bytes = vec![0u8; MIN_PAGE_SIZE];
        bytes[HEADER_RECORDS_ALLOCATED_OFFSET..HEADER_RECORDS_ALLOCATED_OFFSET + 4]
            .copy_from_slice(&12i32.to_ne_bytes());
        bytes[HEADER_GLOBAL_MOD_COUNT_OFFSET..HEADER_GLOBAL_MOD_COUNT_OFFSET + 4]
            .copy_from_slice(&345i32.to_ne_bytes());
        std::fs::write(&path, bytes).unwrap();

        let storage = RecordsStorage::builder()
            .page_size(MIN_PAGE_SIZE)
            .open(&path)
            .unwrap();

        assert_eq!(storage.records_count(), 12);
        assert_eq!(storage.global_mod_count(), 345);
        assert!(!storage.is_dirty());
    }
}
