//! Header operations.
//!
//! The header fields are read and written in place on page 0, like record
//! fields. Two of them, `records_allocated` and `global_mod_count`, are owned
//! by the storage and written only by `force()`; the accessors expose their
//! persisted values read-only. The others belong to the layer above.
//!
//! Every header setter bumps the global mod count and marks the storage
//! dirty.

use std::sync::atomic::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

use eyre::Result;

use crate::engine::{RecordsStorage, StorageState};
use crate::storage::headers::{
    check_header_offset, HEADER_CONNECTION_STATUS_OFFSET, HEADER_GLOBAL_MOD_COUNT_OFFSET,
    HEADER_RECORDS_ALLOCATED_OFFSET, HEADER_TIMESTAMP_OFFSET, HEADER_VERSION_OFFSET,
};
use crate::storage::Page;

#[derive(Debug, Clone, Copy)]
pub struct HeaderAccessor<'a> {
    page: &'a Page,
    state: &'a StorageState,
}

impl<'a> HeaderAccessor<'a> {
    pub fn version(&self) -> i32 {
        self.get_int(HEADER_VERSION_OFFSET)
    }

    pub fn connection_status(&self) -> i32 {
        self.get_int(HEADER_CONNECTION_STATUS_OFFSET)
    }

    /// Millis since the epoch of the last `set_version`.
    pub fn timestamp(&self) -> i64 {
        self.get_long(HEADER_TIMESTAMP_OFFSET)
    }

    /// In-memory global mod count, including changes not yet flushed.
    pub fn global_mod_count(&self) -> i32 {
        self.state.global_mod_count()
    }

    /// Global mod count as of the last `force()`.
    pub fn persisted_global_mod_count(&self) -> i32 {
        self.get_int(HEADER_GLOBAL_MOD_COUNT_OFFSET)
    }

    /// Records count as of the last `force()`.
    pub fn persisted_records_count(&self) -> i32 {
        self.get_int(HEADER_RECORDS_ALLOCATED_OFFSET)
    }

    /// Raw 32-bit header field at `offset`.
    pub fn int_field(&self, offset: usize) -> Result<i32> {
        check_header_offset(offset, 4)?;
        Ok(self.get_int(offset))
    }

    /// Raw 64-bit header field at `offset`.
    pub fn long_field(&self, offset: usize) -> Result<i64> {
        check_header_offset(offset, 8)?;
        Ok(self.get_long(offset))
    }

    fn get_int(&self, offset: usize) -> i32 {
        self.page.u32_at(offset).load(Ordering::Acquire) as i32
    }

    fn get_long(&self, offset: usize) -> i64 {
        self.page.u64_at(offset).load(Ordering::Acquire) as i64
    }
}

/// Writable view of the header, passed to `RecordsStorage::update_header`.
#[derive(Debug)]
pub struct HeaderUpdater<'a> {
    accessor: HeaderAccessor<'a>,
}

impl HeaderUpdater<'_> {
    /// Sets the format version and stamps the header timestamp with now.
    pub fn set_version(&self, version: i32) {
        self.set_int(HEADER_VERSION_OFFSET, version);
        self.accessor
            .page
            .u64_at(HEADER_TIMESTAMP_OFFSET)
            .store(now_millis() as u64, Ordering::Release);
        self.accessor.state.bump();
    }

    pub fn set_connection_status(&self, status: i32) {
        self.set_int(HEADER_CONNECTION_STATUS_OFFSET, status);
        self.accessor.state.bump();
    }

    fn set_int(&self, offset: usize, value: i32) {
        self.accessor
            .page
            .u32_at(offset)
            .store(value as u32, Ordering::Release);
    }
}

impl<'a> std::ops::Deref for HeaderUpdater<'a> {
    type Target = HeaderAccessor<'a>;

    fn deref(&self) -> &Self::Target {
        &self.accessor
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

impl RecordsStorage {
    pub fn read_header<R>(&self, reader: impl FnOnce(&HeaderAccessor<'_>) -> R) -> Result<R> {
        let header = self.header()?;
        Ok(reader(&header))
    }

    /// Runs `updater` on the header. A `true` return counts as one more
    /// modification on top of those made by the setters.
    pub fn update_header(&self, updater: impl FnOnce(&HeaderUpdater<'_>) -> bool) -> Result<()> {
        let accessor = self.header()?;
        if updater(&HeaderUpdater { accessor }) {
            self.state.bump();
        }
        Ok(())
    }

    pub fn version(&self) -> Result<i32> {
        self.read_header(|h| h.version())
    }

    pub fn set_version(&self, version: i32) -> Result<()> {
        self.update_header(|h| {
            h.set_version(version);
            false
        })
    }

    pub fn connection_status(&self) -> Result<i32> {
        self.read_header(|h| h.connection_status())
    }

    pub fn set_connection_status(&self, status: i32) -> Result<()> {
        self.update_header(|h| {
            h.set_connection_status(status);
            false
        })
    }

    pub fn timestamp(&self) -> Result<i64> {
        self.read_header(|h| h.timestamp())
    }

    fn header(&self) -> Result<HeaderAccessor<'_>> {
        self.check_open()?;
        Ok(HeaderAccessor {
            page: self.storage.page_for(0)?,
            state: &self.state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HEADER_SIZE, MIN_PAGE_SIZE};
    use crate::error::StorageError;
    use tempfile::{tempdir, TempDir};

    fn open_storage() -> (TempDir, RecordsStorage) {
        let dir = tempdir().unwrap();
        let storage = RecordsStorage::builder()
            .page_size(MIN_PAGE_SIZE)
            .open(dir.path().join("records.dat"))
            .unwrap();
        (dir, storage)
    }

    #[test]
    fn fresh_header_reads_zero() {
        let (_dir, storage) = open_storage();

        assert_eq!(storage.version().unwrap(), 0);
        assert_eq!(storage.connection_status().unwrap(), 0);
        assert_eq!(storage.timestamp().unwrap(), 0);
    }

    #[test]
    fn set_version_stamps_timestamp_and_bumps_mod_count() {
        let (_dir, storage) = open_storage();
        let before = now_millis();

        storage.set_version(3).unwrap();

        assert_eq!(storage.version().unwrap(), 3);
        let timestamp = storage.timestamp().unwrap();
        assert!(timestamp >= before && timestamp <= now_millis());
        assert_eq!(storage.global_mod_count(), 1);
        assert!(storage.is_dirty());
    }

    #[test]
    fn set_connection_status_bumps_mod_count() {
        let (_dir, storage) = open_storage();

        storage.set_connection_status(0x7E57).unwrap();

        assert_eq!(storage.connection_status().unwrap(), 0x7E57);
        assert_eq!(storage.global_mod_count(), 1);
        assert_eq!(storage.timestamp().unwrap(), 0);
    }

    #[test]
    fn update_header_true_adds_one_more_modification() {
        let (_dir, storage) = open_storage();

        storage
            .update_header(|h| {
                h.set_version(1);
                h.set_connection_status(2);
                true
            })
            .unwrap();

        assert_eq!(storage.global_mod_count(), 3);
    }

    #[test]
    fn update_header_without_writes_stays_clean() {
        let (_dir, storage) = open_storage();

        storage.update_header(|_| false).unwrap();

        assert_eq!(storage.global_mod_count(), 0);
        assert!(!storage.is_dirty());
    }

    #[test]
    fn header_reads_are_side_effect_free() {
        let (_dir, storage) = open_storage();

        let (version, status) = storage
            .read_header(|h| (h.version(), h.connection_status()))
            .unwrap();

        assert_eq!((version, status), (0, 0));
        assert_eq!(storage.global_mod_count(), 0);
        assert!(!storage.is_dirty());
    }

    #[test]
    fn persisted_counters_change_only_on_force() {
        let (_dir, storage) = open_storage();
        storage.allocate_record().unwrap();
        storage.set_connection_status(1).unwrap();

        let persisted = |storage: &RecordsStorage| {
            storage
                .read_header(|h| (h.persisted_records_count(), h.persisted_global_mod_count()))
                .unwrap()
        };

        assert_eq!(persisted(&storage), (0, 0));
        assert_eq!(storage.read_header(|h| h.global_mod_count()).unwrap(), 1);

        storage.force().unwrap();

        assert_eq!(persisted(&storage), (1, 1));
    }

    #[test]
    fn raw_fields_are_bounds_checked() {
        let (_dir, storage) = open_storage();
        storage.set_version(9).unwrap();

        storage
            .read_header(|h| {
                assert_eq!(h.int_field(HEADER_VERSION_OFFSET).unwrap(), 9);
                assert_eq!(h.long_field(HEADER_TIMESTAMP_OFFSET).unwrap(), h.timestamp());
                assert_eq!(h.int_field(HEADER_SIZE - 4).unwrap(), 0);

                let err = h.int_field(HEADER_SIZE).unwrap_err();
                assert_eq!(
                    StorageError::of(&err),
                    Some(&StorageError::HeaderOffsetOutOfRange {
                        offset: HEADER_SIZE,
                        header_size: HEADER_SIZE
                    })
                );
                assert!(h.long_field(HEADER_SIZE - 4).is_err());
                assert!(h.long_field(4).is_err());
            })
            .unwrap();
    }
}
