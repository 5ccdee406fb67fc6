//! # In-Place Record Access
//!
//! `RecordAccessor` reads one record's fields straight out of the mapped page;
//! `RecordUpdater` adds setters. Both borrow the page, so they cannot outlive
//! the storage, and both are handed to caller closures by
//! `RecordsStorage::read_record` / `update_record`.
//!
//! ## Atomicity
//!
//! Each field is one aligned atomic word. Loads use `Acquire`, stores
//! `Release`. There is no cross-field consistency: a reader running
//! concurrently with a multi-field update may see any mix of old and new
//! field values.
//!
//! ## Change Detection
//!
//! The `*_if_changed` style setters (flags, length, timestamp, content ref)
//! load the current value and store only when it differs, returning whether
//! they wrote. Compare and store are two separate atomic operations, so two
//! racing writers of different values may both report `true`.
//!
//! Updater setters never touch `mod_count`; stamping is done once per update
//! by the storage, based on the closure's return value.

use std::ops::Deref;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::config::RECORD_SIZE;
use crate::records::layout::*;
use crate::storage::Page;

/// Read-only view of a record in a mapped page.
#[derive(Debug, Clone, Copy)]
pub struct RecordAccessor<'a> {
    id: i32,
    page: &'a Page,
    offset_in_page: usize,
}

impl<'a> RecordAccessor<'a> {
    pub(crate) fn new(id: i32, page: &'a Page, offset_in_page: usize) -> Self {
        debug_assert!(offset_in_page + RECORD_SIZE <= page.len());
        Self {
            id,
            page,
            offset_in_page,
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn parent_id(&self) -> i32 {
        self.get_int(PARENT_REF_OFFSET)
    }

    pub fn name_id(&self) -> i32 {
        self.get_int(NAME_REF_OFFSET)
    }

    pub fn flags(&self) -> i32 {
        self.get_int(FLAGS_OFFSET)
    }

    pub fn attribute_record_id(&self) -> i32 {
        self.get_int(ATTR_REF_OFFSET)
    }

    pub fn content_record_id(&self) -> i32 {
        self.get_int(CONTENT_REF_OFFSET)
    }

    pub fn mod_count(&self) -> i32 {
        self.get_int(MOD_COUNT_OFFSET)
    }

    pub fn timestamp(&self) -> i64 {
        self.get_long(TIMESTAMP_OFFSET)
    }

    pub fn length(&self) -> i64 {
        self.get_long(LENGTH_OFFSET)
    }

    /// Field-by-field copy of the record. Not a consistent snapshot under
    /// concurrent writes.
    pub fn snapshot(&self) -> RecordLayout {
        RecordLayout {
            parent_id: self.parent_id(),
            name_id: self.name_id(),
            flags: self.flags(),
            attribute_record_id: self.attribute_record_id(),
            content_record_id: self.content_record_id(),
            mod_count: self.mod_count(),
            timestamp: self.timestamp(),
            length: self.length(),
        }
    }

    #[inline]
    fn int_field(&self, field_offset: usize) -> &'a AtomicU32 {
        self.page.u32_at(self.offset_in_page + field_offset)
    }

    #[inline]
    fn long_field(&self, field_offset: usize) -> &'a AtomicU64 {
        self.page.u64_at(self.offset_in_page + field_offset)
    }

    #[inline]
    fn get_int(&self, field_offset: usize) -> i32 {
        self.int_field(field_offset).load(Ordering::Acquire) as i32
    }

    #[inline]
    fn get_long(&self, field_offset: usize) -> i64 {
        self.long_field(field_offset).load(Ordering::Acquire) as i64
    }

    #[inline]
    pub(crate) fn set_int(&self, field_offset: usize, value: i32) {
        self.int_field(field_offset)
            .store(value as u32, Ordering::Release);
    }

    #[inline]
    pub(crate) fn set_long(&self, field_offset: usize, value: i64) {
        self.long_field(field_offset)
            .store(value as u64, Ordering::Release);
    }

    pub(crate) fn set_int_if_changed(&self, field_offset: usize, value: i32) -> bool {
        let field = self.int_field(field_offset);
        if field.load(Ordering::Acquire) as i32 == value {
            return false;
        }
        field.store(value as u32, Ordering::Release);
        true
    }

    pub(crate) fn set_long_if_changed(&self, field_offset: usize, value: i64) -> bool {
        let field = self.long_field(field_offset);
        if field.load(Ordering::Acquire) as i64 == value {
            return false;
        }
        field.store(value as u64, Ordering::Release);
        true
    }

    pub(crate) fn stamp(&self, mod_count: i32) {
        self.set_int(MOD_COUNT_OFFSET, mod_count);
    }

    /// Zeroes the record one 32-bit word at a time.
    pub(crate) fn zero(&self) {
        for word in (0..RECORD_SIZE).step_by(4) {
            self.int_field(word).store(0, Ordering::Release);
        }
    }
}

/// Writable view of a record, passed to `RecordsStorage::update_record`.
///
/// Dereferences to [`RecordAccessor`] for reads.
#[derive(Debug)]
pub struct RecordUpdater<'a> {
    accessor: RecordAccessor<'a>,
}

impl<'a> RecordUpdater<'a> {
    pub(crate) fn new(accessor: RecordAccessor<'a>) -> Self {
        Self { accessor }
    }

    pub fn set_parent_id(&self, parent_id: i32) {
        self.accessor.set_int(PARENT_REF_OFFSET, parent_id);
    }

    pub fn set_name_id(&self, name_id: i32) {
        self.accessor.set_int(NAME_REF_OFFSET, name_id);
    }

    pub fn set_attribute_record_id(&self, attribute_record_id: i32) {
        self.accessor.set_int(ATTR_REF_OFFSET, attribute_record_id);
    }

    pub fn set_flags(&self, flags: i32) -> bool {
        self.accessor.set_int_if_changed(FLAGS_OFFSET, flags)
    }

    pub fn set_content_record_id(&self, content_record_id: i32) -> bool {
        self.accessor
            .set_int_if_changed(CONTENT_REF_OFFSET, content_record_id)
    }

    pub fn set_timestamp(&self, timestamp: i64) -> bool {
        self.accessor.set_long_if_changed(TIMESTAMP_OFFSET, timestamp)
    }

    pub fn set_length(&self, length: i64) -> bool {
        self.accessor.set_long_if_changed(LENGTH_OFFSET, length)
    }
}

impl<'a> Deref for RecordUpdater<'a> {
    type Target = RecordAccessor<'a>;

    fn deref(&self) -> &Self::Target {
        &self.accessor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MappedFileStorage;
    use tempfile::tempdir;

    const PAGE: usize = 64 * 1024;

    fn with_record(offset_in_page: usize, test: impl FnOnce(RecordAccessor<'_>)) {
        let dir = tempdir().unwrap();
        let storage = MappedFileStorage::open(dir.path().join("records.dat"), PAGE).unwrap();
        let page = storage.page_for(0).unwrap();
        test(RecordAccessor::new(3, page, offset_in_page));
    }

    #[test]
    fn fresh_record_reads_zero() {
        with_record(64, |record| {
            assert_eq!(record.id(), 3);
            assert!(record.snapshot().is_zeroed());
        });
    }

    #[test]
    fn updater_setters_are_visible_through_accessor() {
        with_record(104, |record| {
            let updater = RecordUpdater::new(record);

            updater.set_parent_id(1);
            updater.set_name_id(2);
            updater.set_attribute_record_id(3);
            assert!(updater.set_flags(0x10));
            assert!(updater.set_content_record_id(5));
            assert!(updater.set_timestamp(1_700_000_000_000));
            assert!(updater.set_length(-1));

            assert_eq!(
                record.snapshot(),
                RecordLayout {
                    parent_id: 1,
                    name_id: 2,
                    flags: 0x10,
                    attribute_record_id: 3,
                    content_record_id: 5,
                    mod_count: 0,
                    timestamp: 1_700_000_000_000,
                    length: -1,
                }
            );
        });
    }

    #[test]
    fn set_if_changed_reports_no_change_for_equal_value() {
        with_record(64, |record| {
            let updater = RecordUpdater::new(record);

            assert!(updater.set_flags(7));
            assert!(!updater.set_flags(7));
            assert!(updater.set_length(i64::MAX));
            assert!(!updater.set_length(i64::MAX));
            assert!(!updater.set_timestamp(0));
        });
    }

    #[test]
    fn updater_setters_do_not_stamp() {
        with_record(64, |record| {
            let updater = RecordUpdater::new(record);
            updater.set_name_id(9);
            updater.set_flags(1);

            assert_eq!(updater.mod_count(), 0);

            record.stamp(12);
            assert_eq!(updater.mod_count(), 12);
        });
    }

    #[test]
    fn zero_clears_only_this_record() {
        let dir = tempdir().unwrap();
        let storage = MappedFileStorage::open(dir.path().join("records.dat"), PAGE).unwrap();
        let page = storage.page_for(0).unwrap();
        let first = RecordAccessor::new(0, page, 64);
        let second = RecordAccessor::new(1, page, 64 + RECORD_SIZE);

        for record in [first, second] {
            let updater = RecordUpdater::new(record);
            updater.set_parent_id(4);
            updater.set_length(100);
            record.stamp(1);
        }

        first.zero();

        assert!(first.snapshot().is_zeroed());
        assert_eq!(second.parent_id(), 4);
        assert_eq!(second.length(), 100);
        assert_eq!(second.mod_count(), 1);
    }
}
