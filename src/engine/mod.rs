//! # Records Storage Engine
//!
//! `RecordsStorage` is the public entry point of fsrecords. It combines the
//! page manager, the address translator and the record accessors into a
//! lock-free store of fixed-size records addressed by `i32` ids.
//!
//! ## Operation Flow
//!
//! ```text
//! set_flags(id, value)
//!     │
//!     ├─ check open, check 0 <= id < records_count
//!     ├─ RecordAddressing::record_offset(id)      pure arithmetic
//!     ├─ MappedFileStorage::page_for(offset)      maps the page on first use
//!     ├─ RecordAccessor: load, compare, store     one atomic word
//!     └─ if changed: mod_count = ++global_mod_count, dirty = true
//! ```
//!
//! ## Counters
//!
//! Three counters live in memory and reach the header only on `force()`:
//!
//! - `allocated`: number of allocated record ids; ids are handed out by
//!   fetch-add and never reused
//! - `global_mod_count`: incremented on every mutation; the new value is
//!   stamped into the `mod_count` of the record that changed
//! - `dirty`: set by every mutation, cleared by `force()`
//!
//! The counters belong to the storage instance, so independent storages in the
//! same process do not interfere.
//!
//! ## Consistency
//!
//! Each field read or write is a single atomic operation. Nothing spans
//! fields: `fill_record` and `update_record` perform several independent
//! stores, and a concurrent reader may observe a partially applied update.
//! Callers needing multi-field consistency must coordinate externally.
//!
//! ## Crash Detection
//!
//! `force()` persists the global mod count. Every record written after that
//! carries a larger `mod_count`, so after a crash
//! `records_modified_after_flush()` lists the records whose latest writes were
//! never covered by a flush.
//!
//! ## Module Organization
//!
//! - `builder`: `RecordsStorageBuilder` and `open`
//! - `header`: header accessors and header operations
//! - `lifecycle`: `force`, `close`, `length`, `Drop`
//! - `scan`: `process_all_records`, `records_modified_after_flush`

mod builder;
mod header;
mod lifecycle;
mod scan;

pub use builder::RecordsStorageBuilder;
pub use header::{HeaderAccessor, HeaderUpdater};
pub use scan::ScannedRecord;

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use eyre::{ensure, Result};

use crate::config::{MAX_RECORDS_COUNT, NULL_ID};
use crate::error::StorageError;
use crate::records::layout::{
    ATTR_REF_OFFSET, FLAGS_OFFSET, LENGTH_OFFSET, NAME_REF_OFFSET, PARENT_REF_OFFSET,
    TIMESTAMP_OFFSET,
};
use crate::records::{RecordAccessor, RecordUpdater};
use crate::storage::{MappedFileStorage, RecordAddressing};

/// In-memory counters of an open storage.
#[derive(Debug)]
pub(crate) struct StorageState {
    allocated: AtomicI32,
    global_mod_count: AtomicI32,
    dirty: AtomicBool,
    closed: AtomicBool,
}

impl StorageState {
    pub(crate) fn new(allocated: i32, global_mod_count: i32) -> Self {
        Self {
            allocated: AtomicI32::new(allocated),
            global_mod_count: AtomicI32::new(global_mod_count),
            dirty: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    #[inline]
    pub(crate) fn allocated(&self) -> i32 {
        self.allocated.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn global_mod_count(&self) -> i32 {
        self.global_mod_count.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Increments the global mod count (wrapping) and marks the storage dirty.
    pub(crate) fn bump(&self) -> i32 {
        let mod_count = self
            .global_mod_count
            .fetch_add(1, Ordering::AcqRel)
            .wrapping_add(1);
        self.mark_dirty();
        mod_count
    }

    pub(crate) fn stamp(&self, record: &RecordAccessor<'_>) {
        record.stamp(self.bump());
    }

    /// Hands out the next id once `reserve` has succeeded for it. A failing
    /// `reserve` leaves the count unchanged.
    fn allocate(&self, reserve: impl Fn(i32) -> Result<()>) -> Result<i32> {
        let mut count = self.allocated();
        loop {
            ensure!(
                count < MAX_RECORDS_COUNT,
                StorageError::CapacityExceeded {
                    requested: count as u64 + 1,
                    max: MAX_RECORDS_COUNT as u64,
                }
            );
            reserve(count)?;

            match self.allocated.compare_exchange_weak(
                count,
                count + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(count),
                Err(current) => count = current,
            }
        }
    }
}

/// A lock-free store of fixed-size records over a memory-mapped file.
///
/// `RecordsStorage` is `Send + Sync`; share it by reference or `Arc`. All
/// operations take `&self`.
///
/// # Example
///
/// ```ignore
/// let storage = RecordsStorage::builder().page_size(1 << 20).open("records.dat")?;
///
/// let id = storage.allocate_record()?;
/// storage.fill_record(id, now, 1024, 0, name_id, parent_id, true)?;
/// storage.force()?;
/// storage.close()?;
/// ```
#[derive(Debug)]
pub struct RecordsStorage {
    storage: MappedFileStorage,
    addressing: RecordAddressing,
    state: StorageState,
}

impl RecordsStorage {
    pub(crate) fn from_parts(
        storage: MappedFileStorage,
        addressing: RecordAddressing,
        state: StorageState,
    ) -> Self {
        Self {
            storage,
            addressing,
            state,
        }
    }

    pub fn records_count(&self) -> i32 {
        self.state.allocated()
    }

    /// Current in-memory global mod count. Reaches the header on `force()`.
    pub fn global_mod_count(&self) -> i32 {
        self.state.global_mod_count()
    }

    pub fn is_dirty(&self) -> bool {
        self.state.dirty.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::Acquire)
    }

    /// Reserves the next record id. The record's contents are whatever the
    /// file holds at that position, zero for a fresh file.
    ///
    /// The page holding the new record is mapped before the id is handed out,
    /// so a failure leaves `records_count()` and the dirty flag untouched.
    pub fn allocate_record(&self) -> Result<i32> {
        self.check_open()?;
        let id = self
            .state
            .allocate(|id| self.record_unchecked(id).map(drop))?;
        self.state.mark_dirty();
        Ok(id)
    }

    pub fn read_record<R>(
        &self,
        id: i32,
        reader: impl FnOnce(&RecordAccessor<'_>) -> R,
    ) -> Result<R> {
        let record = self.record(id)?;
        Ok(reader(&record))
    }

    /// Runs `updater` on record `id`, allocating a new record first if `id` is
    /// `NULL_ID` or below. Stamps the record once if `updater` returns `true`.
    ///
    /// Returns the id of the updated record.
    pub fn update_record(
        &self,
        id: i32,
        updater: impl FnOnce(&RecordUpdater<'_>) -> bool,
    ) -> Result<i32> {
        self.check_open()?;
        let id = if id <= NULL_ID {
            self.allocate_record()?
        } else {
            id
        };

        self.write_field(id, updater)?;
        Ok(id)
    }

    pub fn parent(&self, id: i32) -> Result<i32> {
        self.read_record(id, |r| r.parent_id())
    }

    /// Sets the parent of `id`. `parent_id` must itself be an allocated record.
    pub fn set_parent(&self, id: i32, parent_id: i32) -> Result<()> {
        self.check_open()?;
        self.check_record_id(parent_id)?;
        self.write_field(id, |r| {
            r.set_parent_id(parent_id);
            true
        })?;
        Ok(())
    }

    pub fn name_id(&self, id: i32) -> Result<i32> {
        self.read_record(id, |r| r.name_id())
    }

    /// Sets the name id of `id`. Name ids are strictly positive.
    pub fn set_name_id(&self, id: i32, name_id: i32) -> Result<()> {
        self.check_open()?;
        ensure!(
            name_id > 0,
            StorageError::InvalidFieldValue {
                field: "name_id",
                value: name_id as i64,
            }
        );
        self.write_field(id, |r| {
            r.set_name_id(name_id);
            true
        })?;
        Ok(())
    }

    pub fn flags(&self, id: i32) -> Result<i32> {
        self.read_record(id, |r| r.flags())
    }

    pub fn set_flags(&self, id: i32, flags: i32) -> Result<bool> {
        self.write_field(id, |r| r.set_flags(flags))
    }

    pub fn attribute_record_id(&self, id: i32) -> Result<i32> {
        self.read_record(id, |r| r.attribute_record_id())
    }

    pub fn set_attribute_record_id(&self, id: i32, attribute_record_id: i32) -> Result<()> {
        self.write_field(id, |r| {
            r.set_attribute_record_id(attribute_record_id);
            true
        })?;
        Ok(())
    }

    pub fn content_record_id(&self, id: i32) -> Result<i32> {
        self.read_record(id, |r| r.content_record_id())
    }

    pub fn set_content_record_id(&self, id: i32, content_record_id: i32) -> Result<bool> {
        self.write_field(id, |r| r.set_content_record_id(content_record_id))
    }

    pub fn record_timestamp(&self, id: i32) -> Result<i64> {
        self.read_record(id, |r| r.timestamp())
    }

    pub fn set_record_timestamp(&self, id: i32, timestamp: i64) -> Result<bool> {
        self.write_field(id, |r| r.set_timestamp(timestamp))
    }

    pub fn record_length(&self, id: i32) -> Result<i64> {
        self.read_record(id, |r| r.length())
    }

    pub fn set_record_length(&self, id: i32, length: i64) -> Result<bool> {
        self.write_field(id, |r| r.set_length(length))
    }

    pub fn mod_count(&self, id: i32) -> Result<i32> {
        self.read_record(id, |r| r.mod_count())
    }

    /// Stamps `id` with a fresh mod count without changing any field.
    pub fn mark_record_modified(&self, id: i32) -> Result<()> {
        self.write_field(id, |_| true)?;
        Ok(())
    }

    /// Overwrites the main fields of `id` and stamps it once.
    ///
    /// The stores are independent: a concurrent reader may see some fields
    /// updated and others not. The attribute ref is reset to 0 only if
    /// `overwrite_attr_ref` is set; the content ref is left untouched.
    #[allow(clippy::too_many_arguments)]
    pub fn fill_record(
        &self,
        id: i32,
        timestamp: i64,
        length: i64,
        flags: i32,
        name_id: i32,
        parent_id: i32,
        overwrite_attr_ref: bool,
    ) -> Result<()> {
        let record = self.record(id)?;

        record.set_int(PARENT_REF_OFFSET, parent_id);
        record.set_int(NAME_REF_OFFSET, name_id);
        record.set_int(FLAGS_OFFSET, flags);
        if overwrite_attr_ref {
            record.set_int(ATTR_REF_OFFSET, 0);
        }
        record.set_long(TIMESTAMP_OFFSET, timestamp);
        record.set_long(LENGTH_OFFSET, length);

        self.state.stamp(&record);
        Ok(())
    }

    /// Zeroes record `id`, first extending the allocated range to cover it.
    ///
    /// Unlike the setters, this does not stamp the record: a cleaned record
    /// reads back all zeroes, `mod_count` included.
    pub fn clean_record(&self, id: i32) -> Result<()> {
        self.check_open()?;
        ensure!(
            id > NULL_ID,
            StorageError::RecordIdOutOfRange {
                id,
                allocated: self.state.allocated(),
            }
        );
        ensure!(
            id < MAX_RECORDS_COUNT,
            StorageError::CapacityExceeded {
                requested: id as u64 + 1,
                max: MAX_RECORDS_COUNT as u64,
            }
        );

        let record = self.record_unchecked(id)?;
        self.state.allocated.fetch_max(id + 1, Ordering::AcqRel);
        self.state.mark_dirty();
        record.zero();
        Ok(())
    }

    pub(crate) fn check_open(&self) -> Result<()> {
        ensure!(!self.is_closed(), StorageError::Closed);
        Ok(())
    }

    fn check_record_id(&self, id: i32) -> Result<()> {
        let allocated = self.state.allocated();
        ensure!(
            NULL_ID < id && id < allocated,
            StorageError::RecordIdOutOfRange { id, allocated }
        );
        Ok(())
    }

    fn record(&self, id: i32) -> Result<RecordAccessor<'_>> {
        self.check_open()?;
        self.check_record_id(id)?;
        self.record_unchecked(id)
    }

    /// Id must be non-negative.
    pub(crate) fn record_unchecked(&self, id: i32) -> Result<RecordAccessor<'_>> {
        let offset = self.addressing.record_offset(id as u32);
        let page = self.storage.page_for(offset)?;
        Ok(RecordAccessor::new(id, page, self.storage.offset_in_page(offset)))
    }

    fn write_field(
        &self,
        id: i32,
        write: impl FnOnce(&RecordUpdater<'_>) -> bool,
    ) -> Result<bool> {
        let record = self.record(id)?;
        let changed = write(&RecordUpdater::new(record));
        if changed {
            self.state.stamp(&record);
        }
        Ok(changed)
    }
}
