//! Full scans over the allocated records.

use std::sync::atomic::Ordering;

use eyre::Result;

use crate::engine::RecordsStorage;
use crate::records::RecordAccessor;
use crate::storage::headers::HEADER_GLOBAL_MOD_COUNT_OFFSET;

/// The fields of a record that a full scan reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannedRecord {
    pub id: i32,
    pub name_id: i32,
    pub flags: i32,
    pub parent_id: i32,
}

impl RecordsStorage {
    /// Calls `visitor` for every record in `[0, records_count())`, in id order.
    ///
    /// The upper bound is read once at the start; records allocated during the
    /// scan are not visited. The first error returned by `visitor` stops the
    /// scan and is returned.
    pub fn process_all_records<F>(&self, mut visitor: F) -> Result<()>
    where
        F: FnMut(ScannedRecord) -> Result<()>,
    {
        self.scan(|record| {
            visitor(ScannedRecord {
                id: record.id(),
                name_id: record.name_id(),
                flags: record.flags(),
                parent_id: record.parent_id(),
            })
        })
    }

    /// Ids of records whose `mod_count` is newer than the global mod count
    /// persisted by the last `force()`.
    ///
    /// Called right after open, a non-empty result means the previous session
    /// wrote these records and ended without flushing, most likely by
    /// crashing; their contents may be incomplete. Not meaningful once the
    /// global mod count has wrapped.
    pub fn records_modified_after_flush(&self) -> Result<Vec<i32>> {
        let persisted = self.read_header(|h| h.persisted_global_mod_count())?;
        let mut modified = Vec::new();
        self.scan(|record| {
            if record.mod_count() > persisted {
                modified.push(record.id());
            }
            Ok(())
        })?;
        Ok(modified)
    }

    fn scan<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(&RecordAccessor<'_>) -> Result<()>,
    {
        self.check_open()?;
        let count = self.records_count();
        let mut current_page = None;

        for id in 0..count {
            let offset = self.addressing.record_offset(id as u32);
            let page = self.storage.page_for(offset)?;
            if current_page != Some(page.index()) {
                page.advise_sequential();
                current_page = Some(page.index());
            }

            let record = RecordAccessor::new(id, page, self.storage.offset_in_page(offset));
            visit(&record)?;
        }
        Ok(())
    }
}
