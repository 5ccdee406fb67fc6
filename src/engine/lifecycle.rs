//! # Storage Lifecycle
//!
//! ## Force
//!
//! `force()` publishes the in-memory counters: if the storage is dirty, it
//! clears the flag and writes the allocated records count and the global mod
//! count into the header. Record data needs no flushing step of its own: it is
//! written in place into shared mappings and reaches the file through the OS
//! page cache. `force()` does not `msync`.
//!
//! ## Close
//!
//! `close()` marks the storage closed, forces and releases the file handle,
//! after which every operation fails with `StorageError::Closed`. Mappings
//! stay alive until the storage is dropped. The `Drop` implementation forces
//! once more, which publishes writes that were in flight during `close()`.
//!
//! ```text
//! Open ──close()──> Closed
//!   │                  │
//!   └──── drop ────────┴──> force (if dirty), unmap
//! ```

use std::sync::atomic::Ordering;

use eyre::{bail, Result};
use tracing::{info, trace, warn};

use crate::engine::RecordsStorage;
use crate::error::StorageError;
use crate::storage::headers::{HEADER_GLOBAL_MOD_COUNT_OFFSET, HEADER_RECORDS_ALLOCATED_OFFSET};

impl RecordsStorage {
    /// Writes the counters into the header if anything changed since the last
    /// force. A failure leaves the storage dirty.
    pub fn force(&self) -> Result<()> {
        self.check_open()?;
        self.flush_header()
    }

    /// Flushes the header and releases the file. Writes that were already in
    /// flight when the storage closed reach the header on drop.
    pub fn close(&self) -> Result<()> {
        if self.state.closed.swap(true, Ordering::AcqRel) {
            bail!(StorageError::Closed);
        }
        if let Err(e) = self.flush_header() {
            self.state.closed.store(false, Ordering::Release);
            return Err(e);
        }
        self.storage.close();

        info!(
            path = %self.storage.path().display(),
            records = self.records_count(),
            global_mod_count = self.global_mod_count(),
            "closed records storage"
        );
        Ok(())
    }

    /// Logical size of the storage in bytes: 0 for a storage that was never
    /// touched, else [`actual_data_length`](Self::actual_data_length).
    pub fn length(&self) -> Result<u64> {
        self.check_open()?;
        if self.records_count() == 0 && self.global_mod_count() == 0 {
            return Ok(0);
        }
        Ok(self.actual_data_length())
    }

    /// Offset just past the last allocated record, header and page tails
    /// included.
    pub fn actual_data_length(&self) -> u64 {
        self.addressing.record_offset(self.records_count() as u32)
    }

    pub fn page_size(&self) -> usize {
        self.storage.page_size()
    }

    pub fn path(&self) -> &std::path::Path {
        self.storage.path()
    }

    fn flush_header(&self) -> Result<()> {
        if !self.is_dirty() {
            return Ok(());
        }

        let header_page = self.storage.page_for(0)?;

        if self
            .state
            .dirty
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let records = self.records_count();
            let global_mod_count = self.global_mod_count();
            header_page
                .u32_at(HEADER_RECORDS_ALLOCATED_OFFSET)
                .store(records as u32, Ordering::Release);
            header_page
                .u32_at(HEADER_GLOBAL_MOD_COUNT_OFFSET)
                .store(global_mod_count as u32, Ordering::Release);

            trace!(records, global_mod_count, "flushed storage header");
        }
        Ok(())
    }
}

impl Drop for RecordsStorage {
    fn drop(&mut self) {
        // page 0 stays mapped after close, so this also covers a closed storage
        if let Err(e) = self.flush_header() {
            warn!(
                path = %self.storage.path().display(),
                error = %e,
                "failed to flush storage header on drop"
            );
        }
    }
}
