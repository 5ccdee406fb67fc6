//! Offline decoding of a storage file.
//!
//! `StorageImage` reads a file with plain `std::fs::read` and decodes the
//! header and records with zerocopy, without mapping anything or touching the
//! in-memory counters of a live storage. It reflects what is on disk (or in
//! the page cache) at the moment of the read, so it is only meaningful for a
//! file that is closed or quiescent.

use std::path::Path;

use eyre::{ensure, Result, WrapErr};

use crate::config::{HEADER_SIZE, MAX_PAGE_SIZE, MIN_PAGE_SIZE, RECORD_SIZE};
use crate::error::StorageError;
use crate::records::RecordLayout;
use crate::storage::addressing::RecordAddressing;
use crate::storage::headers::StorageHeader;

#[derive(Debug)]
pub struct StorageImage {
    bytes: Vec<u8>,
    header: StorageHeader,
    addressing: RecordAddressing,
}

impl StorageImage {
    /// Reads the whole file. `page_size` must match the one it was written with.
    pub fn read<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let path = path.as_ref();
        ensure!(
            page_size.is_power_of_two() && (MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size),
            StorageError::InvalidPageSize(page_size)
        );

        let bytes = std::fs::read(path)
            .wrap_err_with(|| format!("failed to read storage file '{}'", path.display()))?;

        ensure!(
            bytes.len() % page_size == 0,
            "file '{}' length {} is not a multiple of page size {}",
            path.display(),
            bytes.len(),
            page_size
        );

        let header = StorageHeader::from_bytes(&bytes)
            .wrap_err_with(|| format!("failed to decode header of '{}'", path.display()))?;

        Ok(Self {
            bytes,
            header,
            addressing: RecordAddressing::new(page_size, HEADER_SIZE, RECORD_SIZE),
        })
    }

    pub fn header(&self) -> &StorageHeader {
        &self.header
    }

    pub fn file_length(&self) -> usize {
        self.bytes.len()
    }

    /// Decodes record `id`, if the file is long enough to contain it.
    pub fn record(&self, id: i32) -> Option<RecordLayout> {
        let id = u32::try_from(id).ok()?;
        let start = usize::try_from(self.addressing.record_offset(id)).ok()?;
        let bytes = self.bytes.get(start..start.checked_add(RECORD_SIZE)?)?;
        RecordLayout::from_bytes(bytes).ok()
    }

    /// Records `[0, header.records_allocated)`, as persisted by the last flush.
    pub fn records(&self) -> impl Iterator<Item = (i32, RecordLayout)> + '_ {
        (0..self.header.records_allocated.max(0))
            .map_while(move |id| self.record(id).map(|record| (id, record)))
    }
}
