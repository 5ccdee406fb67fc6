//! # Record Addressing
//!
//! Maps a record id to the absolute byte offset of the record in the file.
//!
//! Records are laid out back to back inside each page and never straddle a
//! page boundary. Page 0 additionally hosts the storage header, so it holds
//! fewer records than the others:
//!
//! ```text
//! page 0:  [ header | r0 | r1 | ... | r(k-1) | tail ]
//! page 1:  [ rk | r(k+1) | ...                | tail ]
//! page 2:  [ ...                              | tail ]
//! ```
//!
//! where `k = (page_size - header_size) / record_size`. The ids pushed off
//! page 0 by the header shift every later record forward, so page 1 starts
//! with id `k` instead of id `records_per_page`.
//!
//! Any drift here corrupts every record after page 0, which is why the
//! translation lives in its own pure, allocation-free type.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordAddressing {
    page_size: u64,
    header_size: u64,
    record_size: u64,
    records_per_page: u64,
    records_on_header_page: u64,
}

impl RecordAddressing {
    /// # Panics
    ///
    /// If the header plus one record does not fit in a page.
    pub const fn new(page_size: usize, header_size: usize, record_size: usize) -> Self {
        assert!(record_size > 0, "record size must be positive");
        assert!(
            header_size + record_size <= page_size,
            "page must fit the header and at least one record"
        );

        Self {
            page_size: page_size as u64,
            header_size: header_size as u64,
            record_size: record_size as u64,
            records_per_page: (page_size / record_size) as u64,
            records_on_header_page: ((page_size - header_size) / record_size) as u64,
        }
    }

    pub fn records_per_page(&self) -> u64 {
        self.records_per_page
    }

    pub fn records_on_header_page(&self) -> u64 {
        self.records_on_header_page
    }

    /// Absolute offset of `record_id`. No bounds checking.
    pub fn record_offset(&self, record_id: u32) -> u64 {
        let record_id = record_id as u64;
        if record_id < self.records_on_header_page {
            return self.header_size + record_id * self.record_size;
        }

        // as if there were no header
        let full_pages = record_id / self.records_per_page;
        let records_on_last_page = record_id % self.records_per_page;

        // the header pushes a few records off page 0, and the push may spill
        // the last page over into the next one
        let excess = self.records_per_page - self.records_on_header_page;
        let really_on_last_page = records_on_last_page + excess;

        (full_pages + really_on_last_page / self.records_per_page) * self.page_size
            + (really_on_last_page % self.records_per_page) * self.record_size
    }
}
