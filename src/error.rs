//! Typed failure causes.
//!
//! Every public operation returns `eyre::Result`. When a failure belongs to
//! one of the categories below, the report's root cause is a [`StorageError`]
//! and callers can classify it with `report.downcast_ref::<StorageError>()`.
//! Plain I/O failures surface as `std::io::Error` wrapped with context.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Record id outside `[0, allocated)`.
    #[error("recordId(={id}) is outside of allocated ids range [0, {allocated})")]
    RecordIdOutOfRange { id: i32, allocated: i32 },

    /// Header field offset outside `[0, header_size)`.
    #[error("header field offset(={offset}) is outside of header [0, {header_size})")]
    HeaderOffsetOutOfRange { offset: usize, header_size: usize },

    /// The record id space (and hence the file) cannot grow any further.
    #[error("storage capacity exceeded: {requested} > max {max}")]
    CapacityExceeded { requested: u64, max: u64 },

    /// The storage was closed.
    #[error("storage is closed")]
    Closed,

    /// Page size rejected at open time.
    #[error("page size {0} must be a power of two within [{min}, {max}]", min = crate::config::MIN_PAGE_SIZE, max = crate::config::MAX_PAGE_SIZE)]
    InvalidPageSize(usize),

    /// A field value rejected before anything was written.
    #[error("invalid value {value} for field {field}")]
    InvalidFieldValue { field: &'static str, value: i64 },

    /// The backing file cannot be a valid storage.
    #[error("storage file '{path}' is corrupted: {reason}")]
    Corrupted { path: PathBuf, reason: String },
}

impl StorageError {
    /// Returns the [`StorageError`] behind a report, if there is one.
    pub fn of(report: &eyre::Report) -> Option<&StorageError> {
        report.downcast_ref::<StorageError>()
    }
}
