//! # fsrecords - Lock-Free Records Storage over Memory-Mapped Files
//!
//! fsrecords stores fixed-size records of file-system metadata (parent, name,
//! flags, attribute and content refs, timestamp, length) in a single file that
//! grows page by page and is accessed through memory mappings. It prioritizes:
//!
//! - **Lock-free field access**: every field is one aligned atomic word in a
//!   mapped page, read and written in place
//! - **Zero-copy**: no buffers, no serialization on the hot path
//! - **Cheap crash detection**: every write stamps the record with a global
//!   modification counter that is persisted on flush
//!
//! It does not interpret field values and offers no multi-field atomicity.
//!
//! ## Quick Start
//!
//! ```ignore
//! use fsrecords::{RecordsStorage, NULL_ID};
//!
//! let storage = RecordsStorage::open("./records.dat")?;
//!
//! let id = storage.update_record(NULL_ID, |record| {
//!     record.set_parent_id(root_id);
//!     record.set_name_id(name_id);
//!     record.set_length(4096);
//!     true
//! })?;
//!
//! assert_eq!(storage.record_length(id)?, 4096);
//!
//! storage.close()?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   RecordsStorage (engine)            │  counters, force/close, scans
//! ├─────────────────────────────────────┤
//! │   RecordAccessor / RecordUpdater     │  atomic field get/set
//! ├──────────────────┬──────────────────┤
//! │ RecordAddressing │  StorageHeader   │  id -> offset, header layout
//! ├──────────────────┴──────────────────┤
//! │   MappedFileStorage / Page           │  lazily mapped pages
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`engine`]: `RecordsStorage`, its builder, header operations, lifecycle and scans
//! - [`records`]: record layout and in-place accessors
//! - [`storage`]: page manager, address translation, header layout, offline inspection
//! - [`config`]: layout and geometry constants
//! - [`error`]: `StorageError`, the typed cause behind failed operations

pub mod config;
pub mod engine;
pub mod error;
pub mod records;
pub mod storage;

pub use config::{DEFAULT_PAGE_SIZE, NULL_ID, RECORD_SIZE};
pub use engine::{
    HeaderAccessor, HeaderUpdater, RecordsStorage, RecordsStorageBuilder, ScannedRecord,
};
pub use error::StorageError;
pub use records::{RecordAccessor, RecordLayout, RecordUpdater};
pub use storage::StorageImage;
