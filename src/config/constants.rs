//! # fsrecords Configuration Constants
//!
//! This module centralizes the numeric configuration of the storage, grouping
//! interdependent values together. Constants that depend on each other are
//! co-located and checked with compile-time assertions.
//!
//! ## Dependency Graph
//!
//! ```text
//! RECORD_SIZE (40 bytes)
//!       │
//!       ├─> MAX_RECORDS_COUNT (i32::MAX ids)
//!       │
//!       └─> MAX_STORAGE_SIZE (derived: RECORD_SIZE * MAX_RECORDS_COUNT)
//!             The page table is sized from this, so a larger record
//!             size means a larger page table.
//!
//! HEADER_SIZE (64 bytes)
//!       │
//!       └─> MIN_PAGE_SIZE (must leave room for at least one record on page 0)
//!
//! DEFAULT_PAGE_SIZE (64 MiB)
//!       │
//!       └─> must be a power of two and >= MIN_PAGE_SIZE
//!
//! FILLER_CHUNK_SIZE (64 KiB)
//!       Upper bound of a single write when the file is extended for a new page.
//! ```
//!
//! ## Critical Invariants
//!
//! 1. `RECORD_SIZE % 8 == 0`: records stay 8-byte aligned on every page, so the
//!    64-bit fields can be accessed atomically.
//! 2. `HEADER_SIZE % 8 == 0`: same reason, for records on page 0.
//! 3. `HEADER_SIZE + RECORD_SIZE <= MIN_PAGE_SIZE`: page 0 always holds a record.

// ============================================================================
// RECORD LAYOUT
// ============================================================================

/// Size of a single record in bytes.
pub const RECORD_SIZE: usize = 40;

/// Sentinel record id meaning "no record".
pub const NULL_ID: i32 = -1;

/// Upper bound (exclusive) of the number of records a storage can address.
pub const MAX_RECORDS_COUNT: i32 = i32::MAX;

/// Largest file size the record id space can address.
pub const MAX_STORAGE_SIZE: u64 = RECORD_SIZE as u64 * MAX_RECORDS_COUNT as u64;

const _: () = assert!(
    RECORD_SIZE % 8 == 0,
    "RECORD_SIZE must keep 64-bit fields 8-byte aligned"
);

// ============================================================================
// HEADER LAYOUT
// ============================================================================

/// Bytes reserved for the storage header at the start of page 0.
pub const HEADER_SIZE: usize = 64;

const _: () = assert!(
    HEADER_SIZE % 8 == 0,
    "HEADER_SIZE must keep records on page 0 8-byte aligned"
);

// ============================================================================
// PAGE GEOMETRY
// ============================================================================

/// Default size of a mapped page (64 MiB).
pub const DEFAULT_PAGE_SIZE: usize = 1 << 26;

/// Smallest page size accepted by the builder.
///
/// Mapping offsets must be multiples of the OS allocation granularity, which is
/// 64 KiB on Windows and the VM page size elsewhere.
#[cfg(windows)]
pub const MIN_PAGE_SIZE: usize = 64 * 1024;
#[cfg(not(windows))]
pub const MIN_PAGE_SIZE: usize = 4096;

/// Largest page size accepted by the builder (1 GiB).
pub const MAX_PAGE_SIZE: usize = 1 << 30;

const _: () = assert!(DEFAULT_PAGE_SIZE.is_power_of_two());
const _: () = assert!(MIN_PAGE_SIZE.is_power_of_two());
const _: () = assert!(MIN_PAGE_SIZE <= DEFAULT_PAGE_SIZE && DEFAULT_PAGE_SIZE <= MAX_PAGE_SIZE);
const _: () = assert!(
    HEADER_SIZE + RECORD_SIZE <= MIN_PAGE_SIZE,
    "page 0 must fit the header and at least one record"
);

// ============================================================================
// FILE GROWTH
// ============================================================================

/// Size of a single zero-filler write while extending the file for a new page.
pub const FILLER_CHUNK_SIZE: usize = 64 * 1024;
