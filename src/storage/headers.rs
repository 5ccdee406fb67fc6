//! # Storage Header Layout
//!
//! The header occupies the first [`HEADER_SIZE`] bytes of page 0. Records on
//! page 0 start right after it.
//!
//! ```text
//! Offset  Size  Field              Description
//! ------  ----  -----------------  ---------------------------------------
//! 0       4     version            Format version, set by the owning layer
//! 4       4     records_allocated  Allocated records count (written by force)
//! 8       4     global_mod_count   Global modification counter (written by force)
//! 12      4     connection_status  Opaque status code, set by the owning layer
//! 16      8     timestamp          Millis of the last version change
//! 24      40    reserved           Zero
//! ```
//!
//! The file is page-aligned, so its size says nothing about how many records
//! exist; `records_allocated` carries that instead.
//!
//! ## Byte Order
//!
//! Fields are read and written in place with native-endian atomics. The file
//! is not portable between machines of different endianness.
//!
//! ## Zerocopy
//!
//! [`StorageHeader`] is the single source of truth for the layout: the field
//! offsets below are derived from it with `offset_of!`, and offline tooling
//! decodes it from plain bytes with `FromBytes`.

use std::mem::offset_of;

use eyre::{ensure, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::config::HEADER_SIZE;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct StorageHeader {
    pub version: i32,
    pub records_allocated: i32,
    pub global_mod_count: i32,
    pub connection_status: i32,
    pub timestamp: i64,
    reserved: [u8; 40],
}

const _: () = assert!(std::mem::size_of::<StorageHeader>() == HEADER_SIZE);

pub const HEADER_VERSION_OFFSET: usize = offset_of!(StorageHeader, version);
pub const HEADER_RECORDS_ALLOCATED_OFFSET: usize = offset_of!(StorageHeader, records_allocated);
pub const HEADER_GLOBAL_MOD_COUNT_OFFSET: usize = offset_of!(StorageHeader, global_mod_count);
pub const HEADER_CONNECTION_STATUS_OFFSET: usize = offset_of!(StorageHeader, connection_status);
pub const HEADER_TIMESTAMP_OFFSET: usize = offset_of!(StorageHeader, timestamp);

const _: () = assert!(HEADER_TIMESTAMP_OFFSET % 8 == 0);

impl StorageHeader {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure!(
            bytes.len() >= HEADER_SIZE,
            "buffer too small for StorageHeader: {} < {}",
            bytes.len(),
            HEADER_SIZE
        );

        Self::read_from_bytes(&bytes[..HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse StorageHeader: {:?}", e))
    }
}

/// Checks that a field of `width` bytes at `offset` lies inside the header and
/// is naturally aligned.
pub(crate) fn check_header_offset(offset: usize, width: usize) -> Result<()> {
    ensure!(
        offset.checked_add(width).is_some_and(|end| end <= HEADER_SIZE),
        crate::error::StorageError::HeaderOffsetOutOfRange {
            offset,
            header_size: HEADER_SIZE,
        }
    );
    ensure!(
        offset % width == 0,
        "header field offset {} is not {}-byte aligned",
        offset,
        width
    );
    Ok(())
}
