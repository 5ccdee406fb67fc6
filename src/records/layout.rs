//! # Record Binary Layout
//!
//! Every record is a fixed 40-byte structure of native-endian integers:
//!
//! ```text
//! Offset  Size  Field                Description
//! ------  ----  -------------------  ------------------------------------
//! 0       4     parent_id            Id of the parent record
//! 4       4     name_id              Interned name id
//! 8       4     flags                Attribute bitset
//! 12      4     attribute_record_id  Attribute record id, 0 if none
//! 16      4     content_record_id    Content record id, 0 if none
//! 20      4     mod_count            Global mod count at the last write
//! 24      8     timestamp            Last-modified time
//! 32      8     length               Entity size
//! ```
//!
//! The two 64-bit fields are last so they land on 8-byte boundaries: records
//! start at 8-byte aligned offsets (the header and record sizes are multiples
//! of 8), so every field can be accessed with a single aligned atomic.
//!
//! The storage never interprets field values.

use std::mem::offset_of;

use eyre::{ensure, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::config::RECORD_SIZE;

/// Plain copy of a record's fields.
///
/// Live records are accessed in place through
/// [`RecordAccessor`](crate::records::RecordAccessor); this type is what a
/// snapshot or an offline read of the file produces.
#[repr(C)]
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
pub struct RecordLayout {
    pub parent_id: i32,
    pub name_id: i32,
    pub flags: i32,
    pub attribute_record_id: i32,
    pub content_record_id: i32,
    pub mod_count: i32,
    pub timestamp: i64,
    pub length: i64,
}

const _: () = assert!(std::mem::size_of::<RecordLayout>() == RECORD_SIZE);

pub const PARENT_REF_OFFSET: usize = offset_of!(RecordLayout, parent_id);
pub const NAME_REF_OFFSET: usize = offset_of!(RecordLayout, name_id);
pub const FLAGS_OFFSET: usize = offset_of!(RecordLayout, flags);
pub const ATTR_REF_OFFSET: usize = offset_of!(RecordLayout, attribute_record_id);
pub const CONTENT_REF_OFFSET: usize = offset_of!(RecordLayout, content_record_id);
pub const MOD_COUNT_OFFSET: usize = offset_of!(RecordLayout, mod_count);
pub const TIMESTAMP_OFFSET: usize = offset_of!(RecordLayout, timestamp);
pub const LENGTH_OFFSET: usize = offset_of!(RecordLayout, length);

const _: () = assert!(TIMESTAMP_OFFSET % 8 == 0 && LENGTH_OFFSET % 8 == 0);
const _: () = assert!(RECORD_SIZE % 4 == 0, "records are zeroed word by word");

impl RecordLayout {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure!(
            bytes.len() >= RECORD_SIZE,
            "buffer too small for RecordLayout: {} < {}",
            bytes.len(),
            RECORD_SIZE
        );

        Self::read_from_bytes(&bytes[..RECORD_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse RecordLayout: {:?}", e))
    }

    pub fn is_zeroed(&self) -> bool {
        *self == Self::default()
    }
}
