//! # Fixed-Layout Records
//!
//! A record is a 40-byte structure of fixed-width integer fields that lives
//! directly in a mapped page of the storage file. This module defines the
//! layout and the borrowed views used to read and write it in place.
//!
//! ## Module Structure
//!
//! - `layout`: `RecordLayout` and the field offsets derived from it
//! - `accessor`: `RecordAccessor` (atomic reads) and `RecordUpdater` (atomic writes)
//!
//! ## Usage
//!
//! ```ignore
//! let id = storage.update_record(NULL_ID, |record| {
//!     record.set_name_id(name_id);
//!     record.set_parent_id(parent_id);
//!     record.set_flags(flags);
//!     true
//! })?;
//!
//! let length = storage.read_record(id, |record| record.length())?;
//! ```

pub mod accessor;
pub mod layout;

pub use accessor::{RecordAccessor, RecordUpdater};
pub use layout::RecordLayout;
