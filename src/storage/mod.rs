//! # Storage Module
//!
//! The low-level layer of fsrecords: a file cut into power-of-two pages,
//! each lazily memory-mapped, plus the pure arithmetic that places the header
//! and records inside it.
//!
//! ## File Layout
//!
//! ```text
//! page 0                                     page 1
//! ┌────────┬────┬────┬─────┬────────┬──────┐ ┌────┬────┬─────┬──────┐
//! │ header │ r0 │ r1 │ ... │ r(k-1) │ tail │ │ rk │ .. │ ... │ tail │ ...
//! └────────┴────┴────┴─────┴────────┴──────┘ └────┴────┴─────┴──────┘
//!   64 B     40 B each                          40 B each
//! ```
//!
//! Records never straddle a page: the tail of a page that cannot hold a whole
//! record stays zero. The file length is always a multiple of the page size,
//! so the number of records comes from the header, not from the file size.
//!
//! ## Zero-Copy, Lock-Free Access
//!
//! Nothing is read into buffers. Every header and record field is an aligned
//! atomic word inside a mapping, read and written in place. Pages are mapped
//! once and never remapped, so references into them stay valid while the
//! storage is alive and concurrent access needs no locks. The only lock in
//! this layer serializes page creation.
//!
//! ## Module Organization
//!
//! - `mmap`: page manager (`MappedFileStorage`) and mapped pages (`Page`)
//! - `addressing`: record id to file offset translation (`RecordAddressing`)
//! - `headers`: header layout (`StorageHeader`) and field offsets
//! - `inspect`: offline decoding of a storage file (`StorageImage`)
//!
//! ## Platform Support
//!
//! Works anywhere `memmap2` does. `madvise` hints are issued on unix only.
//! Data is stored in native byte order.

pub mod addressing;
pub mod headers;
pub mod inspect;
pub mod mmap;

pub use addressing::RecordAddressing;
pub use headers::StorageHeader;
pub use inspect::StorageImage;
pub use mmap::{MappedFileStorage, Page};
