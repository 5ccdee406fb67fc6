//! # fsrecords Configuration Module
//!
//! This module centralizes all configuration constants for the storage. The
//! record and header layouts, the page geometry and the file-growth policy
//! depend on each other, so they live together and their relationships are
//! enforced through compile-time assertions.
//!
//! Runtime options (page size) are chosen through
//! [`RecordsStorageBuilder`](crate::engine::RecordsStorageBuilder) and
//! validated against the bounds defined here.
//!
//! ## Module Organization
//!
//! - [`constants`]: All numeric configuration values with dependency documentation

pub mod constants;
pub use constants::*;
