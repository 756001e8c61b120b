//! Bulk transfer of property graphs between CSV/JSON interchange files and a
//! label-partitioned graph store.
//!
//! Import runs in two passes: every vertex file is loaded first, building an
//! external-id to internal-id table per label, then edge files are loaded and
//! their endpoints resolved through that table. Export walks every label in
//! the store and writes it as CSV unless some property is nested, in which
//! case the whole label goes to JSON.

#![warn(missing_docs)]

pub mod batch;
pub mod cli;
pub mod export;
pub mod import;
pub mod report;
pub mod storage;
pub mod types;
pub mod value;
