#![forbid(unsafe_code)]

//! Directory-level drivers behind the `graphport` binary.
//!
//! These wire the import and export engines to an on-disk store and a
//! directory of interchange files.

/// Directory import and export against a SQLite store.
///
/// Handles discovering interchange files, ordering vertex files before edge
/// files, and collecting per-file outcomes.
pub mod import_export;
