#![forbid(unsafe_code)]

//! Label-partitioned graph stores consumed by the transfer engine.
//!
//! [`GraphStore`] is the only surface the loaders and the exporter see.
//! Every write call is one round-trip: it either applies the whole batch or
//! leaves the store unchanged.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::types::{GraphId, LabelId, LabelKind};
use crate::value::{CodecError, PropertyMap};

mod memory;
mod options;
mod sqlite;

pub use memory::MemoryStore;
pub use options::{StoreOptions, Synchronous};
pub use sqlite::SqliteStore;

/// Catalog entry for one label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelInfo {
    /// Numeric id packed into every [`GraphId`] of the label.
    pub id: LabelId,
    /// Label name.
    pub name: String,
    /// Whether the label holds vertices or edges.
    pub kind: LabelKind,
}

/// A stored vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexRow {
    /// Internal id.
    pub id: GraphId,
    /// Vertex properties.
    pub properties: PropertyMap,
}

/// A stored edge.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRow {
    /// Internal id.
    pub id: GraphId,
    /// Start vertex.
    pub start: GraphId,
    /// End vertex.
    pub end: GraphId,
    /// Edge properties.
    pub properties: PropertyMap,
}

/// Edge submitted for insertion.
#[derive(Debug, Clone, Copy)]
pub struct NewEdge<'a> {
    /// Start vertex.
    pub start: GraphId,
    /// End vertex.
    pub end: GraphId,
    /// Edge properties.
    pub properties: &'a PropertyMap,
}

/// Errors raised by store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No label with that name.
    #[error("unknown label '{0}'")]
    UnknownLabel(String),
    /// No label with that numeric id.
    #[error("unknown label id {0}")]
    UnknownLabelId(LabelId),
    /// The label exists with the other kind.
    #[error("label '{label}' is a {found} label, expected {expected}")]
    KindMismatch {
        /// Label name.
        label: String,
        /// Kind the caller asked for.
        expected: LabelKind,
        /// Kind in the catalog.
        found: LabelKind,
    },
    /// Label names must be non-empty and usable as file stems.
    #[error("invalid label name '{0}'")]
    InvalidLabelName(String),
    /// All label ids are taken.
    #[error("label id space exhausted")]
    LabelsExhausted,
    /// A preallocated id carries another label's id.
    #[error("id {id} does not belong to label '{label}'")]
    ForeignId {
        /// Offending id.
        id: GraphId,
        /// Label being written.
        label: String,
    },
    /// The id is already taken.
    #[error("id {0} already exists")]
    DuplicateId(GraphId),
    /// An edge endpoint does not exist.
    #[error("endpoint vertex {0} does not exist")]
    MissingVertex(GraphId),
    /// The label's sequence space is exhausted.
    #[error("label '{0}' has no sequence numbers left")]
    SequenceExhausted(String),
    /// The store returned a different number of ids than records submitted.
    #[error("store returned {actual} ids for {expected} records")]
    BatchLengthMismatch {
        /// Records submitted.
        expected: usize,
        /// Ids returned.
        actual: usize,
    },
    /// Persisted data failed to decode.
    #[error("corrupt store data: {0}")]
    Corrupt(String),
    /// Database file not found at the specified path.
    #[error("database not found: {0}")]
    MissingDatabase(PathBuf),
    /// Stored properties failed to encode or decode.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// SQLite error.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub(crate) fn missing_database(path: impl AsRef<Path>) -> Self {
        StoreError::MissingDatabase(path.as_ref().to_path_buf())
    }
}

/// A label-partitioned property-graph store.
pub trait GraphStore {
    /// Creates `name` with `kind`, or returns the existing label when it
    /// already has that kind.
    fn create_label(&mut self, name: &str, kind: LabelKind) -> StoreResult<LabelInfo>;

    /// All labels ordered by id.
    fn labels(&self) -> StoreResult<Vec<LabelInfo>>;

    /// Looks a label up by name.
    fn label(&self, name: &str) -> StoreResult<Option<LabelInfo>>;

    /// Looks a label up by numeric id.
    fn label_by_id(&self, id: LabelId) -> StoreResult<Option<LabelInfo>>;

    /// Highest sequence ever allocated in the label, 0 when none.
    fn max_sequence(&self, label: &str) -> StoreResult<u64>;

    /// Inserts vertices, letting the store assign ids. The returned ids are
    /// in submission order.
    fn insert_vertices(&mut self, label: &str, batch: &[&PropertyMap])
        -> StoreResult<Vec<GraphId>>;

    /// Inserts vertices under ids allocated by the caller.
    fn insert_vertices_with_ids(
        &mut self,
        label: &str,
        batch: &[(GraphId, &PropertyMap)],
    ) -> StoreResult<()>;

    /// Inserts edges between existing vertices; returns the number written.
    fn insert_edges(&mut self, label: &str, batch: &[NewEdge<'_>]) -> StoreResult<usize>;

    /// Every vertex of a label, ordered by id.
    fn scan_vertices(&self, label: &str) -> StoreResult<Vec<VertexRow>>;

    /// Every edge of a label, ordered by id.
    fn scan_edges(&self, label: &str) -> StoreResult<Vec<EdgeRow>>;

    /// Numeric id of an existing label.
    fn label_numeric_id(&self, label: &str) -> StoreResult<LabelId> {
        self.label(label)?
            .map(|info| info.id)
            .ok_or_else(|| StoreError::UnknownLabel(label.to_string()))
    }
}

pub(crate) fn validate_label_name(name: &str) -> StoreResult<()> {
    let bad = name.trim().is_empty()
        || name != name.trim()
        || name
            .chars()
            .any(|c| c.is_control() || matches!(c, '/' | '\\'));
    if bad {
        return Err(StoreError::InvalidLabelName(name.to_string()));
    }
    Ok(())
}

pub(crate) fn expect_kind(info: &LabelInfo, expected: LabelKind) -> StoreResult<()> {
    if info.kind != expected {
        return Err(StoreError::KindMismatch {
            label: info.name.clone(),
            expected,
            found: info.kind,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_names_must_be_file_safe() {
        assert!(validate_label_name("Person").is_ok());
        assert!(validate_label_name("KNOWS_2").is_ok());
        for bad in ["", " ", " Person", "a/b", "a\\b", "tab\there"] {
            assert!(
                matches!(validate_label_name(bad), Err(StoreError::InvalidLabelName(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
