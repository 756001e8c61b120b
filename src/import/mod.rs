//! Two-pass import: vertices first, then edges resolved through the
//! identifier tables the vertex pass built.
//!
//! An [`ImportRun`] owns the run-scoped state (identifier tables and
//! sequence counters) and enforces the phase order
//! `Init -> LoadVertices -> LoadEdges -> Done`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::batch::DEFAULT_BATCH_SIZE;
use crate::report::{Phase, ReportEvent, Reporter};
use crate::storage::{GraphStore, LabelInfo};
use crate::types::{ErrorScope, LabelKind, Result, SequenceAllocator, TransferError};
use crate::value::CellPolicy;

mod edge;
mod id_table;
pub mod partition;
pub mod source;
mod vertex;

#[cfg(test)]
pub(crate) mod testing;

pub use edge::EdgeLoader;
pub use id_table::{IdTable, LabelIds};
pub use partition::{split, RecordSlice, SchemaPartition};
pub use source::{EdgeRecord, FileFormat, VertexRecord};
pub use vertex::VertexLoader;

/// Who picks internal ids for new vertices.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdMode {
    /// The store assigns ids and returns them in submission order.
    #[default]
    StoreAssigned,
    /// The loader allocates ids from run-local counters seeded from the
    /// store. Retrying a failed batch reuses the same ids.
    Preallocated,
}

/// Cooperative cancellation flag, checked before every store round-trip.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates an unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; clones observe it too.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options for an import run.
#[derive(Clone, Debug)]
pub struct ImportOptions {
    /// Records per store round-trip.
    pub batch_size: usize,
    /// Who assigns vertex ids.
    pub id_mode: IdMode,
    /// Keep the external id as the vertex's `id` property.
    pub retain_external_id: bool,
    /// Create missing labels instead of failing.
    pub create_labels: bool,
    /// Rebuild missing endpoint tables by scanning the store.
    pub resolve_from_store: bool,
    /// How CSV cells become values.
    pub cell_policy: CellPolicy,
    /// Cancellation flag.
    pub cancel: CancelToken,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            id_mode: IdMode::StoreAssigned,
            retain_external_id: true,
            create_labels: true,
            resolve_from_store: false,
            cell_policy: CellPolicy::Scalars,
            cancel: CancelToken::new(),
        }
    }
}

/// Outcome of loading one label from one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    /// Label loaded.
    pub label: String,
    /// Records committed.
    pub committed: usize,
    /// Records rejected.
    pub skipped: usize,
    /// Batches committed.
    pub batches: usize,
}

/// Phase of an [`ImportRun`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RunState {
    /// Nothing loaded yet.
    Init,
    /// Vertex labels are being loaded.
    LoadVertices,
    /// Edge labels are being loaded; no further vertex loads.
    LoadEdges,
    /// Finished.
    Done,
}

impl RunState {
    fn as_str(self) -> &'static str {
        match self {
            RunState::Init => "init",
            RunState::LoadVertices => "load-vertices",
            RunState::LoadEdges => "load-edges",
            RunState::Done => "done",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one import run.
#[derive(Debug)]
pub struct ImportRun {
    options: ImportOptions,
    state: RunState,
    ids: IdTable,
    seqs: SequenceAllocator,
}

impl ImportRun {
    /// Starts a run.
    pub fn new(options: ImportOptions) -> Self {
        Self {
            options,
            state: RunState::Init,
            ids: IdTable::new(),
            seqs: SequenceAllocator::new(),
        }
    }

    /// Current phase.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Options the run was started with.
    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Identifier tables built so far.
    pub fn id_table(&self) -> &IdTable {
        &self.ids
    }

    /// Loads one vertex source into `label` and records its ids.
    ///
    /// Ids of batches committed before a failure are kept in the table, so
    /// edges touching them still resolve.
    pub fn load_vertices<S, I>(
        &mut self,
        store: &mut S,
        reporter: &mut dyn Reporter,
        label: &str,
        records: I,
    ) -> Result<LoadStats>
    where
        S: GraphStore + ?Sized,
        I: IntoIterator<Item = Result<VertexRecord>>,
    {
        self.transition("load vertices", RunState::LoadVertices)?;
        let info = ensure_label(store, &self.options, label, LabelKind::Vertex)?;
        let mut loader = VertexLoader::new(store, reporter, &self.options, &mut self.seqs, info)?
            .with_known_ids(self.ids.take(label));
        let outcome = loader.load(records);
        let ids = loader.into_ids();
        self.ids.merge(label, ids);
        let stats = outcome?;
        info!(
            label,
            committed = stats.committed,
            skipped = stats.skipped,
            batches = stats.batches,
            "import.vertices.loaded"
        );
        Ok(stats)
    }

    /// Moves the run into the edge phase; later vertex loads are refused.
    pub fn begin_edges(&mut self) -> Result<()> {
        self.transition("load edges", RunState::LoadEdges)
    }

    /// Loads one edge source into `label`.
    pub fn load_edges<S, I>(
        &mut self,
        store: &mut S,
        reporter: &mut dyn Reporter,
        label: &str,
        records: I,
    ) -> Result<LoadStats>
    where
        S: GraphStore + ?Sized,
        I: IntoIterator<Item = Result<EdgeRecord>>,
    {
        self.begin_edges()?;
        let info = ensure_label(store, &self.options, label, LabelKind::Edge)?;
        let mut loader = EdgeLoader::new(store, reporter, &self.options, &mut self.ids, info);
        let stats = loader.load(records)?;
        info!(
            label,
            committed = stats.committed,
            skipped = stats.skipped,
            batches = stats.batches,
            "import.edges.loaded"
        );
        Ok(stats)
    }

    /// Ends the run and hands back its identifier tables.
    pub fn finish(&mut self) -> Result<IdTable> {
        self.transition("finish", RunState::Done)?;
        Ok(std::mem::take(&mut self.ids))
    }

    fn transition(&mut self, action: &'static str, next: RunState) -> Result<()> {
        let allowed = match next {
            RunState::LoadVertices => matches!(self.state, RunState::Init | RunState::LoadVertices),
            RunState::LoadEdges => self.state != RunState::Done,
            RunState::Done => self.state != RunState::Done,
            RunState::Init => false,
        };
        if !allowed {
            return Err(TransferError::InvalidState {
                action,
                state: self.state.as_str(),
            });
        }
        self.state = next;
        Ok(())
    }
}

fn ensure_label<S: GraphStore + ?Sized>(
    store: &mut S,
    options: &ImportOptions,
    label: &str,
    kind: LabelKind,
) -> Result<LabelInfo> {
    if options.create_labels {
        return Ok(store.create_label(label, kind)?);
    }
    match store.label(label)? {
        Some(info) if info.kind == kind => Ok(info),
        Some(info) => Err(crate::storage::StoreError::KindMismatch {
            label: info.name,
            expected: kind,
            found: info.kind,
        }
        .into()),
        None => Err(TransferError::UnknownLabel(label.to_string())),
    }
}

/// Feeds per-record problems to the reporter and stops on anything wider.
pub(crate) fn absorb_record_error(
    reporter: &mut dyn Reporter,
    phase: Phase,
    label: &str,
    err: TransferError,
    fallback_position: usize,
) -> Result<()> {
    if err.scope() != ErrorScope::Record {
        return Err(err);
    }
    let record = match &err {
        TransferError::Record { record, .. } => *record,
        _ => fallback_position,
    };
    let reason = match err {
        TransferError::Record { reason, .. } => reason,
        other => other.to_string(),
    };
    reporter.report(ReportEvent::RecordSkipped {
        phase,
        label: label.to_string(),
        record,
        reason,
    });
    Ok(())
}
