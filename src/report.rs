//! Progress and diagnostics sink shared by the loaders and the exporter.
//!
//! The engine never logs directly; it emits [`ReportEvent`]s into a
//! [`Reporter`]. [`TracingReporter`] forwards them to `tracing`, and
//! [`CollectingReporter`] keeps them for inspection.

use std::fmt;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::batch::BatchProgress;
use crate::export::Encoding;
use crate::types::LabelKind;

/// Stage of a run an event comes from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Phase {
    /// Vertex loading.
    Vertices,
    /// Edge loading.
    Edges,
    /// Export.
    Export,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Vertices => "vertices",
            Phase::Edges => "edges",
            Phase::Export => "export",
        })
    }
}

/// Something worth telling the operator about.
#[derive(Clone, Debug, PartialEq)]
pub enum ReportEvent {
    /// A batch reached the store.
    BatchCommitted {
        /// Loader that committed it.
        phase: Phase,
        /// Progress after the commit.
        progress: BatchProgress,
    },
    /// A record was rejected and left out of its batch.
    RecordSkipped {
        /// Loader that rejected it.
        phase: Phase,
        /// Label being loaded.
        label: String,
        /// One-based record number within its source.
        record: usize,
        /// Why it was rejected.
        reason: String,
    },
    /// A batch round-trip failed; the batch is still pending.
    BatchFailed {
        /// Loader that submitted it.
        phase: Phase,
        /// Label being loaded.
        label: String,
        /// Zero-based batch index.
        batch: usize,
        /// Store error text.
        error: String,
    },
    /// The exporter chose an encoding for a label.
    LabelRouted {
        /// Exported label.
        label: String,
        /// Whether it holds vertices or edges.
        kind: LabelKind,
        /// Encoding picked for the whole label.
        encoding: Encoding,
        /// Entities written.
        records: usize,
    },
    /// A whole file was abandoned.
    FileFailed {
        /// Offending file.
        path: PathBuf,
        /// Error text.
        reason: String,
    },
}

/// Receives engine events.
pub trait Reporter {
    /// Handles one event.
    fn report(&mut self, event: ReportEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&mut self, event: ReportEvent) {
        match event {
            ReportEvent::BatchCommitted { phase, progress } => match phase {
                Phase::Vertices => info!(
                    label = %progress.label,
                    batch = progress.batch,
                    records = progress.records,
                    committed = progress.committed,
                    "import.vertices.batch_committed"
                ),
                Phase::Edges => info!(
                    label = %progress.label,
                    batch = progress.batch,
                    records = progress.records,
                    committed = progress.committed,
                    "import.edges.batch_committed"
                ),
                Phase::Export => info!(
                    label = %progress.label,
                    batch = progress.batch,
                    records = progress.records,
                    "export.label.chunk_written"
                ),
            },
            ReportEvent::RecordSkipped {
                phase,
                label,
                record,
                reason,
            } => warn!(%phase, %label, record, %reason, "import.record.skipped"),
            ReportEvent::BatchFailed {
                phase,
                label,
                batch,
                error,
            } => warn!(%phase, %label, batch, %error, "import.batch.failed"),
            ReportEvent::LabelRouted {
                label,
                kind,
                encoding,
                records,
            } => info!(%label, %kind, %encoding, records, "export.label.routed"),
            ReportEvent::FileFailed { path, reason } => {
                warn!(path = %path.display(), %reason, "transfer.file.failed")
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default, Clone)]
pub struct CollectingReporter {
    /// Events in arrival order.
    pub events: Vec<ReportEvent>,
}

impl CollectingReporter {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Skipped records as `(record, reason)` pairs.
    pub fn skipped(&self) -> Vec<(usize, &str)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ReportEvent::RecordSkipped { record, reason, .. } => {
                    Some((*record, reason.as_str()))
                }
                _ => None,
            })
            .collect()
    }

    /// Progress snapshots of committed batches, in order.
    pub fn committed(&self) -> Vec<&BatchProgress> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ReportEvent::BatchCommitted { progress, .. } => Some(progress),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for CollectingReporter {
    fn report(&mut self, event: ReportEvent) {
        self.events.push(event);
    }
}

impl<R: Reporter + ?Sized> Reporter for &mut R {
    fn report(&mut self, event: ReportEvent) {
        (**self).report(event);
    }
}
