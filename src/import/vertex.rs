use std::collections::HashSet;

use crate::batch::{BatchProgress, Batcher};
use crate::report::{Phase, ReportEvent, Reporter};
use crate::storage::{GraphStore, LabelInfo, StoreError, StoreResult};
use crate::types::{ErrorScope, GraphId, Result, SequenceAllocator, TransferError};
use crate::value::{encode_properties, PropertyMap};

use super::source::{VertexRecord, ID_FIELD};
use super::{absorb_record_error, IdMode, ImportOptions, LabelIds, LoadStats};

struct PendingVertex {
    key: String,
    id: Option<GraphId>,
    properties: PropertyMap,
}

/// Loads one vertex label in bounded batches and collects the
/// external-id to internal-id table.
///
/// Records are validated before they join a batch: a record without an id,
/// with an id already seen in this label, or with an unrenderable value is
/// reported and skipped. A batch whose round-trip fails stays pending, and
/// calling [`VertexLoader::flush`] again retries exactly that batch. With
/// [`IdMode::StoreAssigned`] a retry after a lost acknowledgement can insert
/// the batch twice; [`IdMode::Preallocated`] reuses the same ids instead.
pub struct VertexLoader<'a, S: GraphStore + ?Sized> {
    store: &'a mut S,
    reporter: &'a mut dyn Reporter,
    options: &'a ImportOptions,
    seqs: &'a mut SequenceAllocator,
    label: LabelInfo,
    batch: Batcher<PendingVertex>,
    ids: LabelIds,
    queued: HashSet<String>,
    skipped: usize,
}

impl<'a, S: GraphStore + ?Sized> VertexLoader<'a, S> {
    /// Prepares a loader for an existing vertex label. In preallocated mode
    /// the label's counter is seeded from the store on first use.
    pub fn new(
        store: &'a mut S,
        reporter: &'a mut dyn Reporter,
        options: &'a ImportOptions,
        seqs: &'a mut SequenceAllocator,
        label: LabelInfo,
    ) -> Result<Self> {
        if options.id_mode == IdMode::Preallocated && !seqs.is_seeded(label.id) {
            seqs.seed(label.id, store.max_sequence(&label.name)?);
        }
        Ok(Self {
            store,
            reporter,
            options,
            seqs,
            label,
            batch: Batcher::new(options.batch_size),
            ids: LabelIds::new(),
            queued: HashSet::new(),
            skipped: 0,
        })
    }

    /// Starts from ids an earlier source already loaded into this label, so
    /// a repeated external id is rejected instead of inserted twice.
    pub fn with_known_ids(mut self, ids: LabelIds) -> Self {
        self.ids = ids;
        self
    }

    /// Label being loaded.
    pub fn label(&self) -> &LabelInfo {
        &self.label
    }

    /// Ids of committed records, including any known ids.
    pub fn ids(&self) -> &LabelIds {
        &self.ids
    }

    /// Consumes the loader, returning the ids of committed records.
    pub fn into_ids(self) -> LabelIds {
        self.ids
    }

    /// Counters so far.
    pub fn stats(&self) -> LoadStats {
        LoadStats {
            label: self.label.name.clone(),
            committed: self.batch.committed(),
            skipped: self.skipped,
            batches: self.batch.index(),
        }
    }

    /// Queues one record, submitting the batch once it is full.
    pub fn push(&mut self, record: VertexRecord) -> Result<Option<BatchProgress>> {
        let position = record.position;
        match self.prepare(record) {
            Ok(pending) => {
                self.queued.insert(pending.key.clone());
                if self.batch.push(pending) {
                    return self.flush();
                }
                Ok(None)
            }
            Err(err) => {
                self.skip(err, position)?;
                Ok(None)
            }
        }
    }

    /// Submits the pending batch, if any.
    pub fn flush(&mut self) -> Result<Option<BatchProgress>> {
        if self.batch.is_empty() {
            return Ok(None);
        }
        let index = self.batch.index();
        if self.options.cancel.is_cancelled() {
            return Err(TransferError::Cancelled {
                label: self.label.name.clone(),
                batch: index,
            });
        }
        match self.round_trip() {
            Ok(ids) => {
                let committed = self.batch.commit();
                let records = committed.len();
                for (pending, id) in committed.into_iter().zip(ids) {
                    self.queued.remove(&pending.key);
                    self.ids.insert(pending.key, id);
                }
                let progress = BatchProgress {
                    label: self.label.name.clone(),
                    batch: index,
                    records,
                    committed: self.batch.committed(),
                    skipped: self.skipped,
                };
                self.reporter.report(ReportEvent::BatchCommitted {
                    phase: Phase::Vertices,
                    progress: progress.clone(),
                });
                Ok(Some(progress))
            }
            Err(source) => {
                self.reporter.report(ReportEvent::BatchFailed {
                    phase: Phase::Vertices,
                    label: self.label.name.clone(),
                    batch: index,
                    error: source.to_string(),
                });
                Err(TransferError::Store {
                    label: self.label.name.clone(),
                    batch: index,
                    source,
                })
            }
        }
    }

    /// Loads every record, then flushes the tail batch.
    pub fn load<I>(&mut self, records: I) -> Result<LoadStats>
    where
        I: IntoIterator<Item = Result<VertexRecord>>,
    {
        for item in records {
            match item {
                Ok(record) => {
                    self.push(record)?;
                }
                Err(err) => self.skip(err, 0)?,
            }
        }
        self.flush()?;
        Ok(self.stats())
    }

    fn prepare(&mut self, record: VertexRecord) -> Result<PendingVertex> {
        let position = record.position;
        let mut properties = record.fields;
        let key = properties
            .get(ID_FIELD)
            .and_then(|value| value.as_key())
            .ok_or_else(|| TransferError::record(position, format!("missing or empty '{ID_FIELD}'")))?;
        if self.ids.contains_key(&key) || self.queued.contains(&key) {
            return Err(TransferError::record(
                position,
                format!("duplicate external id '{key}'"),
            ));
        }
        if !self.options.retain_external_id {
            properties.remove(ID_FIELD);
        }
        encode_properties(&properties)
            .map_err(|err| TransferError::record(position, err.to_string()))?;
        let id = match self.options.id_mode {
            IdMode::StoreAssigned => None,
            IdMode::Preallocated => Some(self.seqs.next_id(self.label.id)?),
        };
        Ok(PendingVertex {
            key,
            id,
            properties,
        })
    }

    fn round_trip(&mut self) -> StoreResult<Vec<GraphId>> {
        let pending = self.batch.pending();
        match self.options.id_mode {
            IdMode::StoreAssigned => {
                let batch: Vec<&PropertyMap> = pending.iter().map(|p| &p.properties).collect();
                let ids = self.store.insert_vertices(&self.label.name, &batch)?;
                if ids.len() != batch.len() {
                    return Err(StoreError::BatchLengthMismatch {
                        expected: batch.len(),
                        actual: ids.len(),
                    });
                }
                Ok(ids)
            }
            IdMode::Preallocated => {
                let batch: Vec<(GraphId, &PropertyMap)> = pending
                    .iter()
                    .filter_map(|p| p.id.map(|id| (id, &p.properties)))
                    .collect();
                self.store
                    .insert_vertices_with_ids(&self.label.name, &batch)?;
                Ok(batch.iter().map(|(id, _)| *id).collect())
            }
        }
    }

    fn skip(&mut self, err: TransferError, position: usize) -> Result<()> {
        if err.scope() == ErrorScope::Record {
            self.skipped += 1;
        }
        absorb_record_error(&mut *self.reporter, Phase::Vertices, &self.label.name, err, position)
    }
}
