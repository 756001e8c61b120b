use crate::batch::{BatchProgress, Batcher};
use crate::report::{Phase, ReportEvent, Reporter};
use crate::storage::{GraphStore, LabelInfo, NewEdge};
use crate::types::{EndpointSide, ErrorScope, GraphId, Result, TransferError};
use crate::value::{encode_properties, PropertyMap, Value};

use super::source::{EdgeRecord, ID_FIELD};
use super::{absorb_record_error, IdTable, ImportOptions, LoadStats};

struct PendingEdge {
    start: GraphId,
    end: GraphId,
    properties: PropertyMap,
}

/// Loads one edge label, resolving endpoints through the run's
/// identifier tables.
///
/// An endpoint whose external id is missing from its label's table makes
/// that record fail with [`TransferError::UnresolvedEndpoint`]; the record is
/// reported and skipped. An endpoint label with no table at all fails the
/// whole source with [`TransferError::EndpointLabelNotLoaded`], unless
/// `resolve_from_store` is set, in which case the table is rebuilt once from
/// the store.
pub struct EdgeLoader<'a, S: GraphStore + ?Sized> {
    store: &'a mut S,
    reporter: &'a mut dyn Reporter,
    options: &'a ImportOptions,
    tables: &'a mut IdTable,
    label: LabelInfo,
    batch: Batcher<PendingEdge>,
    skipped: usize,
}

impl<'a, S: GraphStore + ?Sized> EdgeLoader<'a, S> {
    /// Prepares a loader for an existing edge label.
    pub fn new(
        store: &'a mut S,
        reporter: &'a mut dyn Reporter,
        options: &'a ImportOptions,
        tables: &'a mut IdTable,
        label: LabelInfo,
    ) -> Self {
        Self {
            store,
            reporter,
            options,
            tables,
            label,
            batch: Batcher::new(options.batch_size),
            skipped: 0,
        }
    }

    /// Label being loaded.
    pub fn label(&self) -> &LabelInfo {
        &self.label
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
    pub fn push(&mut self, record: EdgeRecord) -> Result<Option<BatchProgress>> {
        let position = record.position;
        match self.prepare(record) {
            Ok(pending) => {
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
        let edges: Vec<NewEdge<'_>> = self
            .batch
            .pending()
            .iter()
            .map(|p| NewEdge {
                start: p.start,
                end: p.end,
                properties: &p.properties,
            })
            .collect();
        match self.store.insert_edges(&self.label.name, &edges) {
            Ok(_) => {
                let records = self.batch.commit().len();
                let progress = BatchProgress {
                    label: self.label.name.clone(),
                    batch: index,
                    records,
                    committed: self.batch.committed(),
                    skipped: self.skipped,
                };
                self.reporter.report(ReportEvent::BatchCommitted {
                    phase: Phase::Edges,
                    progress: progress.clone(),
                });
                Ok(Some(progress))
            }
            Err(source) => {
                self.reporter.report(ReportEvent::BatchFailed {
                    phase: Phase::Edges,
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
        I: IntoIterator<Item = Result<EdgeRecord>>,
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

    fn prepare(&mut self, record: EdgeRecord) -> Result<PendingEdge> {
        let position = record.position;
        let start = self.resolve(
            EndpointSide::Start,
            &record.start_label,
            &record.start_id,
            position,
        )?;
        let end = self.resolve(EndpointSide::End, &record.end_label, &record.end_id, position)?;
        encode_properties(&record.properties)
            .map_err(|err| TransferError::record(position, err.to_string()))?;
        Ok(PendingEdge {
            start,
            end,
            properties: record.properties,
        })
    }

    fn resolve(
        &mut self,
        side: EndpointSide,
        label: &str,
        external_id: &Value,
        position: usize,
    ) -> Result<GraphId> {
        if label.is_empty() {
            return Err(TransferError::record(
                position,
                format!("missing {side} vertex type"),
            ));
        }
        let key = external_id
            .as_key()
            .ok_or_else(|| TransferError::record(position, format!("missing {side} id")))?;
        if !self.tables.contains_label(label) {
            if !self.options.resolve_from_store {
                return Err(TransferError::EndpointLabelNotLoaded {
                    label: label.to_string(),
                });
            }
            self.tables.load_from_store(&*self.store, label, ID_FIELD)?;
        }
        self.tables
            .resolve(label, &key)
            .ok_or_else(|| TransferError::UnresolvedEndpoint {
                side,
                label: label.to_string(),
                external_id: key,
            })
    }

    fn skip(&mut self, err: TransferError, position: usize) -> Result<()> {
        if err.scope() == ErrorScope::Record {
            self.skipped += 1;
        }
        absorb_record_error(&mut *self.reporter, Phase::Edges, &self.label.name, err, position)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{edge, vertex, RecordingStore};
    use super::super::{ImportRun, LabelIds};
    use super::*;
    use crate::report::CollectingReporter;
    use crate::storage::MemoryStore;
    use crate::types::LabelKind;

    fn person_table() -> IdTable {
        let mut tables = IdTable::new();
        tables.merge(
            "Person",
            LabelIds::from([("1".to_string(), GraphId(101)), ("2".to_string(), GraphId(102))]),
        );
        tables
    }

    #[test]
    fn resolves_endpoints_through_table() {
        let mut store = RecordingStore::new();
        let info = store.create_label("KNOWS", LabelKind::Edge).unwrap();
        let mut tables = person_table();
        let mut reporter = CollectingReporter::new();
        let options = ImportOptions::default();
        let mut loader = EdgeLoader::new(&mut store, &mut reporter, &options, &mut tables, info);
        let weight = [("weight", Value::Int(5))];
        let mut record = edge(1, "1", "Person", "2", "Person", &weight);
        record.start_id = Value::Int(1);
        let stats = loader.load(vec![Ok(record)]).unwrap();
        assert_eq!(stats.committed, 1);
        drop(loader);
        let (start, end, props) = &store.edges[0];
        assert_eq!((*start, *end), (GraphId(101), GraphId(102)));
        assert_eq!(props["weight"], Value::Int(5));
    }

    #[test]
    fn unresolved_endpoint_skips_only_that_record() {
        let mut store = RecordingStore::new();
        let info = store.create_label("KNOWS", LabelKind::Edge).unwrap();
        let mut tables = person_table();
        let mut reporter = CollectingReporter::new();
        let options = ImportOptions::default();
        let mut loader = EdgeLoader::new(&mut store, &mut reporter, &options, &mut tables, info);
        let stats = loader
            .load(vec![
                Ok(edge(1, "1", "Person", "9", "Person", &[])),
                Ok(edge(2, "", "Person", "2", "Person", &[])),
                Ok(edge(3, "2", "Person", "1", "Person", &[])),
            ])
            .unwrap();
        assert_eq!((stats.committed, stats.skipped), (1, 2));
        drop(loader);
        let skipped = reporter.skipped();
        assert_eq!(skipped[0].0, 1);
        assert!(skipped[0].1.contains("'9'"));
        assert_eq!(store.edges.len(), 1);
    }

    #[test]
    fn unloaded_endpoint_label_fails_fast() {
        let mut store = RecordingStore::new();
        let info = store.create_label("LIVES_IN", LabelKind::Edge).unwrap();
        let mut tables = person_table();
        let mut reporter = CollectingReporter::new();
        let options = ImportOptions::default();
        let mut loader = EdgeLoader::new(&mut store, &mut reporter, &options, &mut tables, info);
        let err = loader
            .load(vec![Ok(edge(1, "1", "Person", "7", "City", &[]))])
            .unwrap_err();
        assert!(matches!(err, TransferError::EndpointLabelNotLoaded { ref label } if label == "City"));
        assert_eq!(err.scope(), ErrorScope::File);
    }

    #[test]
    fn endpoints_can_be_resolved_from_store() {
        let mut store = MemoryStore::new();
        let mut reporter = CollectingReporter::new();
        let mut first = ImportRun::new(ImportOptions::default());
        first
            .load_vertices(
                &mut store,
                &mut reporter,
                "Person",
                vec![Ok(vertex(1, "1", &[])), Ok(vertex(2, "2", &[]))],
            )
            .unwrap();
        first.finish().unwrap();

        let options = ImportOptions {
            resolve_from_store: true,
            ..ImportOptions::default()
        };
        let mut second = ImportRun::new(options);
        let stats = second
            .load_edges(
                &mut store,
                &mut reporter,
                "KNOWS",
                vec![Ok(edge(1, "1", "Person", "2", "Person", &[]))],
            )
            .unwrap();
        assert_eq!(stats.committed, 1);
        assert!(second.id_table().contains_label("Person"));
        let rows = store.scan_edges("KNOWS").unwrap();
        let people = store.scan_vertices("Person").unwrap();
        assert_eq!((rows[0].start, rows[0].end), (people[0].id, people[1].id));
    }
}
