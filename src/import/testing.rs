//! Store doubles shared by the loader tests.

use std::collections::VecDeque;
use std::io;

use crate::storage::{
    EdgeRow, GraphStore, LabelInfo, MemoryStore, NewEdge, StoreError, StoreResult, VertexRow,
};
use crate::types::{GraphId, LabelId, LabelKind};
use crate::value::{PropertyMap, Value};

use super::source::{EdgeRecord, VertexRecord};

/// Wraps a [`MemoryStore`], records every write, can hand out planted ids
/// and can fail a number of upcoming round-trips.
#[derive(Default)]
pub(crate) struct RecordingStore {
    pub inner: MemoryStore,
    pub planted: VecDeque<GraphId>,
    pub vertices: Vec<(GraphId, PropertyMap)>,
    pub edges: Vec<(GraphId, GraphId, PropertyMap)>,
    pub fail_next: usize,
    pub round_trips: usize,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_planted_ids(ids: Vec<GraphId>) -> Self {
        Self {
            planted: ids.into(),
            ..Self::default()
        }
    }

    fn round_trip(&mut self) -> StoreResult<()> {
        self.round_trips += 1;
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::Other,
                "injected failure",
            )));
        }
        Ok(())
    }
}

impl GraphStore for RecordingStore {
    fn create_label(&mut self, name: &str, kind: LabelKind) -> StoreResult<LabelInfo> {
        self.inner.create_label(name, kind)
    }

    fn labels(&self) -> StoreResult<Vec<LabelInfo>> {
        self.inner.labels()
    }

    fn label(&self, name: &str) -> StoreResult<Option<LabelInfo>> {
        self.inner.label(name)
    }

    fn label_by_id(&self, id: LabelId) -> StoreResult<Option<LabelInfo>> {
        self.inner.label_by_id(id)
    }

    fn max_sequence(&self, label: &str) -> StoreResult<u64> {
        self.inner.max_sequence(label)
    }

    fn insert_vertices(
        &mut self,
        label: &str,
        batch: &[&PropertyMap],
    ) -> StoreResult<Vec<GraphId>> {
        self.round_trip()?;
        let ids = if self.planted.is_empty() {
            self.inner.insert_vertices(label, batch)?
        } else {
            batch
                .iter()
                .map(|_| self.planted.pop_front().unwrap_or(GraphId(0)))
                .collect()
        };
        for (id, props) in ids.iter().zip(batch) {
            self.vertices.push((*id, (*props).clone()));
        }
        Ok(ids)
    }

    fn insert_vertices_with_ids(
        &mut self,
        label: &str,
        batch: &[(GraphId, &PropertyMap)],
    ) -> StoreResult<()> {
        self.round_trip()?;
        self.inner.insert_vertices_with_ids(label, batch)?;
        for (id, props) in batch {
            self.vertices.push((*id, (*props).clone()));
        }
        Ok(())
    }

    fn insert_edges(&mut self, _label: &str, batch: &[NewEdge<'_>]) -> StoreResult<usize> {
        self.round_trip()?;
        for edge in batch {
            self.edges
                .push((edge.start, edge.end, edge.properties.clone()));
        }
        Ok(batch.len())
    }

    fn scan_vertices(&self, label: &str) -> StoreResult<Vec<VertexRow>> {
        self.inner.scan_vertices(label)
    }

    fn scan_edges(&self, label: &str) -> StoreResult<Vec<EdgeRow>> {
        self.inner.scan_edges(label)
    }
}

fn props(entries: &[(&str, Value)]) -> PropertyMap {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

pub(crate) fn vertex(position: usize, id: &str, entries: &[(&str, Value)]) -> VertexRecord {
    let mut fields = props(entries);
    fields.insert("id".to_string(), Value::from(id));
    VertexRecord { position, fields }
}

pub(crate) fn edge(
    position: usize,
    start: &str,
    start_label: &str,
    end: &str,
    end_label: &str,
    entries: &[(&str, Value)],
) -> EdgeRecord {
    EdgeRecord {
        position,
        start_id: Value::from(start),
        start_label: start_label.to_string(),
        end_id: Value::from(end),
        end_label: end_label.to_string(),
        properties: props(entries),
    }
}
