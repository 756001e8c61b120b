use std::collections::HashMap;

use crate::storage::{GraphStore, LabelInfo, StoreError, VertexRow};
use crate::types::{GraphId, LabelId, LabelKind, Result};
use crate::value::{PropertyMap, Value};

/// A resolved edge endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    /// Vertex label.
    pub label: String,
    /// External id written to the file.
    pub external_id: Value,
}

/// External id for a vertex: its id property when usable, else the
/// internal id.
pub fn external_id(id: GraphId, properties: &PropertyMap, id_property: &str) -> Value {
    match properties.get(id_property) {
        Some(value) if value.as_key().is_some() => value.clone(),
        _ => i64::try_from(id.0)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::String(id.0.to_string())),
    }
}

struct LabelEntry {
    name: String,
    ids: HashMap<GraphId, Value>,
}

/// Maps internal vertex ids back to `(label, external id)`.
///
/// The label is recovered from the id itself; each vertex label is scanned
/// at most once per lookup.
pub struct ReverseLookup {
    id_property: String,
    labels: HashMap<LabelId, LabelEntry>,
}

impl ReverseLookup {
    /// Creates an empty lookup reading external ids from `id_property`.
    pub fn new(id_property: impl Into<String>) -> Self {
        Self {
            id_property: id_property.into(),
            labels: HashMap::new(),
        }
    }

    /// Registers vertices already scanned for a label.
    pub fn record(&mut self, info: &LabelInfo, rows: &[VertexRow]) {
        let ids = rows
            .iter()
            .map(|row| (row.id, external_id(row.id, &row.properties, &self.id_property)))
            .collect();
        self.labels.insert(
            info.id,
            LabelEntry {
                name: info.name.clone(),
                ids,
            },
        );
    }

    /// Whether a label's vertices are cached.
    pub fn is_cached(&self, label: LabelId) -> bool {
        self.labels.contains_key(&label)
    }

    /// Resolves one endpoint, scanning its label on first use.
    ///
    /// # Errors
    ///
    /// Store errors, and [`StoreError::MissingVertex`] when the id does not
    /// name a stored vertex.
    pub fn resolve<S: GraphStore + ?Sized>(&mut self, store: &S, id: GraphId) -> Result<Endpoint> {
        let label_id = id.label();
        if !self.labels.contains_key(&label_id) {
            let info = store
                .label_by_id(label_id)?
                .filter(|info| info.kind == LabelKind::Vertex)
                .ok_or(StoreError::MissingVertex(id))?;
            let rows = store.scan_vertices(&info.name)?;
            self.record(&info, &rows);
        }
        let entry = self
            .labels
            .get(&label_id)
            .ok_or(StoreError::UnknownLabelId(label_id))?;
        let external_id = entry
            .ids
            .get(&id)
            .cloned()
            .ok_or(StoreError::MissingVertex(id))?;
        Ok(Endpoint {
            label: entry.name.clone(),
            external_id,
        })
    }
}
