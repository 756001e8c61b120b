use std::collections::HashMap;

use crate::storage::{GraphStore, StoreError};
use crate::types::{GraphId, LabelKind, Result, TransferError};

/// External id to internal id for one vertex label.
pub type LabelIds = HashMap<String, GraphId>;

/// Run-scoped identifier tables, one per loaded vertex label.
#[derive(Debug, Default, Clone)]
pub struct IdTable {
    labels: HashMap<String, LabelIds>,
}

impl IdTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one mapping; returns the previous id for the key, if any.
    pub fn insert(&mut self, label: &str, key: impl Into<String>, id: GraphId) -> Option<GraphId> {
        self.labels
            .entry(label.to_string())
            .or_default()
            .insert(key.into(), id)
    }

    /// Folds a loader's ids into the label's table. The label is registered
    /// even when `ids` is empty; a key already present keeps its first id.
    pub fn merge(&mut self, label: &str, ids: LabelIds) {
        let table = self.labels.entry(label.to_string()).or_default();
        for (key, id) in ids {
            table.entry(key).or_insert(id);
        }
    }

    /// Removes and returns a label's table, empty when it was never loaded.
    pub fn take(&mut self, label: &str) -> LabelIds {
        self.labels.remove(label).unwrap_or_default()
    }

    /// Table of one label, if it was loaded.
    pub fn get(&self, label: &str) -> Option<&LabelIds> {
        self.labels.get(label)
    }

    /// Whether a table exists for `label`.
    pub fn contains_label(&self, label: &str) -> bool {
        self.labels.contains_key(label)
    }

    /// Resolves an external id within a label.
    pub fn resolve(&self, label: &str, key: &str) -> Option<GraphId> {
        self.labels.get(label)?.get(key).copied()
    }

    /// Labels with a table, sorted.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.labels.keys().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }

    /// Total mappings across labels.
    pub fn len(&self) -> usize {
        self.labels.values().map(HashMap::len).sum()
    }

    /// Whether no mapping was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rebuilds a label's table by scanning the store and reading each
    /// vertex's `id_property`. When two vertices share an external id the
    /// first one scanned wins.
    ///
    /// # Errors
    ///
    /// [`TransferError::EndpointLabelNotLoaded`] when the store has no such
    /// vertex label.
    pub fn load_from_store<S: GraphStore + ?Sized>(
        &mut self,
        store: &S,
        label: &str,
        id_property: &str,
    ) -> Result<&LabelIds> {
        match store.label(label)? {
            Some(info) if info.kind == LabelKind::Vertex => {}
            _ => {
                return Err(TransferError::EndpointLabelNotLoaded {
                    label: label.to_string(),
                })
            }
        }
        let rows = store.scan_vertices(label).map_err(|source| match source {
            StoreError::UnknownLabel(_) => TransferError::EndpointLabelNotLoaded {
                label: label.to_string(),
            },
            other => TransferError::Storage(other),
        })?;
        let table = self.labels.entry(label.to_string()).or_default();
        for row in rows {
            if let Some(key) = row.properties.get(id_property).and_then(|v| v.as_key()) {
                table.entry(key).or_insert(row.id);
            }
        }
        tracing::debug!(label, entries = table.len(), "import.id_table.rebuilt");
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::value::{PropertyMap, Value};

    #[test]
    fn resolves_within_label_only() {
        let mut table = IdTable::new();
        table.insert("Person", "1", GraphId(101));
        table.merge("City", LabelIds::new());
        assert_eq!(table.resolve("Person", "1"), Some(GraphId(101)));
        assert_eq!(table.resolve("City", "1"), None);
        assert!(table.contains_label("City"));
        assert_eq!(table.labels(), vec!["City", "Person"]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn merge_keeps_the_first_mapping() {
        let mut table = IdTable::new();
        table.insert("Person", "1", GraphId(101));
        table.merge(
            "Person",
            LabelIds::from([("1".to_string(), GraphId(205)), ("2".to_string(), GraphId(206))]),
        );
        assert_eq!(table.resolve("Person", "1"), Some(GraphId(101)));
        assert_eq!(table.resolve("Person", "2"), Some(GraphId(206)));

        let taken = table.take("Person");
        assert_eq!(taken.len(), 2);
        assert!(!table.contains_label("Person"));
        assert!(table.take("City").is_empty());
    }

    #[test]
    fn rebuilds_from_store_scan() {
        let mut store = MemoryStore::new();
        store.create_label("Person", LabelKind::Vertex).unwrap();
        let with_id = PropertyMap::from([("id".to_string(), Value::Int(7))]);
        let without = PropertyMap::new();
        let ids = store.insert_vertices("Person", &[&with_id, &without]).unwrap();

        let mut table = IdTable::new();
        let rebuilt = table.load_from_store(&store, "Person", "id").unwrap();
        assert_eq!(rebuilt.len(), 1);
        assert_eq!(table.resolve("Person", "7"), Some(ids[0]));
        assert!(matches!(
            table.load_from_store(&store, "City", "id"),
            Err(TransferError::EndpointLabelNotLoaded { .. })
        ));
    }
}
