use std::collections::BTreeMap;

use super::{
    expect_kind, validate_label_name, EdgeRow, GraphStore, LabelInfo, NewEdge, StoreError,
    StoreResult, VertexRow,
};
use crate::types::{decode, encode, GraphId, LabelId, LabelKind, SEQ_MASK};
use crate::value::PropertyMap;

/// In-process store; nothing survives the value.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    slots: Vec<LabelSlot>,
}

#[derive(Debug, Clone)]
struct LabelSlot {
    info: LabelInfo,
    next_seq: u64,
    vertices: BTreeMap<GraphId, PropertyMap>,
    edges: BTreeMap<GraphId, (GraphId, GraphId, PropertyMap)>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total vertices across labels.
    pub fn vertex_count(&self) -> usize {
        self.slots.iter().map(|slot| slot.vertices.len()).sum()
    }

    /// Total edges across labels.
    pub fn edge_count(&self) -> usize {
        self.slots.iter().map(|slot| slot.edges.len()).sum()
    }

    fn slot(&self, name: &str) -> StoreResult<&LabelSlot> {
        self.slots
            .iter()
            .find(|slot| slot.info.name == name)
            .ok_or_else(|| StoreError::UnknownLabel(name.to_string()))
    }

    fn slot_index(&self, name: &str) -> StoreResult<usize> {
        self.slots
            .iter()
            .position(|slot| slot.info.name == name)
            .ok_or_else(|| StoreError::UnknownLabel(name.to_string()))
    }

    fn vertex_exists(&self, id: GraphId) -> bool {
        let (label, _) = decode(id);
        self.slots
            .get(usize::from(label.0).wrapping_sub(1))
            .map(|slot| slot.vertices.contains_key(&id))
            .unwrap_or(false)
    }
}

fn sequence_ids(slot: &LabelSlot, count: usize) -> StoreResult<Vec<GraphId>> {
    let last = slot.next_seq.saturating_add(count as u64).saturating_sub(1);
    if count > 0 && last > SEQ_MASK {
        return Err(StoreError::SequenceExhausted(slot.info.name.clone()));
    }
    (0..count as u64)
        .map(|offset| {
            encode(slot.info.id, slot.next_seq + offset)
                .map_err(|_| StoreError::SequenceExhausted(slot.info.name.clone()))
        })
        .collect()
}

impl GraphStore for MemoryStore {
    fn create_label(&mut self, name: &str, kind: LabelKind) -> StoreResult<LabelInfo> {
        validate_label_name(name)?;
        if let Ok(slot) = self.slot(name) {
            expect_kind(&slot.info, kind)?;
            return Ok(slot.info.clone());
        }
        let id = u16::try_from(self.slots.len() + 1).map_err(|_| StoreError::LabelsExhausted)?;
        let info = LabelInfo {
            id: LabelId(id),
            name: name.to_string(),
            kind,
        };
        self.slots.push(LabelSlot {
            info: info.clone(),
            next_seq: 1,
            vertices: BTreeMap::new(),
            edges: BTreeMap::new(),
        });
        Ok(info)
    }

    fn labels(&self) -> StoreResult<Vec<LabelInfo>> {
        Ok(self.slots.iter().map(|slot| slot.info.clone()).collect())
    }

    fn label(&self, name: &str) -> StoreResult<Option<LabelInfo>> {
        Ok(self
            .slots
            .iter()
            .find(|slot| slot.info.name == name)
            .map(|slot| slot.info.clone()))
    }

    fn label_by_id(&self, id: LabelId) -> StoreResult<Option<LabelInfo>> {
        Ok(self
            .slots
            .get(usize::from(id.0).wrapping_sub(1))
            .map(|slot| slot.info.clone()))
    }

    fn max_sequence(&self, label: &str) -> StoreResult<u64> {
        Ok(self.slot(label)?.next_seq - 1)
    }

    fn insert_vertices(
        &mut self,
        label: &str,
        batch: &[&PropertyMap],
    ) -> StoreResult<Vec<GraphId>> {
        let index = self.slot_index(label)?;
        let slot = &mut self.slots[index];
        expect_kind(&slot.info, LabelKind::Vertex)?;
        let ids = sequence_ids(slot, batch.len())?;
        for (id, props) in ids.iter().zip(batch) {
            slot.vertices.insert(*id, (*props).clone());
        }
        slot.next_seq += batch.len() as u64;
        Ok(ids)
    }

    fn insert_vertices_with_ids(
        &mut self,
        label: &str,
        batch: &[(GraphId, &PropertyMap)],
    ) -> StoreResult<()> {
        let index = self.slot_index(label)?;
        let slot = &mut self.slots[index];
        expect_kind(&slot.info, LabelKind::Vertex)?;
        let mut seen = std::collections::HashSet::with_capacity(batch.len());
        for (id, _) in batch {
            if id.label() != slot.info.id {
                return Err(StoreError::ForeignId {
                    id: *id,
                    label: label.to_string(),
                });
            }
            if slot.vertices.contains_key(id) || !seen.insert(*id) {
                return Err(StoreError::DuplicateId(*id));
            }
        }
        for (id, props) in batch {
            slot.vertices.insert(*id, (*props).clone());
            slot.next_seq = slot.next_seq.max(id.sequence() + 1);
        }
        Ok(())
    }

    fn insert_edges(&mut self, label: &str, batch: &[NewEdge<'_>]) -> StoreResult<usize> {
        let index = self.slot_index(label)?;
        expect_kind(&self.slots[index].info, LabelKind::Edge)?;
        for edge in batch {
            for endpoint in [edge.start, edge.end] {
                if !self.vertex_exists(endpoint) {
                    return Err(StoreError::MissingVertex(endpoint));
                }
            }
        }
        let slot = &mut self.slots[index];
        let ids = sequence_ids(slot, batch.len())?;
        for (id, edge) in ids.into_iter().zip(batch) {
            slot.edges
                .insert(id, (edge.start, edge.end, edge.properties.clone()));
        }
        slot.next_seq += batch.len() as u64;
        Ok(batch.len())
    }

    fn scan_vertices(&self, label: &str) -> StoreResult<Vec<VertexRow>> {
        let slot = self.slot(label)?;
        expect_kind(&slot.info, LabelKind::Vertex)?;
        Ok(slot
            .vertices
            .iter()
            .map(|(id, properties)| VertexRow {
                id: *id,
                properties: properties.clone(),
            })
            .collect())
    }

    fn scan_edges(&self, label: &str) -> StoreResult<Vec<EdgeRow>> {
        let slot = self.slot(label)?;
        expect_kind(&slot.info, LabelKind::Edge)?;
        Ok(slot
            .edges
            .iter()
            .map(|(id, (start, end, properties))| EdgeRow {
                id: *id,
                start: *start,
                end: *end,
                properties: properties.clone(),
            })
            .collect())
    }
}
