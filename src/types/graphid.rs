use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{Result, TransferError};

/// Number of low bits holding the per-label sequence.
pub const SEQ_BITS: u32 = 48;
/// Mask selecting the sequence bits of a [`GraphId`].
pub const SEQ_MASK: u64 = (1u64 << SEQ_BITS) - 1;

/// Numeric identifier of a label inside one store.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelId(pub u16);

/// Composite entity identifier: label id in the high 16 bits, sequence in the
/// low 48.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphId(pub u64);

impl GraphId {
    /// Label id packed into this identifier.
    pub fn label(self) -> LabelId {
        decode(self).0
    }

    /// Per-label sequence packed into this identifier.
    pub fn sequence(self) -> u64 {
        decode(self).1
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Packs `(label, sequence)` into a [`GraphId`].
///
/// # Errors
///
/// Returns [`TransferError::Range`] when `sequence` does not fit in
/// [`SEQ_BITS`] bits.
pub fn encode(label: LabelId, sequence: u64) -> Result<GraphId> {
    if sequence > SEQ_MASK {
        return Err(TransferError::Range { label, sequence });
    }
    Ok(GraphId((u64::from(label.0) << SEQ_BITS) | (sequence & SEQ_MASK)))
}

/// Splits a [`GraphId`] back into its label id and sequence.
pub fn decode(id: GraphId) -> (LabelId, u64) {
    (LabelId((id.0 >> SEQ_BITS) as u16), id.0 & SEQ_MASK)
}

/// Run-scoped sequence counters, one per label.
///
/// Each label is seeded at most once per run from the store's current maximum;
/// after that the allocator is the only source of new sequences for the label.
#[derive(Debug, Default, Clone)]
pub struct SequenceAllocator {
    next: HashMap<LabelId, u64>,
}

impl SequenceAllocator {
    /// Creates an allocator with no seeded labels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds `label` from the highest sequence already stored. Seeding an
    /// already seeded label has no effect.
    pub fn seed(&mut self, label: LabelId, current_max: u64) {
        self.next
            .entry(label)
            .or_insert_with(|| current_max.saturating_add(1));
    }

    /// Whether `label` has a counter yet.
    pub fn is_seeded(&self, label: LabelId) -> bool {
        self.next.contains_key(&label)
    }

    /// Sequence the next allocation for `label` will return.
    pub fn peek(&self, label: LabelId) -> u64 {
        self.next.get(&label).copied().unwrap_or(1)
    }

    /// Returns the next sequence for `label`, starting at 1 when unseeded.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Range`] once the label's sequence space is
    /// exhausted; the counter is left untouched in that case.
    pub fn next_sequence(&mut self, label: LabelId) -> Result<u64> {
        let slot = self.next.entry(label).or_insert(1);
        let sequence = *slot;
        if sequence > SEQ_MASK {
            return Err(TransferError::Range { label, sequence });
        }
        *slot = sequence + 1;
        Ok(sequence)
    }

    /// Allocates the next sequence and encodes it with `label`.
    pub fn next_id(&mut self, label: LabelId) -> Result<GraphId> {
        let sequence = self.next_sequence(label)?;
        encode(label, sequence)
    }
}
