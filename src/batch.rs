//! Bounded grouping of records into store and file round-trips.

use serde::Serialize;

/// Records per store round-trip unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 1_000;

/// Accumulates records until a batch is full.
///
/// The pending batch is only released by [`Batcher::commit`], which callers
/// invoke after the store accepted it. A batch whose round-trip failed
/// therefore stays pending and can be submitted again.
#[derive(Debug)]
pub struct Batcher<T> {
    capacity: usize,
    pending: Vec<T>,
    index: usize,
    committed: usize,
}

impl<T> Batcher<T> {
    /// Creates a batcher; a zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            pending: Vec::with_capacity(capacity.min(DEFAULT_BATCH_SIZE)),
            index: 0,
            committed: 0,
        }
    }

    /// Adds a record; returns `true` once the pending batch is full.
    pub fn push(&mut self, item: T) -> bool {
        self.pending.push(item);
        self.is_full()
    }

    /// Whether the pending batch reached capacity.
    pub fn is_full(&self) -> bool {
        self.pending.len() >= self.capacity
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Records waiting for the next round-trip.
    pub fn pending(&self) -> &[T] {
        &self.pending
    }

    /// Zero-based index of the pending batch.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Records released by [`Batcher::commit`] so far.
    pub fn committed(&self) -> usize {
        self.committed
    }

    /// Configured batch capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Releases the pending batch after a successful round-trip.
    pub fn commit(&mut self) -> Vec<T> {
        let batch = std::mem::take(&mut self.pending);
        self.committed += batch.len();
        self.index += 1;
        batch
    }
}

/// Progress snapshot returned after each committed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    /// Label the batch belongs to.
    pub label: String,
    /// Zero-based index of the committed batch.
    pub batch: usize,
    /// Records in the committed batch.
    pub records: usize,
    /// Records committed for the label so far, this batch included.
    pub committed: usize,
    /// Records skipped for the label so far.
    pub skipped: usize,
}

/// Iterator adapter yielding owned chunks of at most `size` items.
pub struct Batches<I> {
    inner: I,
    size: usize,
}

/// Groups `iter` into chunks of `size` (at least one) items.
pub fn batches<I: IntoIterator>(iter: I, size: usize) -> Batches<I::IntoIter> {
    Batches {
        inner: iter.into_iter(),
        size: size.max(1),
    }
}

impl<I: Iterator> Iterator for Batches<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk: Vec<_> = self.inner.by_ref().take(self.size).collect();
        (!chunk.is_empty()).then_some(chunk)
    }
}
