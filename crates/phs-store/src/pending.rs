//! Pending batch of headers accepted but not yet persisted.
//!
//! Entries keep their insertion order. Order matters: the flush-time
//! contiguity check runs over the sequence exactly as the caller supplied
//! it, so a batch added out of order is rejected rather than silently sorted.

use std::collections::HashMap;

use phs_core::error::StoreError;
use phs_core::types::{HashHeightPair, ProvenBlockHeader};

#[derive(Debug, Default)]
pub struct PendingBatch {
    entries: Vec<(HashHeightPair, ProvenBlockHeader)>,
    /// Height -> index of the most recent entry at that height.
    index: HashMap<u64, usize>,
}

impl PendingBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tip: HashHeightPair, header: ProvenBlockHeader) {
        self.index.insert(tip.height, self.entries.len());
        self.entries.push((tip, header));
    }

    /// Most recently added header at `height`.
    pub fn get(&self, height: u64) -> Option<&ProvenBlockHeader> {
        self.index.get(&height).map(|&i| &self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tip of the most recently added entry; `None` once drained.
    pub fn tip(&self) -> Option<HashHeightPair> {
        self.entries.last().map(|(tip, _)| *tip)
    }

    /// Clone of the first `max` entries in insertion order.
    pub fn snapshot(&self, max: usize) -> Vec<(HashHeightPair, ProvenBlockHeader)> {
        self.entries.iter().take(max).cloned().collect()
    }

    /// Drop the first `n` entries after they have been persisted.
    pub fn drain_front(&mut self, n: usize) {
        let n = n.min(self.entries.len());
        self.entries.drain(..n);
        self.index.clear();
        for (i, (tip, _)) in self.entries.iter().enumerate() {
            self.index.insert(tip.height, i);
        }
    }
}

/// Check that `items` extend the durable tip without gaps.
///
/// The first item must sit at `durable.height + 1`, or repeat the durable
/// tip itself (same height and hash, as when genesis is re-added over the
/// default tip). Every later item must be exactly one above its
/// predecessor.
pub fn validate_sequence(
    items: &[(HashHeightPair, ProvenBlockHeader)],
    durable: &HashHeightPair,
) -> Result<(), StoreError> {
    let mut prev: Option<u64> = None;
    for (tip, _) in items {
        let (expected, ok) = match prev {
            Some(p) => (p + 1, tip.height == p + 1),
            None => (
                durable.height + 1,
                tip.height == durable.height + 1 || tip == durable,
            ),
        };
        if !ok {
            return Err(StoreError::InvalidSequence {
                expected,
                got: tip.height,
            });
        }
        prev = Some(tip.height);
    }
    Ok(())
}
