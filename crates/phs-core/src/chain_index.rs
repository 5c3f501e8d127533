//! In-memory header chain index.
//!
//! [`MemoryChainIndex`] keeps every header it has seen as a tree of parent
//! links, plus the canonical path from genesis to the current tip. It backs
//! tests and the diagnostics tool; a full node supplies its own index.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::traits::ChainIndex;
use crate::types::{Hash256, HashHeightPair};

#[derive(Debug, Clone, Copy)]
struct IndexNode {
    height: u64,
    prev: Option<Hash256>,
}

#[derive(Debug)]
struct Inner {
    nodes: HashMap<Hash256, IndexNode>,
    /// Canonical chain: `canonical[h]` is the hash at height `h`.
    canonical: Vec<Hash256>,
}

/// Header tree with a canonical chain.
#[derive(Debug)]
pub struct MemoryChainIndex {
    inner: RwLock<Inner>,
}

impl MemoryChainIndex {
    /// Create an index containing only `genesis` at height 0.
    pub fn new(genesis: Hash256) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(genesis, IndexNode { height: 0, prev: None });
        Self {
            inner: RwLock::new(Inner {
                nodes,
                canonical: vec![genesis],
            }),
        }
    }

    /// Create an index whose canonical chain is `hashes`, genesis first.
    ///
    /// Returns `None` for an empty list.
    pub fn from_hashes(hashes: &[Hash256]) -> Option<Self> {
        let (genesis, rest) = hashes.split_first()?;
        let index = Self::new(*genesis);
        for hash in rest {
            index.push(*hash);
        }
        Some(index)
    }

    /// Append `hash` on top of the canonical tip and return its position.
    pub fn push(&self, hash: Hash256) -> HashHeightPair {
        let mut inner = self.inner.write();
        let height = inner.canonical.len() as u64;
        let prev = inner.canonical.last().copied();
        inner.nodes.insert(hash, IndexNode { height, prev });
        inner.canonical.push(hash);
        HashHeightPair::new(hash, height)
    }

    /// Cut the canonical chain back to `height`. Headers above it stay known
    /// as a stale branch. Genesis is never removed.
    pub fn rewind(&self, height: u64) {
        let mut inner = self.inner.write();
        let keep = (height as usize).saturating_add(1).max(1);
        inner.canonical.truncate(keep);
    }

    /// Number of headers on the canonical chain, genesis included.
    pub fn len(&self) -> usize {
        self.inner.read().canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().canonical.is_empty()
    }
}

impl ChainIndex for MemoryChainIndex {
    fn tip(&self) -> HashHeightPair {
        let inner = self.inner.read();
        let height = inner.canonical.len() as u64 - 1;
        HashHeightPair::new(inner.canonical[height as usize], height)
    }

    fn hash_at(&self, height: u64) -> Option<Hash256> {
        self.inner.read().canonical.get(height as usize).copied()
    }

    fn height_of(&self, hash: &Hash256) -> Option<u64> {
        self.inner.read().nodes.get(hash).map(|n| n.height)
    }

    fn find_fork(&self, a: &HashHeightPair, b: &HashHeightPair) -> Option<HashHeightPair> {
        let inner = self.inner.read();
        let mut left = (a.hash, *inner.nodes.get(&a.hash)?);
        let mut right = (b.hash, *inner.nodes.get(&b.hash)?);
        if left.1.height != a.height || right.1.height != b.height {
            return None;
        }

        // Bring both walkers to the same height, then step together.
        while left.1.height > right.1.height {
            let prev = left.1.prev?;
            left = (prev, *inner.nodes.get(&prev)?);
        }
        while right.1.height > left.1.height {
            let prev = right.1.prev?;
            right = (prev, *inner.nodes.get(&prev)?);
        }
        while left.0 != right.0 {
            let (lp, rp) = (left.1.prev?, right.1.prev?);
            left = (lp, *inner.nodes.get(&lp)?);
            right = (rp, *inner.nodes.get(&rp)?);
        }
        Some(HashHeightPair::new(left.0, left.1.height))
    }
}
