//! Trait interfaces between the store and its collaborators.
//!
//! - [`ChainIndex`]: read-only view of the node's header chain (the
//!   consensus layer implements it; [`MemoryChainIndex`](crate::chain_index::MemoryChainIndex)
//!   is the in-memory version)
//! - [`HeaderRepository`]: durable header and tip storage (phs-store
//!   implements it over RocksDB; [`MemoryHeaderRepository`](crate::repository::MemoryHeaderRepository)
//!   keeps everything in memory)

use crate::error::RepositoryError;
use crate::types::{Hash256, HashHeightPair, ProvenBlockHeader};

/// Read-only view of the node's header chain.
///
/// The canonical chain is the path from genesis to [`tip`](Self::tip).
/// Implementations may also know headers on stale branches; those resolve
/// through [`find_fork`](Self::find_fork) but never through
/// [`hash_at`](Self::hash_at). The store never mutates the index.
pub trait ChainIndex: Send + Sync {
    /// Current canonical tip.
    fn tip(&self) -> HashHeightPair;

    /// Hash at `height` on the canonical chain, or `None` above the tip.
    fn hash_at(&self, height: u64) -> Option<Hash256>;

    /// Height of a known header (canonical or not).
    fn height_of(&self, hash: &Hash256) -> Option<u64>;

    /// Highest common ancestor of two known headers, or `None` if either is
    /// unknown or they share no history.
    fn find_fork(&self, a: &HashHeightPair, b: &HashHeightPair) -> Option<HashHeightPair>;

    /// Canonical genesis position.
    fn genesis(&self) -> Option<HashHeightPair> {
        self.hash_at(0).map(|hash| HashHeightPair::new(hash, 0))
    }

    /// Whether `pair` sits on the canonical chain.
    fn contains(&self, pair: &HashHeightPair) -> bool {
        self.hash_at(pair.height) == Some(pair.hash)
    }

    /// Whether `ancestor` is `descendant` itself or one of its ancestors.
    fn is_ancestor_or_self(&self, ancestor: &HashHeightPair, descendant: &HashHeightPair) -> bool {
        self.find_fork(ancestor, descendant).as_ref() == Some(ancestor)
    }
}

/// Durable storage of proven headers keyed by height, plus the tip pointer.
///
/// Every mutating call is a single atomic transaction: either all of its
/// records and the new tip become visible, or none do. The tip never points
/// past a height whose header is not stored, except for the default tip
/// written by [`initialize`](Self::initialize).
pub trait HeaderRepository: Send + Sync {
    /// Set the tip to `default_tip` if none exists yet. Idempotent.
    ///
    /// Returns the tip in effect afterwards.
    fn initialize(&self, default_tip: HashHeightPair) -> Result<HashHeightPair, RepositoryError>;

    /// Persisted tip, or `None` before [`initialize`](Self::initialize).
    fn tip(&self) -> Result<Option<HashHeightPair>, RepositoryError>;

    /// Hash of the persisted tip.
    fn tip_hash(&self) -> Result<Option<Hash256>, RepositoryError> {
        Ok(self.tip()?.map(|t| t.hash))
    }

    /// Header stored at `height`.
    fn get(&self, height: u64) -> Result<Option<ProvenBlockHeader>, RepositoryError>;

    /// Headers at `start..start + count`, ascending, stopping at the first
    /// height with no stored header.
    fn get_range(&self, start: u64, count: u64) -> Result<Vec<ProvenBlockHeader>, RepositoryError> {
        let mut headers = Vec::new();
        for height in start..start.saturating_add(count) {
            match self.get(height)? {
                Some(header) => headers.push(header),
                None => break,
            }
        }
        Ok(headers)
    }

    /// Height at which the header with `hash` is stored.
    fn height_of(&self, hash: &Hash256) -> Result<Option<u64>, RepositoryError>;

    /// Header with `hash`, resolved through the hash index.
    fn get_by_hash(&self, hash: &Hash256) -> Result<Option<ProvenBlockHeader>, RepositoryError> {
        match self.height_of(hash)? {
            Some(height) => self.get(height),
            None => Ok(None),
        }
    }

    /// Whether a header is stored at `height`.
    fn exists(&self, height: u64) -> Result<bool, RepositoryError> {
        Ok(self.get(height)?.is_some())
    }

    /// Persist `items` and move the tip to `new_tip` in one transaction.
    ///
    /// Items are written in ascending height order. An item whose height
    /// already stores the same hash is skipped; a different hash at that
    /// height replaces the old record. Returns the number of records written.
    fn put(
        &self,
        items: Vec<(u64, ProvenBlockHeader)>,
        new_tip: HashHeightPair,
    ) -> Result<usize, RepositoryError>;

    /// Remove the headers at `heights` and reset the tip to `new_tip` in one
    /// transaction. Missing heights are ignored.
    fn delete(&self, new_tip: HashHeightPair, heights: &[u64]) -> Result<(), RepositoryError>;
}

/// Sort items by height ascending, keeping the last item supplied for a
/// repeated height.
pub fn sort_for_insert(items: Vec<(u64, ProvenBlockHeader)>) -> Vec<(u64, ProvenBlockHeader)> {
    let mut sorted: std::collections::BTreeMap<u64, ProvenBlockHeader> =
        std::collections::BTreeMap::new();
    for (height, header) in items {
        sorted.insert(height, header);
    }
    sorted.into_iter().collect()
}
