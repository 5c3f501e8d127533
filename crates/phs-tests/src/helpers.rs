//! Shared builders for chains, repositories, and stores.

use std::path::Path;
use std::sync::Arc;

use phs_core::chain_index::MemoryChainIndex;
use phs_core::genesis::genesis_header;
use phs_core::traits::HeaderRepository;
use phs_core::types::{Hash256, HashHeightPair, ProvenBlockHeader};
use phs_store::repository::RocksHeaderRepository;
use phs_store::store::ProvenHeaderStore;

/// Cache budget large enough that nothing is evicted in ordinary tests.
pub const LARGE_CACHE: usize = 64 * 1024 * 1024;

/// Child of `parent`; `branch` distinguishes siblings at the same height.
pub fn make_header(parent: &ProvenBlockHeader, branch: u8) -> ProvenBlockHeader {
    ProvenBlockHeader {
        version: 1,
        prev_hash: parent.hash(),
        merkle_root: Hash256([branch; 32]),
        timestamp: parent.timestamp + 64,
        bits: 0x1e0f_ffff,
        nonce: branch as u32,
        merkle_proof: vec![Hash256([0xCC; 32]), Hash256([branch; 32])],
        signature: vec![0x30, 0x45, branch],
        coinstake: vec![0xAB; 32],
    }
}

/// Extend a copy of `base` with headers on `branch` until it has `len` entries.
pub fn extend_branch(base: &[ProvenBlockHeader], len: usize, branch: u8) -> Vec<ProvenBlockHeader> {
    let mut out = base.to_vec();
    if out.is_empty() {
        out.push(genesis_header().clone());
    }
    while out.len() < len {
        let next = make_header(&out[out.len() - 1], branch);
        out.push(next);
    }
    out
}

/// Genesis followed by `len - 1` headers on branch 0.
pub fn build_chain(len: usize) -> Vec<ProvenBlockHeader> {
    extend_branch(&[], len, 0)
}

/// Chain index whose canonical chain is `headers`.
pub fn index_for(headers: &[ProvenBlockHeader]) -> Arc<MemoryChainIndex> {
    let hashes: Vec<Hash256> = headers.iter().map(|h| h.hash()).collect();
    let index = if hashes.is_empty() {
        MemoryChainIndex::new(genesis_header().hash())
    } else {
        MemoryChainIndex::from_hashes(&hashes).unwrap_or_else(|| MemoryChainIndex::new(hashes[0]))
    };
    Arc::new(index)
}

/// Tip descriptor for `headers[height]`.
pub fn tip_at(headers: &[ProvenBlockHeader], height: usize) -> HashHeightPair {
    HashHeightPair::new(headers[height].hash(), height as u64)
}

/// Write `headers[..=up_to]` straight into `repo` with the tip at `up_to`.
pub fn persist(repo: &dyn HeaderRepository, headers: &[ProvenBlockHeader], up_to: usize) {
    let items = headers[..=up_to]
        .iter()
        .enumerate()
        .map(|(height, h)| (height as u64, h.clone()))
        .collect();
    repo.put(items, tip_at(headers, up_to))
        .unwrap_or_else(|e| panic!("persist failed: {e}"));
}

/// Open a RocksDB repository under `dir`.
pub fn open_repo(dir: &Path) -> Arc<RocksHeaderRepository> {
    let repo = RocksHeaderRepository::open(dir.join("provenheaders"))
        .unwrap_or_else(|e| panic!("open repository: {e}"));
    Arc::new(repo)
}

/// Uninitialized store over `repo`, following `chain`.
pub fn new_store(
    chain: Arc<MemoryChainIndex>,
    repo: Arc<dyn HeaderRepository>,
    max_cache_bytes: usize,
    max_single_flush_size: usize,
) -> ProvenHeaderStore {
    ProvenHeaderStore::new(chain, repo, max_cache_bytes, max_single_flush_size)
}

/// Queue `headers[range]` as pending, each as the new tip.
pub fn add_pending(
    store: &ProvenHeaderStore,
    headers: &[ProvenBlockHeader],
    range: std::ops::Range<usize>,
) {
    for height in range {
        store
            .add_to_pending(headers[height].clone(), tip_at(headers, height))
            .unwrap_or_else(|e| panic!("add_to_pending({height}): {e}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phs_core::traits::ChainIndex;

    #[test]
    fn chain_links_parents() {
        let chain = build_chain(5);
        assert_eq!(chain[0], *genesis_header());
        for pair in chain.windows(2) {
            assert_eq!(pair[1].prev_hash, pair[0].hash());
        }
    }

    #[test]
    fn branches_diverge() {
        let main = build_chain(6);
        let fork = extend_branch(&main[..3], 6, 7);
        assert_eq!(fork[2], main[2]);
        assert_ne!(fork[3].hash(), main[3].hash());
    }

    #[test]
    fn index_matches_headers() {
        let chain = build_chain(4);
        let index = index_for(&chain);
        assert_eq!(index.tip(), tip_at(&chain, 3));
        assert_eq!(index.hash_at(1), Some(chain[1].hash()));
    }
}
