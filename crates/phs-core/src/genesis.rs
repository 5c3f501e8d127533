//! Genesis proven header.
//!
//! The repository's tip defaults to the genesis hash at height 0 when nothing
//! has been persisted yet. Every node computes the identical header.

use std::sync::LazyLock;

use sha2::{Digest, Sha256};

use crate::types::{Hash256, HashHeightPair, ProvenBlockHeader};

/// Genesis timestamp: January 1, 2026 00:00:00 UTC.
pub const GENESIS_TIMESTAMP: u64 = 1_767_225_600;

/// Message committed to by the genesis merkle root.
pub const GENESIS_MESSAGE: &[u8] = b"proven header store genesis 2026";

struct GenesisData {
    header: ProvenBlockHeader,
    hash: Hash256,
}

static GENESIS: LazyLock<GenesisData> = LazyLock::new(|| {
    let header = ProvenBlockHeader {
        version: 1,
        prev_hash: Hash256::ZERO,
        merkle_root: Hash256(Sha256::digest(GENESIS_MESSAGE).into()),
        timestamp: GENESIS_TIMESTAMP,
        bits: 0x1e0f_ffff,
        nonce: 0,
        merkle_proof: Vec::new(),
        signature: Vec::new(),
        coinstake: Vec::new(),
    };
    let hash = header.hash();
    GenesisData { header, hash }
});

/// The genesis header (height 0).
pub fn genesis_header() -> &'static ProvenBlockHeader {
    &GENESIS.header
}

/// The genesis header hash.
pub fn genesis_hash() -> Hash256 {
    GENESIS.hash
}

/// Genesis as a tip descriptor.
pub fn genesis_tip() -> HashHeightPair {
    HashHeightPair::new(GENESIS.hash, 0)
}
