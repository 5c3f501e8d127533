//! Core store types: hashes, tip descriptors, and proven block headers.
//!
//! A [`ProvenBlockHeader`] is a block header enriched with the proof-of-stake
//! data needed to validate it without the full block (merkle proof of the
//! coinstake, the coinstake itself, and the block signature). The store treats
//! it as an opaque, immutable record identified by its [`hash`](ProvenBlockHeader::hash)
//! and the height it occupies on the chain.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A 32-byte digest.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The all-zero hash. Used as the parent of genesis.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Build a hash from a byte slice of exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A header position identified by both its hash and its height.
///
/// Used as the tip descriptor of the pending batch, the repository, and the
/// store as a whole.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub struct HashHeightPair {
    pub hash: Hash256,
    pub height: u64,
}

impl HashHeightPair {
    pub fn new(hash: Hash256, height: u64) -> Self {
        Self { hash, height }
    }
}

impl fmt::Display for HashHeightPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.height, self.hash)
    }
}

/// A block header with its proof-of-stake validation data.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct ProvenBlockHeader {
    pub version: u32,
    pub prev_hash: Hash256,
    pub merkle_root: Hash256,
    /// Unix seconds.
    pub timestamp: u64,
    /// Compact difficulty target.
    pub bits: u32,
    pub nonce: u32,
    /// Merkle branch proving the coinstake is the block's second transaction.
    pub merkle_proof: Vec<Hash256>,
    /// Block signature made with the staker's key.
    pub signature: Vec<u8>,
    /// Serialized coinstake transaction.
    pub coinstake: Vec<u8>,
}

impl ProvenBlockHeader {
    /// Size of the fixed hashing layout: version, two hashes, timestamp, bits, nonce.
    const HASH_SIZE: usize = 4 + 2 * 32 + 8 + 4 + 4;

    /// Compute the header hash (double SHA-256).
    ///
    /// Covers only the base header fields, laid out little-endian:
    /// version || prev_hash || merkle_root || timestamp || bits || nonce.
    /// The proof fields do not change a header's identity.
    pub fn hash(&self) -> Hash256 {
        let mut data = Vec::with_capacity(Self::HASH_SIZE);
        data.extend_from_slice(&self.version.to_le_bytes());
        data.extend_from_slice(self.prev_hash.as_bytes());
        data.extend_from_slice(self.merkle_root.as_bytes());
        data.extend_from_slice(&self.timestamp.to_le_bytes());
        data.extend_from_slice(&self.bits.to_le_bytes());
        data.extend_from_slice(&self.nonce.to_le_bytes());
        let first = Sha256::digest(&data);
        Hash256(Sha256::digest(first).into())
    }

    /// Encoded length in bytes, used as the header's memory footprint.
    ///
    /// Falls back to a fixed estimate if encoding fails, which cannot happen
    /// for in-memory values but keeps size accounting total.
    pub fn serialized_size(&self) -> usize {
        bincode::encode_to_vec(self, bincode::config::standard())
            .map(|v| v.len())
            .unwrap_or(crate::constants::ESTIMATED_HEADER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> ProvenBlockHeader {
        ProvenBlockHeader {
            version: 7,
            prev_hash: Hash256([0x11; 32]),
            merkle_root: Hash256([0x22; 32]),
            timestamp: 1_700_000_000,
            bits: 0x1d00_ffff,
            nonce: 42,
            merkle_proof: vec![Hash256([0x33; 32])],
            signature: vec![0xAA; 71],
            coinstake: vec![0xBB; 120],
        }
    }

    #[test]
    fn hash256_zero_is_zero() {
        assert!(Hash256::ZERO.is_zero());
        assert_eq!(Hash256::ZERO, Hash256::default());
        assert!(!Hash256([1; 32]).is_zero());
    }

    #[test]
    fn hash256_hex_roundtrip() {
        let h = Hash256([0xAB; 32]);
        let s = h.to_string();
        assert_eq!(s.len(), 64);
        assert_eq!(Hash256::from_hex(&s), Some(h));
    }

    #[test]
    fn hash256_from_hex_rejects_bad_input() {
        assert!(Hash256::from_hex("zz").is_none());
        assert!(Hash256::from_hex("abcd").is_none());
    }

    #[test]
    fn hash256_from_slice_requires_32_bytes() {
        assert_eq!(Hash256::from_slice(&[7u8; 32]), Some(Hash256([7; 32])));
        assert!(Hash256::from_slice(&[7u8; 31]).is_none());
    }

    #[test]
    fn hash_height_pair_equality_needs_both_fields() {
        let a = HashHeightPair::new(Hash256([1; 32]), 5);
        assert_eq!(a, HashHeightPair::new(Hash256([1; 32]), 5));
        assert_ne!(a, HashHeightPair::new(Hash256([1; 32]), 6));
        assert_ne!(a, HashHeightPair::new(Hash256([2; 32]), 5));
    }

    #[test]
    fn hash_height_pair_display() {
        let p = HashHeightPair::new(Hash256([0; 32]), 12);
        assert!(p.to_string().starts_with("12-0000"));
    }

    #[test]
    fn header_hash_is_deterministic() {
        assert_eq!(sample_header().hash(), sample_header().hash());
    }

    #[test]
    fn header_hash_changes_with_nonce() {
        let mut other = sample_header();
        other.nonce += 1;
        assert_ne!(sample_header().hash(), other.hash());
    }

    #[test]
    fn header_hash_ignores_proof_fields() {
        let mut other = sample_header();
        other.signature = vec![0x01];
        other.coinstake.clear();
        other.merkle_proof.clear();
        assert_eq!(sample_header().hash(), other.hash());
    }

    #[test]
    fn serialized_size_matches_encoding() {
        let header = sample_header();
        let encoded = bincode::encode_to_vec(&header, bincode::config::standard()).unwrap();
        assert_eq!(header.serialized_size(), encoded.len());
        assert!(header.serialized_size() > 200);
    }

    #[test]
    fn header_bincode_roundtrip() {
        let header = sample_header();
        let encoded = bincode::encode_to_vec(&header, bincode::config::standard()).unwrap();
        let (decoded, _): (ProvenBlockHeader, _) =
            bincode::decode_from_slice(&encoded, bincode::config::standard()).unwrap();
        assert_eq!(decoded, header);
    }
}
