//! Criterion benchmarks for phs-core hot paths.
//!
//! Covers: proven header hashing and size-bounded cache put/get under
//! eviction pressure.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use phs_core::cache::SizeBoundedCache;
use phs_core::types::{Hash256, ProvenBlockHeader};

fn sample_header(nonce: u32) -> ProvenBlockHeader {
    ProvenBlockHeader {
        version: 1,
        prev_hash: Hash256([0xAA; 32]),
        merkle_root: Hash256([0xBB; 32]),
        timestamp: 1_700_000_000,
        bits: 0x1d00_ffff,
        nonce,
        merkle_proof: vec![Hash256([0xCC; 32]); 4],
        signature: vec![0u8; 72],
        coinstake: vec![0u8; 180],
    }
}

fn bench_header_hash(c: &mut Criterion) {
    let header = sample_header(42);
    c.bench_function("proven_header_hash", |b| b.iter(|| black_box(&header).hash()));
}

fn bench_cache(c: &mut Criterion) {
    let header = sample_header(1);
    let size = header.serialized_size();

    c.bench_function("cache_put_with_eviction", |b| {
        // Budget for ~1,000 headers so steady state evicts on every put.
        let cache = SizeBoundedCache::new(size * 1_000);
        let mut height = 0u64;
        b.iter(|| {
            cache.put(height, header.clone(), size);
            height += 1;
        })
    });

    c.bench_function("cache_get_hit", |b| {
        let cache = SizeBoundedCache::new(size * 1_000);
        for height in 0..1_000u64 {
            cache.put(height, header.clone(), size);
        }
        let mut height = 0u64;
        b.iter(|| {
            let found = cache.get(black_box(&(height % 1_000)));
            height += 1;
            found
        })
    });
}

criterion_group!(benches, bench_header_hash, bench_cache);
criterion_main!(benches);
