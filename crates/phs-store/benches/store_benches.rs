//! Criterion benchmarks for phs-store.
//!
//! Covers: flushing a pending batch into RocksDB and cached vs. disk reads.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use tempfile::TempDir;

use phs_core::chain_index::MemoryChainIndex;
use phs_core::genesis::genesis_header;
use phs_core::types::{Hash256, HashHeightPair, ProvenBlockHeader};

use phs_store::repository::RocksHeaderRepository;
use phs_store::store::ProvenHeaderStore;

/// Genesis followed by `len - 1` linked headers.
fn build_headers(len: usize) -> Vec<ProvenBlockHeader> {
    let mut out = vec![genesis_header().clone()];
    while out.len() < len {
        let prev = out[out.len() - 1].clone();
        let next = ProvenBlockHeader {
            prev_hash: prev.hash(),
            timestamp: prev.timestamp + 64,
            nonce: out.len() as u32,
            merkle_proof: vec![Hash256([0xCC; 32]); 4],
            signature: vec![0x30; 72],
            coinstake: vec![0xAB; 180],
            ..prev
        };
        out.push(next);
    }
    out
}

fn open_store(headers: &[ProvenBlockHeader], max_cache_bytes: usize) -> (ProvenHeaderStore, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let hashes: Vec<Hash256> = headers.iter().map(|h| h.hash()).collect();
    let chain = Arc::new(MemoryChainIndex::from_hashes(&hashes).unwrap());
    let repo = Arc::new(RocksHeaderRepository::open(dir.path().join("provenheaders")).unwrap());
    let store = ProvenHeaderStore::new(chain, repo, max_cache_bytes, 5_000);
    store.initialize(HashHeightPair::new(hashes[0], 0)).unwrap();
    (store, dir)
}

fn fill_pending(store: &ProvenHeaderStore, headers: &[ProvenBlockHeader]) {
    for (height, h) in headers.iter().enumerate().skip(1) {
        store
            .add_to_pending(h.clone(), HashHeightPair::new(h.hash(), height as u64))
            .unwrap();
    }
}

fn bench_flush(c: &mut Criterion) {
    let headers = build_headers(1_001);

    c.bench_function("flush_1000_headers", |b| {
        b.iter_batched(
            || {
                let (store, dir) = open_store(&headers, 1 << 24);
                fill_pending(&store, &headers);
                (store, dir)
            },
            |(store, _dir)| black_box(store.flush().unwrap()),
            BatchSize::PerIteration,
        )
    });
}

fn bench_reads(c: &mut Criterion) {
    let headers = build_headers(1_001);

    // Tiny cache: every read goes to RocksDB.
    let (cold, _cold_dir) = open_store(&headers, 1);
    fill_pending(&cold, &headers);
    cold.flush().unwrap();

    let (warm, _warm_dir) = open_store(&headers, 1 << 24);
    fill_pending(&warm, &headers);
    warm.flush().unwrap();

    let mut height = 0u64;
    c.bench_function("get_from_repository", |b| {
        b.iter(|| {
            height = height % 1_000 + 1;
            black_box(cold.get(height).unwrap())
        })
    });

    c.bench_function("get_from_cache", |b| {
        b.iter(|| {
            height = height % 1_000 + 1;
            black_box(warm.get(height).unwrap())
        })
    });

    c.bench_function("get_range_100", |b| {
        b.iter(|| black_box(cold.get_range(black_box(400), 100).unwrap()))
    });
}

criterion_group!(benches, bench_flush, bench_reads);
criterion_main!(benches);
