//! Criterion micro-benchmarks for slot encoding, decoding and overflow churn.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use wisp_core::codec::{compress_with, decode, encode, expand_with, release};
use wisp_core::{CompressionMode, DefaultCompression, GlobalMask, OverflowTable, TableOnly};
use wisp_test_utils::fixtures::AddressPool;

/// Benchmark: compress 1K aligned addresses against a private mask.
fn bench_compress_aligned_1k(c: &mut Criterion) {
    let pool = AddressPool::new(16 * 1024);
    let addrs = pool.aligned(1024);
    let mask = GlobalMask::new();

    c.bench_function("compress_aligned_1k", |b| {
        b.iter(|| {
            for &addr in &addrs {
                let bits = compress_with(&mask, 3, CompressionMode::Checked, addr);
                black_box(bits);
            }
        });
    });
}

/// Benchmark: expand 1K direct slots.
fn bench_expand_aligned_1k(c: &mut Criterion) {
    let pool = AddressPool::new(16 * 1024);
    let mask = GlobalMask::new();
    let bits: Vec<_> = pool
        .aligned(1024)
        .into_iter()
        .filter_map(|addr| compress_with(&mask, 3, CompressionMode::Checked, addr))
        .collect();

    c.bench_function("expand_aligned_1k", |b| {
        b.iter(|| {
            for &slot in &bits {
                black_box(expand_with(&mask, 3, slot));
            }
        });
    });
}

/// Benchmark: encode then release 256 odd addresses through the global table.
fn bench_spill_release_256(c: &mut Criterion) {
    let pool = AddressPool::new(1024);
    let addrs = pool.misaligned(256);

    c.bench_function("spill_release_256", |b| {
        b.iter(|| {
            let slots: Vec<_> = addrs
                .iter()
                .map(|&addr| encode::<DefaultCompression>(addr))
                .collect();
            for &slot in &slots {
                black_box(decode::<DefaultCompression>(slot));
                release::<DefaultCompression>(slot);
            }
        });
    });
}

/// Benchmark: table-only round trips, every address through the table.
fn bench_table_only_round_trip_256(c: &mut Criterion) {
    let pool = AddressPool::new(8 * 1024);
    let addrs = pool.aligned(256);

    c.bench_function("table_only_round_trip_256", |b| {
        b.iter(|| {
            for &addr in &addrs {
                let slot = encode::<TableOnly>(addr);
                black_box(decode::<TableOnly>(slot));
                release::<TableOnly>(slot);
            }
        });
    });
}

/// Benchmark: insert and remove on a private table with holes.
fn bench_overflow_table_churn(c: &mut Criterion) {
    c.bench_function("overflow_table_churn_1k", |b| {
        b.iter(|| {
            let mut table = OverflowTable::new();
            let indices: Vec<u32> = (1..=1024usize)
                .filter_map(|addr| table.insert(addr * 2 + 1).ok())
                .collect();
            for &index in indices.iter().step_by(2) {
                table.remove(index);
            }
            for addr in 0..512usize {
                black_box(table.insert(addr * 4 + 1).ok());
            }
            black_box(table.live());
        });
    });
}

criterion_group!(
    benches,
    bench_compress_aligned_1k,
    bench_expand_aligned_1k,
    bench_spill_release_256,
    bench_table_only_round_trip_256,
    bench_overflow_table_churn
);
criterion_main!(benches);
