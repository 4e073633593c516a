//! Criterion micro-benchmarks for owning, shared, weak and array handles.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use wisp_bench::{build_list, drop_list, fan_out, sum_list};
use wisp_ptr::{CompactArray, CowShared, Shared, UniquePtr};

/// Benchmark: allocate, read and free one owning pointer.
fn bench_unique_new_deref(c: &mut Criterion) {
    c.bench_function("unique_new_deref", |b| {
        b.iter(|| {
            let p = UniquePtr::new(black_box(7u64));
            black_box(*p);
        });
    });
}

/// Benchmark: walk a 10K-node list linked by compressed pointers.
fn bench_list_walk_10k(c: &mut Criterion) {
    let head = build_list(10_000);

    c.bench_function("list_walk_10k", |b| {
        b.iter(|| {
            black_box(sum_list(&head));
        });
    });

    drop_list(head);
}

/// Benchmark: clone and drop a shared handle.
fn bench_shared_clone_drop(c: &mut Criterion) {
    let root = Shared::new(1u64);

    c.bench_function("shared_clone_drop", |b| {
        b.iter(|| {
            let copy = root.clone();
            black_box(&copy);
        });
    });
}

/// Benchmark: upgrade a weak handle while the group is alive.
fn bench_weak_upgrade(c: &mut Criterion) {
    let (strongs, weaks) = fan_out(0, 1);

    c.bench_function("weak_upgrade", |b| {
        b.iter(|| {
            let pinned = weaks[0].upgrade();
            black_box(pinned.is_some());
        });
    });

    drop(weaks);
    drop(strongs);
}

/// Benchmark: drop the last strong handle of a group with 64 weak handles.
fn bench_invalidate_64_weak(c: &mut Criterion) {
    c.bench_function("invalidate_64_weak", |b| {
        b.iter(|| {
            let (strongs, weaks) = fan_out(0, 64);
            drop(strongs);
            black_box(weaks.iter().filter(|w| w.is_present()).count());
        });
    });
}

/// Benchmark: copy-on-write detach of a shared 1K vector.
fn bench_cow_make_mut_1k(c: &mut Criterion) {
    let base = CowShared::new(vec![0u32; 1024]);

    c.bench_function("cow_make_mut_1k", |b| {
        b.iter(|| {
            let mut mine = base.clone();
            mine.make_mut()[0] = 1;
            black_box(mine[0]);
        });
    });
}

/// Benchmark: grow and shrink a compact array.
fn bench_compact_resize(c: &mut Criterion) {
    c.bench_function("compact_resize_4k", |b| {
        b.iter(|| {
            let mut a: CompactArray<u64> = CompactArray::new();
            a.resize(4096);
            a.resize(16);
            black_box(a.len());
        });
    });
}

criterion_group!(
    benches,
    bench_unique_new_deref,
    bench_list_walk_10k,
    bench_shared_clone_drop,
    bench_weak_upgrade,
    bench_invalidate_64_weak,
    bench_cow_make_mut_1k,
    bench_compact_resize
);
criterion_main!(benches);
