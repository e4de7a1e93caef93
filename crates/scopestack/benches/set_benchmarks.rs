//! Ownership set and frame benchmarks
//!
//! Compares the tree and array sets on insert/lookup/remove, and measures a
//! whole push-allocate-pop frame cycle against raw malloc/free.

use std::hint::black_box;
use std::ptr::NonNull;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use scopestack::{Address, ArraySet, BaseAllocator, FrameKind, OwnershipSet, ScopeStack, SystemAllocator, TreeSet};

/// Fabricated, never dereferenced addresses in ascending heap-like order
fn addresses(count: usize) -> Vec<Address> {
    (1..=count)
        .filter_map(|i| NonNull::new((i * 64) as *mut u8).map(Address::new))
        .collect()
}

/// Insert then remove `count` ascending addresses
fn bench_insert_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_remove");

    for count in [4usize, 16, 64, 256] {
        let addrs = addresses(count);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("tree", count), &addrs, |b, addrs| {
            b.iter(|| {
                let mut set = TreeSet::new();
                for &addr in addrs {
                    set.insert(addr).unwrap();
                }
                for &addr in addrs.iter().rev() {
                    black_box(set.remove(addr));
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("array", count), &addrs, |b, addrs| {
            b.iter(|| {
                let mut set = ArraySet::try_with_capacity(addrs.len()).unwrap();
                for &addr in addrs {
                    set.insert(addr).unwrap();
                }
                for &addr in addrs.iter().rev() {
                    black_box(set.remove(addr));
                }
            });
        });
    }

    group.finish();
}

/// Membership lookups in a populated set
fn bench_contains(c: &mut Criterion) {
    let mut group = c.benchmark_group("contains");

    for count in [16usize, 256, 4096] {
        let addrs = addresses(count);
        let mut tree = TreeSet::new();
        let mut array = ArraySet::try_with_capacity(count).unwrap();
        for &addr in &addrs {
            tree.insert(addr).unwrap();
            array.insert(addr).unwrap();
        }
        let needle = addrs[count / 2];

        group.bench_function(BenchmarkId::new("tree", count), |b| {
            b.iter(|| black_box(tree.contains(black_box(needle))));
        });
        group.bench_function(BenchmarkId::new("array", count), |b| {
            b.iter(|| black_box(array.contains(black_box(needle))));
        });
    }

    group.finish();
}

/// Push a frame, allocate into it, pop it
fn bench_frame_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_cycle");
    group.throughput(Throughput::Elements(16));

    for (name, kind) in [("tree", FrameKind::Tree), ("array", FrameKind::array(16))] {
        group.bench_function(name, |b| {
            let stack = ScopeStack::new(SystemAllocator::new());
            b.iter(|| {
                let _frame = stack.push_frame(kind);
                for _ in 0..16 {
                    black_box(stack.allocate(64).unwrap());
                }
            });
        });
    }

    // System allocator (baseline)
    group.bench_function("malloc_free", |b| {
        let alloc = SystemAllocator::new();
        b.iter(|| {
            let mut ptrs = Vec::with_capacity(16);
            for _ in 0..16 {
                ptrs.push(alloc.acquire(64).unwrap());
            }
            for ptr in ptrs {
                unsafe { alloc.release(black_box(ptr)) };
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_insert_remove, bench_contains, bench_frame_cycle);
criterion_main!(benches);
