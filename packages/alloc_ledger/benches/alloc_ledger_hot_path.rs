//! Benchmarks of the recording path of `alloc_ledger`.
//!
//! The recording path runs inside every allocation, so its cost is what matters most.

#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::sync::atomic::{AtomicUsize, Ordering};

use alloc_ledger::{AllocationKind, Tracker, categories};
use criterion::{Criterion, criterion_group, criterion_main};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

static TRACKER: Tracker = Tracker::new();

// Distinct addresses for every iteration, spaced like real allocations.
static NEXT_ADDRESS: AtomicUsize = AtomicUsize::new(0x1000_0000);

fn next_address() -> usize {
    NEXT_ADDRESS.fetch_add(64, Ordering::Relaxed)
}

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc_ledger");

    group.bench_function("record_then_erase", |b| {
        b.iter(|| {
            let address = next_address();

            TRACKER.record_allocation(
                black_box(address),
                black_box(128),
                categories::GENERAL,
                AllocationKind::Heap,
            );
            TRACKER.record_deallocation(black_box(address));
        });
    });

    group.bench_function("erase_unknown", |b| {
        b.iter(|| {
            TRACKER.record_deallocation(black_box(0xFFFF_0000));
        });
    });

    TRACKER.set_enabled(false);
    group.bench_function("record_while_disabled", |b| {
        b.iter(|| {
            TRACKER.record_heap_allocation(black_box(0x2000), black_box(64));
        });
    });
    TRACKER.set_enabled(true);

    group.bench_function("generate_report", |b| {
        let mut buffer = [0_u8; 4096];

        b.iter(|| black_box(TRACKER.generate_report(&mut buffer)));
    });

    group.finish();
}
