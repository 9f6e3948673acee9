//! Thread safety integration tests for `alloc_ledger`.
//!
//! These tests verify that the public API types can be shared and moved between threads
//! and that concurrent recording keeps the statistics consistent.

use std::sync::Arc;
use std::thread;

use alloc_ledger::{AllocationKind, CategoryId, Tracker, categories};

static_assertions::assert_impl_all!(Tracker: Send, Sync);
static_assertions::assert_impl_all!(alloc_ledger::TrackerBuilder: Send, Sync);
static_assertions::assert_impl_all!(alloc_ledger::AllocationRecord: Send, Sync);
static_assertions::assert_impl_all!(alloc_ledger::Error: Send, Sync);

#[test]
fn builder_can_be_moved_between_threads() {
    let builder = Tracker::builder().capacity(256);

    let tracker = thread::spawn(move || builder.build()).join().unwrap();

    assert_eq!(tracker.capacity(), 256);
}

#[test]
fn tracker_can_be_shared_between_threads() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 1_000;

    let tracker = Arc::new(Tracker::builder().capacity(32_768).build());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let tracker = Arc::clone(&tracker);

            thread::spawn(move || {
                let base = (t + 1) << 24;
                let category = CategoryId::try_from(t % 2).unwrap();

                for i in 0..PER_THREAD {
                    tracker.record_allocation(base + i * 64, 100, category, AllocationKind::Heap);
                }

                for i in 0..PER_THREAD / 4 {
                    tracker.record_deallocation(base + i * 64);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let live = THREADS * (PER_THREAD - PER_THREAD / 4);

    assert_eq!(tracker.dropped_count(), 0);
    assert_eq!(tracker.active_count(), live);
    assert_eq!(tracker.count_active_allocations(), live);
    assert_eq!(tracker.total_bytes(), live * 100);
    assert!(tracker.peak_bytes() >= tracker.total_bytes());

    let general = tracker.category_stats(categories::GENERAL).unwrap();
    let graphics = tracker.category_stats(categories::GRAPHICS).unwrap();
    assert_eq!(general.alloc_count() + graphics.alloc_count(), THREADS * PER_THREAD);
    assert_eq!(general.current_bytes() + graphics.current_bytes(), live * 100);
}

#[test]
fn reporting_while_recording_does_not_block_recording() {
    let tracker = Arc::new(Tracker::builder().capacity(8192).build());

    let reporter = {
        let tracker = Arc::clone(&tracker);

        thread::spawn(move || {
            let mut buffer = [0_u8; 2048];

            for _ in 0..200 {
                let len = tracker.generate_report(&mut buffer);
                assert!(len > 0);

                let mut seen = 0_usize;
                tracker.for_each_allocation(|_| seen += 1);
                assert!(seen <= tracker.capacity());
            }
        })
    };

    for round in 0..50 {
        for i in 1..=100 {
            tracker.record_heap_allocation(i * 32, round + 1);
        }

        for i in 1..=100 {
            tracker.record_deallocation(i * 32);
        }
    }

    reporter.join().unwrap();

    assert_eq!(tracker.active_count(), 0);
    assert_eq!(tracker.total_bytes(), 0);
}
