//! Integration tests for `alloc_ledger` installed as the global allocator.
//!
//! Tests run in parallel and every allocation of the test binary is recorded, so each test
//! attributes its own allocations to a category that no other test uses and only asserts on
//! that category.

#![cfg(not(miri))] // Miri replaces the global allocator, so cannot be used here.

use std::fs;
use std::hint::black_box;
use std::thread;

use alloc_ledger::{CategoryId, CategoryScope, Tracker, TrackingAllocator};

static TRACKER: Tracker = Tracker::new();

#[global_allocator]
static ALLOCATOR: TrackingAllocator<std::alloc::System> = TrackingAllocator::system(&TRACKER);

const VEC_CATEGORY: CategoryId = 40;
const GROWTH_CATEGORY: CategoryId = 41;
const LISTING_CATEGORY: CategoryId = 42;
const THREADS_FIRST_CATEGORY: CategoryId = 50;
const REPORT_CATEGORY: CategoryId = 43;

#[test]
fn vec_is_attributed_to_scope_category() {
    let data = {
        let _scope = CategoryScope::enter(VEC_CATEGORY);
        black_box(vec![0_u64; 1000])
    };

    assert_eq!(TRACKER.category_bytes(VEC_CATEGORY), 8000);
    assert_eq!(TRACKER.category_alloc_count(VEC_CATEGORY), 1);

    drop(data);

    assert_eq!(TRACKER.category_bytes(VEC_CATEGORY), 0);
    assert_eq!(TRACKER.category_free_count(VEC_CATEGORY), 1);
    assert_eq!(TRACKER.category_peak_bytes(VEC_CATEGORY), 8000);
}

#[test]
fn growing_vec_keeps_its_category() {
    let mut data = {
        let _scope = CategoryScope::enter(GROWTH_CATEGORY);
        Vec::<u32>::with_capacity(4)
    };

    // Reallocations happen outside the scope but stay in the original category.
    for i in 0..10_000 {
        data.push(black_box(i));
    }

    let expected = data.capacity() * size_of::<u32>();
    assert_eq!(TRACKER.category_bytes(GROWTH_CATEGORY), expected);

    drop(data);

    assert_eq!(TRACKER.category_bytes(GROWTH_CATEGORY), 0);
}

#[test]
fn live_allocation_is_listed() {
    let data = {
        let _scope = CategoryScope::enter(LISTING_CATEGORY);
        black_box(vec![7_u8; 333])
    };
    let address = data.as_ptr().addr();

    let mut found = None;
    TRACKER.for_each_allocation(|record| {
        if record.address() == address {
            found = Some(record);
        }
    });

    let record = found.expect("live allocation must be listed");
    assert_eq!(record.size(), 333);
    assert_eq!(record.category(), LISTING_CATEGORY);

    drop(data);
}

#[test]
fn allocations_on_many_threads_are_attributed_per_thread() {
    const THREADS: CategoryId = 4;
    const ALLOCATIONS: usize = 100;

    thread::scope(|s| {
        for offset in 0..THREADS {
            s.spawn(move || {
                let _scope = CategoryScope::enter(THREADS_FIRST_CATEGORY + offset);

                let boxes: Vec<_> = (0..ALLOCATIONS).map(|i| black_box(Box::new(i))).collect();
                drop(boxes);
            });
        }
    });

    for offset in 0..THREADS {
        let category = THREADS_FIRST_CATEGORY + offset;

        // The boxes plus the growth steps of the vector holding them.
        assert!(TRACKER.category_alloc_count(category) > ALLOCATIONS);
        assert_eq!(
            TRACKER.category_alloc_count(category),
            TRACKER.category_free_count(category)
        );
        assert_eq!(TRACKER.category_bytes(category), 0);
    }
}

#[test]
fn report_file_contains_live_allocation() {
    assert!(TRACKER.register_category(REPORT_CATEGORY, "ReportTest"));

    let data = {
        let _scope = CategoryScope::enter(REPORT_CATEGORY);
        black_box(vec![1_u8; 4321])
    };

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.txt");

    let listed = TRACKER.write_report_to_file(&path).unwrap();
    assert!(listed >= 1);

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("[ReportTest] Current: 4321 bytes"));
    assert!(text.contains(&format!(
        "Address: 0x{:0width$X}, Size: 4321, Tag: ReportTest\n",
        data.as_ptr().addr(),
        width = size_of::<usize>() * 2
    )));

    drop(data);
}

#[test]
fn counters_agree_with_table_scan() {
    // Other tests allocate concurrently, so only the relationships that always hold are checked.
    assert!(TRACKER.is_operational());
    assert!(TRACKER.peak_bytes() >= TRACKER.total_bytes());
    assert!(TRACKER.count_active_allocations() > 0);
}
