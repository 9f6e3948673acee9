#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Lock-free bookkeeping of live allocations, attributed to caller-chosen categories.
//!
//! This package records every allocation and deallocation it is told about, keeps totals,
//! peaks and per-category statistics, and can list every live allocation on demand. The
//! recording path is lock-free, never allocates and never panics, so it can be called from
//! inside an allocator, including the process-wide one.
//!
//! The core functionality includes:
//! - [`Tracker`] - Records allocations and keeps statistics about them
//! - [`TrackerBuilder`] - Configures the capacity and behavior of a tracker
//! - [`TrackingAllocator`] - A Rust memory allocator wrapper that feeds a tracker
//! - [`CategoryScope`] - Attributes the allocations of a thread to a category
//!
//! # Simple usage
//!
//! Any allocator can report to a tracker directly:
//!
//! ```
//! use alloc_ledger::{AllocationKind, Tracker, categories};
//!
//! static TRACKER: Tracker = Tracker::new();
//!
//! TRACKER.record_allocation(0x1000, 4096, categories::GRAPHICS, AllocationKind::Pool);
//! assert_eq!(TRACKER.category_bytes(categories::GRAPHICS), 4096);
//!
//! TRACKER.record_deallocation(0x1000);
//! assert_eq!(TRACKER.total_bytes(), 0);
//! ```
//!
//! # Tracking the global allocator
//!
//! ```
//! use alloc_ledger::{CategoryScope, Tracker, TrackingAllocator, categories};
//!
//! static TRACKER: Tracker = Tracker::new();
//!
//! #[global_allocator]
//! static ALLOCATOR: TrackingAllocator<std::alloc::System> = TrackingAllocator::system(&TRACKER);
//!
//! fn main() {
//!     let samples = {
//!         let _scope = CategoryScope::enter(categories::AUDIO);
//!         vec![0_i16; 48_000]
//!     };
//!
//!     assert!(TRACKER.category_bytes(categories::AUDIO) >= 96_000);
//!     drop(samples);
//!
//!     TRACKER.print_to_stdout();
//! }
//! ```
//!
//! # Capacity
//!
//! A tracker has a fixed number of record slots, allocated from the operating system when the
//! first allocation is recorded. Allocations that find no free slot are not recorded and are
//! counted in [`Tracker::dropped_count()`] instead. Erasing an allocation leaves a tombstone in
//! its slot, which later allocations reuse and [`Tracker::reset()`] clears.
//!
//! # Accuracy
//!
//! All statistics are updated with independent atomic operations. Under concurrent activity
//! a reader may observe, for example, a total that already includes an allocation while the
//! active count does not yet. [`Tracker::reset()`] racing with recording is best-effort.
//!
//! # Miri compatibility
//!
//! Miri replaces the global allocator with its own logic, so [`TrackingAllocator`] cannot be
//! installed under Miri. The [`Tracker`] itself works under Miri.

mod allocator;
mod builder;
mod category;
mod counters;
mod error;
mod kind;
mod pal;
mod record;
mod report;
mod spinlock;
mod table;
mod tracker;

pub use allocator::*;
pub use builder::*;
pub use category::{CategoryId, MAX_CATEGORIES, MAX_CATEGORY_NAME_LEN, categories};
pub use counters::CategoryStats;
pub use error::Error;
pub use kind::AllocationKind;
pub use record::AllocationRecord;
pub use tracker::*;
