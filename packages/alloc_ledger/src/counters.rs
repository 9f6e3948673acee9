use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

use crate::category::CategoryName;

const UNREGISTERED: u8 = 0;
const WRITING: u8 = 1;
const REGISTERED: u8 = 2;

/// Point-in-time statistics of one category.
///
/// The four values are read independently, so under concurrent activity they may not
/// describe exactly the same instant.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CategoryStats {
    current_bytes: usize,
    peak_bytes: usize,
    alloc_count: usize,
    free_count: usize,
}

impl CategoryStats {
    /// Bytes currently allocated in the category.
    #[must_use]
    pub const fn current_bytes(&self) -> usize {
        self.current_bytes
    }

    /// Highest value `current_bytes()` has reached since construction or the last reset.
    #[must_use]
    pub const fn peak_bytes(&self) -> usize {
        self.peak_bytes
    }

    /// Number of allocations recorded in the category.
    #[must_use]
    pub const fn alloc_count(&self) -> usize {
        self.alloc_count
    }

    /// Number of deallocations recorded in the category.
    #[must_use]
    pub const fn free_count(&self) -> usize {
        self.free_count
    }
}

/// Statistics and name of a single category.
///
/// Aligned to a cache line so that threads working in different categories do not
/// contend on the same line.
#[repr(align(64))]
pub(crate) struct CategoryCounters {
    current_bytes: AtomicUsize,
    peak_bytes: AtomicUsize,
    alloc_count: AtomicUsize,
    free_count: AtomicUsize,

    registration: AtomicU8,

    // Written once, by the thread that moves `registration` from UNREGISTERED to WRITING.
    name: UnsafeCell<CategoryName>,
}

// SAFETY: All counters are atomics. `name` is only written by the single thread that won the
// UNREGISTERED -> WRITING transition and only read after observing REGISTERED with Acquire
// ordering, which happens-after the write.
unsafe impl Sync for CategoryCounters {}

impl CategoryCounters {
    pub(crate) const fn new() -> Self {
        Self::with_state(UNREGISTERED, CategoryName::EMPTY)
    }

    pub(crate) const fn named(name: &str) -> Self {
        Self::with_state(REGISTERED, CategoryName::new(name))
    }

    const fn with_state(registration: u8, name: CategoryName) -> Self {
        Self {
            current_bytes: AtomicUsize::new(0),
            peak_bytes: AtomicUsize::new(0),
            alloc_count: AtomicUsize::new(0),
            free_count: AtomicUsize::new(0),
            registration: AtomicU8::new(registration),
            name: UnsafeCell::new(name),
        }
    }

    #[inline]
    pub(crate) fn record_allocation(&self, size: usize) {
        self.alloc_count.fetch_add(1, Ordering::Relaxed);

        let previous = self.current_bytes.fetch_add(size, Ordering::Relaxed);
        self.peak_bytes
            .fetch_max(previous.wrapping_add(size), Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_deallocation(&self, size: usize) {
        self.free_count.fetch_add(1, Ordering::Relaxed);
        saturating_sub(&self.current_bytes, size);
    }

    /// Reverses `record_deallocation()` for an allocation that turned out to still be alive.
    #[inline]
    pub(crate) fn restore_allocation(&self, size: usize) {
        saturating_sub(&self.free_count, 1);

        let previous = self.current_bytes.fetch_add(size, Ordering::Relaxed);
        self.peak_bytes
            .fetch_max(previous.wrapping_add(size), Ordering::Relaxed);
    }

    /// Reverses only the free count of `record_deallocation()`.
    #[inline]
    pub(crate) fn cancel_deallocation(&self) {
        saturating_sub(&self.free_count, 1);
    }

    /// Assigns the name unless some name has already been assigned.
    ///
    /// Returns whether this call assigned the name.
    pub(crate) fn register(&self, name: &str) -> bool {
        if self
            .registration
            .compare_exchange(UNREGISTERED, WRITING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }

        // SAFETY: We won the UNREGISTERED -> WRITING transition, so nobody else writes the
        // name and nobody reads it until we publish REGISTERED below.
        unsafe {
            *self.name.get() = CategoryName::new(name);
        }

        self.registration.store(REGISTERED, Ordering::Release);
        true
    }

    pub(crate) fn name(&self) -> Option<&str> {
        if self.registration.load(Ordering::Acquire) != REGISTERED {
            return None;
        }

        // SAFETY: REGISTERED is terminal and was stored with Release after the name was
        // written, so the name is fully written and will never be written again.
        Some(unsafe { &*self.name.get() }.as_str())
    }

    pub(crate) fn current_bytes(&self) -> usize {
        self.current_bytes.load(Ordering::Relaxed)
    }

    pub(crate) fn peak_bytes(&self) -> usize {
        self.peak_bytes.load(Ordering::Relaxed)
    }

    pub(crate) fn alloc_count(&self) -> usize {
        self.alloc_count.load(Ordering::Relaxed)
    }

    pub(crate) fn free_count(&self) -> usize {
        self.free_count.load(Ordering::Relaxed)
    }

    pub(crate) fn stats(&self) -> CategoryStats {
        CategoryStats {
            current_bytes: self.current_bytes(),
            peak_bytes: self.peak_bytes(),
            alloc_count: self.alloc_count(),
            free_count: self.free_count(),
        }
    }

    /// Zeroes the statistics. The name is kept.
    pub(crate) fn reset(&self) {
        self.current_bytes.store(0, Ordering::Relaxed);
        self.peak_bytes.store(0, Ordering::Relaxed);
        self.alloc_count.store(0, Ordering::Relaxed);
        self.free_count.store(0, Ordering::Relaxed);
    }
}

impl fmt::Debug for CategoryCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CategoryCounters")
            .field("name", &self.name())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Process-wide totals plus the enabled flag.
#[derive(Debug)]
#[repr(align(64))]
pub(crate) struct GlobalCounters {
    total_bytes: AtomicUsize,
    peak_bytes: AtomicUsize,
    active_count: AtomicUsize,
    dropped_count: AtomicUsize,
    enabled: AtomicBool,
}

impl GlobalCounters {
    pub(crate) const fn new(enabled: bool) -> Self {
        Self {
            total_bytes: AtomicUsize::new(0),
            peak_bytes: AtomicUsize::new(0),
            active_count: AtomicUsize::new(0),
            dropped_count: AtomicUsize::new(0),
            enabled: AtomicBool::new(enabled),
        }
    }

    #[inline]
    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_allocation(&self, size: usize) {
        self.active_count.fetch_add(1, Ordering::Relaxed);

        let previous = self.total_bytes.fetch_add(size, Ordering::Relaxed);
        self.peak_bytes
            .fetch_max(previous.wrapping_add(size), Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_deallocation(&self, size: usize) {
        saturating_sub(&self.total_bytes, size);
        saturating_sub(&self.active_count, 1);
    }

    #[cold]
    pub(crate) fn record_dropped(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn total_bytes(&self) -> usize {
        self.total_bytes.load(Ordering::Relaxed)
    }

    pub(crate) fn peak_bytes(&self) -> usize {
        self.peak_bytes.load(Ordering::Relaxed)
    }

    pub(crate) fn active_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    pub(crate) fn dropped_count(&self) -> usize {
        self.dropped_count.load(Ordering::Relaxed)
    }

    /// Zeroes every counter. The enabled flag is left alone.
    pub(crate) fn reset(&self) {
        self.total_bytes.store(0, Ordering::Relaxed);
        self.peak_bytes.store(0, Ordering::Relaxed);
        self.active_count.store(0, Ordering::Relaxed);
        self.dropped_count.store(0, Ordering::Relaxed);
    }
}

#[inline]
fn saturating_sub(counter: &AtomicUsize, amount: usize) {
    // The closure never returns None, so the update always succeeds.
    _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |value| {
        Some(value.saturating_sub(amount))
    });
}
