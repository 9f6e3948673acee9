use crate::Tracker;
use crate::pal::BindingsFacade;

/// Number of record slots a tracker has unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 262_144;

/// Number of slots an insert or lookup may visit unless configured otherwise.
pub const DEFAULT_MAX_PROBES: usize = 64;

/// Builder for creating an instance of [`Tracker`].
///
/// All settings are optional. Every method is a `const fn`, so a configured tracker can be
/// created in a `static` initializer.
///
/// # Examples
///
/// ```
/// use alloc_ledger::Tracker;
///
/// static TRACKER: Tracker = Tracker::builder()
///     .capacity(4096)
///     .max_probes(32)
///     .build();
///
/// TRACKER.record_heap_allocation(0x1000, 64);
/// assert_eq!(TRACKER.total_bytes(), 64);
/// ```
#[derive(Clone, Copy, Debug)]
#[must_use]
pub struct TrackerBuilder {
    pub(crate) capacity: usize,
    pub(crate) max_probes: usize,
    pub(crate) default_categories: bool,
    pub(crate) enabled: bool,
}

impl TrackerBuilder {
    pub(crate) const fn new() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            max_probes: DEFAULT_MAX_PROBES,
            default_categories: true,
            enabled: true,
        }
    }

    /// Sets the number of record slots.
    ///
    /// Storage for all slots is acquired from the operating system when the first allocation
    /// is recorded. Once every slot in the probe window of an address is taken, further
    /// allocations in that window are counted as dropped instead of recorded.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub const fn capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "tracker capacity must be nonzero");
        self.capacity = capacity;
        self
    }

    /// Sets the maximum number of slots visited when inserting or looking up a record.
    ///
    /// Values above the capacity are clamped to the capacity when the tracker is built.
    ///
    /// # Panics
    ///
    /// Panics if `max_probes` is zero.
    pub const fn max_probes(mut self, max_probes: usize) -> Self {
        assert!(max_probes > 0, "tracker probe limit must be nonzero");
        self.max_probes = max_probes;
        self
    }

    /// Skips registering names for the built-in [`categories`][crate::categories].
    ///
    /// All category names are then free to be registered by the application.
    ///
    /// # Examples
    ///
    /// ```
    /// use alloc_ledger::{Tracker, categories};
    ///
    /// let tracker = Tracker::builder().without_default_categories().build();
    ///
    /// assert_eq!(tracker.category_name(categories::AUDIO), None);
    /// assert!(tracker.register_category(categories::AUDIO, "Music"));
    /// ```
    pub const fn without_default_categories(mut self) -> Self {
        self.default_categories = false;
        self
    }

    /// Creates the tracker with recording disabled. Use [`Tracker::set_enabled()`] to start.
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Creates the tracker.
    ///
    /// # Panics
    ///
    /// Panics if the record storage for the configured capacity would not be addressable.
    #[must_use]
    pub const fn build(self) -> Tracker {
        Tracker::from_builder(self, BindingsFacade::real())
    }

    #[cfg(test)]
    pub(crate) fn build_with_bindings(self, bindings: BindingsFacade) -> Tracker {
        Tracker::from_builder(self, bindings)
    }
}

impl Default for TrackerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::categories;

    static_assertions::assert_impl_all!(TrackerBuilder: Send, Sync, Copy);

    #[test]
    fn defaults() {
        let tracker = Tracker::builder().build();

        assert_eq!(tracker.capacity(), DEFAULT_CAPACITY);
        assert_eq!(tracker.max_probes(), DEFAULT_MAX_PROBES);
        assert!(tracker.is_enabled());
        assert_eq!(tracker.category_name(categories::GENERAL), Some("General"));
        assert_eq!(tracker.category_name(categories::TEMPORARY), Some("Temporary"));
    }

    #[test]
    fn probe_limit_is_clamped() {
        let tracker = Tracker::builder().capacity(8).max_probes(100).build();

        assert_eq!(tracker.capacity(), 8);
        assert_eq!(tracker.max_probes(), 8);
    }

    #[test]
    fn disabled_tracker_records_nothing() {
        let tracker = Tracker::builder().capacity(16).disabled().build();

        tracker.record_heap_allocation(0x1000, 10);

        assert!(!tracker.is_enabled());
        assert_eq!(tracker.total_bytes(), 0);
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    fn default_categories_can_be_skipped() {
        let tracker = Tracker::builder().without_default_categories().build();

        for id in 0..10 {
            assert_eq!(tracker.category_name(id), None);
        }
    }

    #[test]
    #[should_panic]
    fn zero_capacity_panics() {
        let _builder = Tracker::builder().capacity(0);
    }

    #[test]
    #[should_panic]
    fn zero_probes_panics() {
        let _builder = Tracker::builder().max_probes(0);
    }

    #[test]
    #[should_panic]
    fn unaddressable_capacity_panics() {
        let _tracker = Tracker::builder().capacity(usize::MAX).build();
    }
}
