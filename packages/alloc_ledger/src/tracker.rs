use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::ops::ControlFlow;
use std::path::Path;

use tracing::{debug, warn};

use crate::category::DEFAULT_CATEGORY_NAMES;
use crate::counters::{CategoryCounters, GlobalCounters};
use crate::error::Result;
use crate::pal::BindingsFacade;
use crate::report::{self, ReportWriter};
use crate::spinlock::Spinlock;
use crate::table::{InsertOutcome, RecordTable, is_reserved_address};
use crate::{
    AllocationKind, AllocationRecord, CategoryId, CategoryStats, Error, MAX_CATEGORIES,
    TrackerBuilder, categories,
};

/// Most allocation lines `write_report_to_file()` lists before it stops.
pub const MAX_LISTED_ALLOCATIONS: usize = 10_000;

const STDOUT_REPORT_BUFFER_LEN: usize = 4096;
const FILE_REPORT_BUFFER_LEN: usize = 8192;
const LINE_BUFFER_LEN: usize = 128;

/// Records live allocations and keeps per-category statistics about them.
///
/// Recording and erasing allocations is lock-free, never allocates and never panics, which
/// makes it safe to call from inside an allocator. Reporting, iteration and reset are
/// serialized against each other by an internal lock but never block the recording path.
///
/// A tracker can be created in a `static` because its constructors are `const`. Storage for
/// the records is obtained directly from the operating system on first use, bypassing the
/// global allocator. If the operating system refuses, the tracker permanently stops
/// recording and [`is_operational()`][Self::is_operational] returns `false`.
///
/// # Examples
///
/// ```
/// use alloc_ledger::{AllocationKind, Tracker, categories};
///
/// let tracker = Tracker::builder().capacity(1024).build();
///
/// tracker.record_allocation(0x1000, 128, categories::NETWORK, AllocationKind::Heap);
/// assert_eq!(tracker.category_bytes(categories::NETWORK), 128);
/// assert_eq!(tracker.active_count(), 1);
///
/// tracker.record_deallocation(0x1000);
/// assert_eq!(tracker.category_bytes(categories::NETWORK), 0);
/// assert_eq!(tracker.active_count(), 0);
/// ```
///
/// # Thread safety
///
/// The tracker is thread-safe ([`Sync`]). Any number of threads may record and erase
/// allocations concurrently.
pub struct Tracker {
    totals: GlobalCounters,
    categories: [CategoryCounters; MAX_CATEGORIES],
    table: RecordTable,

    // Serializes the cold paths. Never taken by the recording path.
    report_lock: Spinlock,
}

impl Tracker {
    /// Creates a tracker with the default configuration.
    ///
    /// See [`builder()`][Self::builder] to customize it.
    #[must_use]
    pub const fn new() -> Self {
        Self::builder().build()
    }

    /// Starts configuring a new tracker.
    pub const fn builder() -> TrackerBuilder {
        TrackerBuilder::new()
    }

    #[expect(
        clippy::indexing_slicing,
        reason = "index stays below DEFAULT_CATEGORY_NAMES.len(), which is below MAX_CATEGORIES"
    )]
    pub(crate) const fn from_builder(builder: TrackerBuilder, bindings: BindingsFacade) -> Self {
        let mut categories = [const { CategoryCounters::new() }; MAX_CATEGORIES];

        if builder.default_categories {
            let mut index = 0;

            while index < DEFAULT_CATEGORY_NAMES.len() {
                categories[index] = CategoryCounters::named(DEFAULT_CATEGORY_NAMES[index]);
                index = index.wrapping_add(1);
            }
        }

        Self {
            totals: GlobalCounters::new(builder.enabled),
            categories,
            table: RecordTable::new(builder.capacity, builder.max_probes, bindings),
            report_lock: Spinlock::new(),
        }
    }

    /// Records a live allocation.
    ///
    /// Addresses `0`, `1` and `2` are ignored. If the table has no free slot within the probe
    /// window of the address, the allocation is not recorded and
    /// [`dropped_count()`][Self::dropped_count] is incremented instead.
    ///
    /// Categories at or above [`MAX_CATEGORIES`] are recorded but have no statistics.
    #[inline]
    pub fn record_allocation(
        &self,
        address: usize,
        size: usize,
        category: CategoryId,
        kind: AllocationKind,
    ) {
        if !self.totals.is_enabled() || is_reserved_address(address) {
            return;
        }

        match self.table.insert(address, size, category, kind) {
            InsertOutcome::Recorded => {
                self.totals.record_allocation(size);

                if let Some(counters) = self.category(category) {
                    counters.record_allocation(size);
                }
            }
            InsertOutcome::Dropped => self.totals.record_dropped(),
            InsertOutcome::Unavailable => {}
        }
    }

    /// Records a live heap allocation in the [`GENERAL`][categories::GENERAL] category.
    #[inline]
    pub fn record_heap_allocation(&self, address: usize, size: usize) {
        self.record_allocation(address, size, categories::GENERAL, AllocationKind::Heap);
    }

    /// Records that the allocation at `address` no longer exists.
    ///
    /// Unknown addresses are ignored. This includes allocations that were dropped because the
    /// table was full and allocations that were already erased, so a double free is harmless.
    #[inline]
    pub fn record_deallocation(&self, address: usize) {
        _ = self.take_record(address);
    }

    /// Erases the record of `address` and returns it, updating the statistics.
    #[inline]
    pub(crate) fn take_record(&self, address: usize) -> Option<AllocationRecord> {
        if !self.totals.is_enabled() || is_reserved_address(address) {
            return None;
        }

        let record = self.table.remove(address)?;

        self.totals.record_deallocation(record.size());

        if let Some(counters) = self.category(record.category()) {
            counters.record_deallocation(record.size());
        }

        Some(record)
    }

    /// Puts back a record from `take_record()` whose allocation is still alive.
    ///
    /// The allocation and free counts end up as if the record had never been taken. If the
    /// probe window has filled up meanwhile, the allocation is counted as dropped instead.
    pub(crate) fn restore_record(&self, record: AllocationRecord) {
        let counters = self.category(record.category());

        match self.table.insert(
            record.address(),
            record.size(),
            record.category(),
            record.kind(),
        ) {
            InsertOutcome::Recorded => {
                self.totals.record_allocation(record.size());

                if let Some(counters) = counters {
                    counters.restore_allocation(record.size());
                }
            }
            InsertOutcome::Dropped => {
                self.totals.record_dropped();

                if let Some(counters) = counters {
                    counters.cancel_deallocation();
                }
            }
            InsertOutcome::Unavailable => {}
        }
    }

    #[inline]
    fn category(&self, id: CategoryId) -> Option<&CategoryCounters> {
        self.categories.get(usize::from(id))
    }

    /// Assigns a display name to a category.
    ///
    /// The first name assigned to a category is kept. Later calls, and calls with a category at
    /// or above [`MAX_CATEGORIES`], are ignored and return `false`. Names longer than
    /// [`MAX_CATEGORY_NAME_LEN`][crate::MAX_CATEGORY_NAME_LEN]` - 1` bytes are truncated.
    pub fn register_category(&self, id: CategoryId, name: &str) -> bool {
        self.category(id)
            .is_some_and(|counters| counters.register(name))
    }

    /// The name assigned to a category, if any.
    #[must_use]
    pub fn category_name(&self, id: CategoryId) -> Option<&str> {
        self.category(id).and_then(CategoryCounters::name)
    }

    /// Enables or disables recording. While disabled, both allocations and deallocations are
    /// ignored.
    ///
    /// An allocation freed while disabled keeps its record until [`reset()`][Self::reset]. If
    /// its address is handed out again after recording is re-enabled, the table holds two
    /// records for that address and the next deallocation there erases only one of them,
    /// possibly the stale one.
    pub fn set_enabled(&self, enabled: bool) {
        self.totals.set_enabled(enabled);
    }

    /// Whether recording is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.totals.is_enabled()
    }

    /// Whether the tracker can record allocations.
    ///
    /// Only `false` if the operating system refused to provide storage for the records, after
    /// which the tracker ignores all allocations.
    #[must_use]
    pub fn is_operational(&self) -> bool {
        self.table.is_operational()
    }

    /// Number of record slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Maximum number of slots visited per insert or lookup.
    #[must_use]
    pub fn max_probes(&self) -> usize {
        self.table.max_probes()
    }

    /// Sum of the sizes of all recorded live allocations.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.totals.total_bytes()
    }

    /// Highest value [`total_bytes()`][Self::total_bytes] has reached.
    #[must_use]
    pub fn peak_bytes(&self) -> usize {
        self.totals.peak_bytes()
    }

    /// Number of recorded live allocations.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.totals.active_count()
    }

    /// Number of allocations that could not be recorded because the table was full.
    #[must_use]
    pub fn dropped_count(&self) -> usize {
        self.totals.dropped_count()
    }

    /// Bytes currently allocated in a category. Zero for categories without statistics.
    #[must_use]
    pub fn category_bytes(&self, id: CategoryId) -> usize {
        self.category(id).map_or(0, CategoryCounters::current_bytes)
    }

    /// Highest value [`category_bytes()`][Self::category_bytes] has reached for a category.
    #[must_use]
    pub fn category_peak_bytes(&self, id: CategoryId) -> usize {
        self.category(id).map_or(0, CategoryCounters::peak_bytes)
    }

    /// Number of allocations recorded in a category.
    #[must_use]
    pub fn category_alloc_count(&self, id: CategoryId) -> usize {
        self.category(id).map_or(0, CategoryCounters::alloc_count)
    }

    /// Number of deallocations recorded in a category.
    #[must_use]
    pub fn category_free_count(&self, id: CategoryId) -> usize {
        self.category(id).map_or(0, CategoryCounters::free_count)
    }

    /// All statistics of a category, or `None` if the category is at or above
    /// [`MAX_CATEGORIES`].
    #[must_use]
    pub fn category_stats(&self, id: CategoryId) -> Option<CategoryStats> {
        self.category(id).map(CategoryCounters::stats)
    }

    /// Forgets every record and zeroes every statistic. Category names are kept.
    ///
    /// Allocations recorded or erased by other threads while the reset is in progress may or
    /// may not survive it.
    pub fn reset(&self) {
        let _guard = self.report_lock.lock();

        self.table.clear();
        self.totals.reset();

        for counters in &self.categories {
            counters.reset();
        }
    }

    /// Writes a human-readable summary into `buffer` and returns its length.
    ///
    /// The text is truncated to `buffer.len() - 1` bytes and followed by a NUL byte. The
    /// returned length excludes the NUL byte. Does not allocate.
    ///
    /// # Examples
    ///
    /// ```
    /// use alloc_ledger::Tracker;
    ///
    /// let tracker = Tracker::builder().capacity(64).build();
    /// tracker.record_heap_allocation(0x1000, 100);
    ///
    /// let mut buffer = [0_u8; 1024];
    /// let len = tracker.generate_report(&mut buffer);
    ///
    /// let text = std::str::from_utf8(&buffer[..len]).unwrap();
    /// assert!(text.contains("Total: 100 bytes"));
    /// ```
    pub fn generate_report(&self, buffer: &mut [u8]) -> usize {
        let _guard = self.report_lock.lock();

        let mut writer = ReportWriter::new(buffer);
        report::write_summary(&mut writer, self);
        writer.finish()
    }

    /// Calls `f` with every recorded live allocation.
    ///
    /// Allocations recorded or erased concurrently may or may not be visited. `f` must not call
    /// [`reset()`][Self::reset], [`generate_report()`][Self::generate_report] or other
    /// reporting methods of the same tracker, as that would deadlock.
    pub fn for_each_allocation(&self, mut f: impl FnMut(AllocationRecord)) {
        let _guard = self.report_lock.lock();

        self.table.for_each(|record| {
            f(record);
            ControlFlow::Continue(())
        });
    }

    /// Counts the recorded live allocations by scanning the table.
    ///
    /// Unlike [`active_count()`][Self::active_count], this does not rely on the counters, so the
    /// two can be compared to validate the bookkeeping.
    #[must_use]
    pub fn count_active_allocations(&self) -> usize {
        let _guard = self.report_lock.lock();
        self.table.count_published()
    }

    /// Prints the summary from [`generate_report()`][Self::generate_report] to stdout.
    #[cfg_attr(test, mutants::skip)] // Too difficult to test stdout output reliably - manually tested.
    pub fn print_to_stdout(&self) {
        let mut buffer = [0_u8; STDOUT_REPORT_BUFFER_LEN];
        let len = self.generate_report(&mut buffer);

        // Nothing useful to do if stdout is gone.
        _ = io::stdout()
            .lock()
            .write_all(buffer.get(..len).unwrap_or_default());
    }

    /// Writes the summary followed by a listing of live allocations to a file.
    ///
    /// At most [`MAX_LISTED_ALLOCATIONS`] allocations are listed. Returns the number listed.
    ///
    /// Unlike the other reporting methods, this allocates, so it must not be called from
    /// inside an allocator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReportFile`] if the file cannot be created or written.
    pub fn write_report_to_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();

        match self.write_report(path) {
            Ok(listed) => {
                debug!(path = %path.display(), listed, "wrote allocation report");
                Ok(listed)
            }
            Err(source) => {
                warn!(path = %path.display(), error = %source, "failed to write allocation report");

                Err(Error::ReportFile {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }

    fn write_report(&self, path: &Path) -> io::Result<usize> {
        let mut file = BufWriter::new(File::create(path)?);

        let mut summary = [0_u8; FILE_REPORT_BUFFER_LEN];
        let len = self.generate_report(&mut summary);
        file.write_all(summary.get(..len).unwrap_or_default())?;

        file.write_all(b"\n--- Active Allocations ---\n")?;

        let mut listed: usize = 0;
        let mut outcome = Ok(());

        {
            let _guard = self.report_lock.lock();

            self.table.for_each(|record| {
                if listed >= MAX_LISTED_ALLOCATIONS {
                    return ControlFlow::Break(());
                }

                let mut line = [0_u8; LINE_BUFFER_LEN];
                let mut writer = ReportWriter::new(&mut line);
                report::write_allocation_line(
                    &mut writer,
                    &record,
                    self.category_name(record.category()),
                );

                if let Err(e) = file.write_all(writer.as_bytes()) {
                    outcome = Err(e);
                    return ControlFlow::Break(());
                }

                listed = listed.wrapping_add(1);
                ControlFlow::Continue(())
            });
        }

        outcome?;

        let mut footer = [0_u8; LINE_BUFFER_LEN];
        let mut writer = ReportWriter::new(&mut footer);
        writer.write_str("\nTotal listed: ");
        writer.write_decimal(listed);
        writer.write_str("\n");
        file.write_all(writer.as_bytes())?;

        file.flush()?;

        Ok(listed)
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("totals", &self.totals)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}
