//! Allocator wrapper that records every allocation in a [`Tracker`].

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;

use crate::{AllocationKind, CategoryId, Tracker, categories};

thread_local! {
    // Const-initialized and without a destructor, so reading it never allocates and keeps
    // working while the thread is being torn down.
    static THREAD_CATEGORY: Cell<CategoryId> = const { Cell::new(categories::GENERAL) };
}

/// The category that [`TrackingAllocator`] attributes allocations on the current thread to.
///
/// [`GENERAL`][categories::GENERAL] unless changed via [`set_thread_category()`] or
/// [`CategoryScope`].
#[must_use]
pub fn thread_category() -> CategoryId {
    THREAD_CATEGORY
        .try_with(Cell::get)
        .unwrap_or(categories::GENERAL)
}

/// Sets the category that [`TrackingAllocator`] attributes allocations on the current thread
/// to and returns the previous one.
///
/// Prefer [`CategoryScope`] when the category should only apply to a block of code.
pub fn set_thread_category(category: CategoryId) -> CategoryId {
    THREAD_CATEGORY
        .try_with(|current| current.replace(category))
        .unwrap_or(categories::GENERAL)
}

/// Attributes allocations on the current thread to a category until dropped, after which the
/// previous category is restored.
///
/// # Examples
///
/// ```
/// use alloc_ledger::{CategoryScope, categories, thread_category};
///
/// {
///     let _scope = CategoryScope::enter(categories::AUDIO);
///     assert_eq!(thread_category(), categories::AUDIO);
/// }
///
/// assert_eq!(thread_category(), categories::GENERAL);
/// ```
///
/// # Thread safety
///
/// The scope affects only the thread that created it and must be dropped on that thread,
/// so it is neither [`Send`] nor [`Sync`].
#[derive(Debug)]
#[must_use = "the category only applies while the scope is alive"]
pub struct CategoryScope {
    previous: CategoryId,

    _not_send: PhantomData<*const ()>,
}

impl CategoryScope {
    /// Switches the current thread to `category`.
    pub fn enter(category: CategoryId) -> Self {
        Self {
            previous: set_thread_category(category),
            _not_send: PhantomData,
        }
    }
}

impl Drop for CategoryScope {
    fn drop(&mut self) {
        set_thread_category(self.previous);
    }
}

/// A memory allocator that records the allocations it makes in a [`Tracker`].
///
/// This allocator wraps any [`GlobalAlloc`] implementation and keeps its allocation behavior.
/// Each successful allocation is recorded under the category of the calling thread (see
/// [`CategoryScope`]) and erased again when it is freed. Reallocations keep the category of
/// the original allocation.
///
/// # Examples
///
/// ```
/// use alloc_ledger::{Tracker, TrackingAllocator};
///
/// static TRACKER: Tracker = Tracker::new();
///
/// #[global_allocator]
/// static ALLOCATOR: TrackingAllocator<std::alloc::System> = TrackingAllocator::system(&TRACKER);
///
/// fn main() {
///     let data = vec![0_u8; 1024];
///     assert!(TRACKER.total_bytes() >= 1024);
///     drop(data);
/// }
/// ```
pub struct TrackingAllocator<A: GlobalAlloc> {
    inner: A,
    tracker: &'static Tracker,
}

impl<A: GlobalAlloc> fmt::Debug for TrackingAllocator<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingAllocator")
            .field("inner", &"<allocator>")
            .field("tracker", self.tracker)
            .finish()
    }
}

impl TrackingAllocator<System> {
    /// Creates a tracking allocator on top of the system allocator.
    #[must_use]
    #[inline]
    pub const fn system(tracker: &'static Tracker) -> Self {
        Self {
            inner: System,
            tracker,
        }
    }
}

impl<A: GlobalAlloc> TrackingAllocator<A> {
    /// Creates a tracking allocator on top of the provided allocator.
    #[must_use]
    #[inline]
    pub const fn new(allocator: A, tracker: &'static Tracker) -> Self {
        Self {
            inner: allocator,
            tracker,
        }
    }

    /// The tracker that receives the allocations.
    #[must_use]
    #[inline]
    pub const fn tracker(&self) -> &'static Tracker {
        self.tracker
    }

    #[inline]
    fn record(&self, ptr: *mut u8, size: usize) {
        if !ptr.is_null() {
            self.tracker
                .record_allocation(ptr.addr(), size, thread_category(), AllocationKind::Heap);
        }
    }
}

// SAFETY: We delegate all allocation operations to the underlying allocator, which already
// implements GlobalAlloc safely. The tracker never calls back into the global allocator.
unsafe impl<A: GlobalAlloc> GlobalAlloc for TrackingAllocator<A> {
    #[inline]
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // SAFETY: We forward the call to the underlying allocator which implements GlobalAlloc.
        let ptr = unsafe { self.inner.alloc(layout) };
        self.record(ptr, layout.size());
        ptr
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // Erase first. Once freed, the address may be handed out again on another thread.
        self.tracker.record_deallocation(ptr.addr());

        // SAFETY: We forward the call to the underlying allocator which implements GlobalAlloc.
        unsafe { self.inner.dealloc(ptr, layout) }
    }

    #[inline]
    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        // SAFETY: We forward the call to the underlying allocator which implements GlobalAlloc.
        let ptr = unsafe { self.inner.alloc_zeroed(layout) };
        self.record(ptr, layout.size());
        ptr
    }

    #[inline]
    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let previous = self.tracker.take_record(ptr.addr());

        // SAFETY: We forward the call to the underlying allocator which implements GlobalAlloc.
        let new_ptr = unsafe { self.inner.realloc(ptr, layout, new_size) };

        if new_ptr.is_null() {
            // The original allocation is still alive, so it goes back in the table.
            if let Some(record) = previous {
                self.tracker.restore_record(record);
            }
        } else {
            let (category, kind) = previous.map_or_else(
                || (thread_category(), AllocationKind::Heap),
                |record| (record.category(), record.kind()),
            );

            self.tracker
                .record_allocation(new_ptr.addr(), new_size, category, kind);
        }

        new_ptr
    }
}
