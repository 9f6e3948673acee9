use std::fmt;
use std::mem::size_of;
use std::ops::ControlFlow;
use std::ptr::{self, NonNull};
use std::slice;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU8, AtomicU16, AtomicUsize, Ordering, fence};

use crate::pal::{Bindings, BindingsFacade};
use crate::{AllocationKind, AllocationRecord, CategoryId};

/// Slot has never been used since construction or the last clear.
const EMPTY: usize = 0;

/// Slot held a record that has since been removed. Lookups continue past it, inserts may reuse it.
const TOMBSTONE: usize = 1;

/// Slot is exclusively owned by one thread that is writing or reading its metadata.
const BUSY: usize = 2;

/// Whether `address` is one of the slot states rather than a real address.
#[inline]
pub(crate) const fn is_reserved_address(address: usize) -> bool {
    address <= BUSY
}

/// One entry of the table. An all-zero bit pattern is a valid EMPTY slot, which lets us use
/// zero-filled memory straight from the operating system.
#[derive(Debug)]
pub(crate) struct Slot {
    /// Either one of the slot states or the published address of a live allocation.
    address: AtomicUsize,

    // Only written by the thread that owns the slot in the BUSY state.
    size: AtomicUsize,
    category: AtomicU16,
    kind: AtomicU8,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum InsertOutcome {
    Recorded,

    /// Every slot in the probe sequence was occupied.
    Dropped,

    /// The table has no storage and never will.
    Unavailable,
}

/// Fixed-capacity open-addressing hash table of live allocations.
///
/// Inserts and removals are lock-free and finish within `max_probes` slot visits. The storage
/// is requested from the operating system on first insert so that the table can be created in
/// a `static` and so that filling it never recurses into the allocator being instrumented.
pub(crate) struct RecordTable {
    slots: AtomicPtr<Slot>,

    // Set when the operating system refused to give us storage. The table then stays empty.
    init_failed: AtomicBool,

    capacity: usize,
    max_probes: usize,

    bindings: BindingsFacade,
}

impl RecordTable {
    /// # Panics
    ///
    /// Panics if `capacity` or `max_probes` is zero or if the storage size overflows `usize`.
    pub(crate) const fn new(capacity: usize, max_probes: usize, bindings: BindingsFacade) -> Self {
        assert!(capacity > 0, "record table capacity must be nonzero");
        assert!(max_probes > 0, "record table probe limit must be nonzero");
        assert!(
            Self::storage_len(capacity).is_some(),
            "record table capacity is too large to address"
        );

        Self {
            slots: AtomicPtr::new(ptr::null_mut()),
            init_failed: AtomicBool::new(false),
            capacity,
            max_probes: if max_probes < capacity {
                max_probes
            } else {
                capacity
            },
            bindings,
        }
    }

    pub(crate) const fn storage_len(capacity: usize) -> Option<usize> {
        capacity.checked_mul(size_of::<Slot>())
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn max_probes(&self) -> usize {
        self.max_probes
    }

    /// Whether the table can hold records. Only turns false if acquiring storage failed.
    pub(crate) fn is_operational(&self) -> bool {
        !self.init_failed.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn insert(
        &self,
        address: usize,
        size: usize,
        category: CategoryId,
        kind: AllocationKind,
    ) -> InsertOutcome {
        let Some(slots) = self.slots_or_initialize() else {
            return InsertOutcome::Unavailable;
        };

        for slot in self.probe_sequence(slots, address) {
            let state = slot.address.load(Ordering::Relaxed);

            if state != EMPTY && state != TOMBSTONE {
                continue;
            }

            if slot
                .address
                .compare_exchange(state, BUSY, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                continue;
            }

            slot.size.store(size, Ordering::Relaxed);
            slot.category.store(category, Ordering::Relaxed);
            slot.kind.store(kind.to_raw(), Ordering::Relaxed);

            slot.address.store(address, Ordering::Release);
            return InsertOutcome::Recorded;
        }

        InsertOutcome::Dropped
    }

    /// Removes the record of `address` and returns what it held.
    ///
    /// Returns `None` if there is no such record, including when another thread removed it
    /// first. Never acquires storage: there is nothing to remove from a table that has none.
    #[inline]
    pub(crate) fn remove(&self, address: usize) -> Option<AllocationRecord> {
        let slots = self.slots()?;

        for slot in self.probe_sequence(slots, address) {
            let state = slot.address.load(Ordering::Relaxed);

            if state == EMPTY {
                return None;
            }

            if state != address {
                continue;
            }

            // Losing this race means a concurrent removal of the same address took the record.
            slot.address
                .compare_exchange(address, BUSY, Ordering::Acquire, Ordering::Relaxed)
                .ok()?;

            let record = AllocationRecord::new(
                address,
                slot.size.load(Ordering::Relaxed),
                slot.category.load(Ordering::Relaxed),
                AllocationKind::from_raw(slot.kind.load(Ordering::Relaxed)),
            );

            slot.address.store(TOMBSTONE, Ordering::Release);
            return Some(record);
        }

        None
    }

    /// Visits every published record until `f` breaks.
    ///
    /// Records inserted or removed concurrently may or may not be visited. A slot recycled while
    /// we read it is skipped.
    pub(crate) fn for_each(&self, mut f: impl FnMut(AllocationRecord) -> ControlFlow<()>) {
        let Some(slots) = self.slots() else {
            return;
        };

        for slot in slots {
            let address = slot.address.load(Ordering::Acquire);

            if is_reserved_address(address) {
                continue;
            }

            let size = slot.size.load(Ordering::Relaxed);
            let category = slot.category.load(Ordering::Relaxed);
            let kind = slot.kind.load(Ordering::Relaxed);

            // Orders the metadata reads before the re-read of the address.
            fence(Ordering::Acquire);

            if slot.address.load(Ordering::Relaxed) != address {
                continue;
            }

            let record =
                AllocationRecord::new(address, size, category, AllocationKind::from_raw(kind));

            if f(record).is_break() {
                return;
            }
        }
    }

    /// Number of slots holding a published address, found by scanning the whole table.
    pub(crate) fn count_published(&self) -> usize {
        self.slots().map_or(0, |slots| {
            slots
                .iter()
                .filter(|slot| !is_reserved_address(slot.address.load(Ordering::Relaxed)))
                .count()
        })
    }

    /// Returns every slot to EMPTY, discarding records and tombstones alike.
    ///
    /// Concurrent inserts and removals may survive or be lost.
    pub(crate) fn clear(&self) {
        let Some(slots) = self.slots() else {
            return;
        };

        for slot in slots {
            slot.size.store(0, Ordering::Relaxed);
            slot.category.store(0, Ordering::Relaxed);
            slot.kind.store(0, Ordering::Relaxed);
            slot.address.store(EMPTY, Ordering::Release);
        }
    }

    /// The `max_probes` slots starting at the home bucket of `address`, wrapping around.
    #[inline]
    fn probe_sequence<'a>(
        &self,
        slots: &'a [Slot],
        address: usize,
    ) -> impl Iterator<Item = &'a Slot> + use<'a> {
        let home = (address ^ (address >> 16)).wrapping_rem(self.capacity);
        let (before, after) = slots.split_at(home);

        after.iter().chain(before).take(self.max_probes)
    }

    #[inline]
    fn slots(&self) -> Option<&[Slot]> {
        let ptr = self.slots.load(Ordering::Acquire);

        if ptr.is_null() {
            return None;
        }

        // SAFETY: A non-null pointer is only ever stored by `initialize()`, pointing to zeroed
        // storage for `capacity` slots that lives until we are dropped. All-zero is a valid slot.
        Some(unsafe { slice::from_raw_parts(ptr, self.capacity) })
    }

    #[inline]
    fn slots_or_initialize(&self) -> Option<&[Slot]> {
        self.slots().or_else(|| self.initialize())
    }

    // Reachable from inside the allocator being instrumented, so this must not allocate
    // through it or do anything (such as logging) that might.
    #[cold]
    fn initialize(&self) -> Option<&[Slot]> {
        if self.init_failed.load(Ordering::Relaxed) {
            return None;
        }

        // Checked in `new()`.
        let len = Self::storage_len(self.capacity)?;

        let Some(storage) = self.bindings.reserve_zeroed(len) else {
            self.init_failed.store(true, Ordering::Relaxed);
            return None;
        };

        let fresh = storage.cast::<Slot>().as_ptr();

        if self
            .slots
            .compare_exchange(ptr::null_mut(), fresh, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // Another thread got there first. We use theirs and give ours back.
            // SAFETY: `storage` came from `reserve_zeroed()` with this length and nobody
            // else has seen it.
            unsafe {
                self.bindings.release(storage, len);
            }
        }

        self.slots()
    }
}

impl Drop for RecordTable {
    fn drop(&mut self) {
        let Some(ptr) = NonNull::new(*self.slots.get_mut()) else {
            return;
        };

        let Some(len) = Self::storage_len(self.capacity) else {
            return;
        };

        // SAFETY: The pointer was stored by `initialize()` after reserving exactly `len` bytes
        // from these bindings. We have exclusive access, so nobody is using the slots anymore.
        unsafe {
            self.bindings.release(ptr.cast(), len);
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
impl fmt::Debug for RecordTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordTable")
            .field("capacity", &self.capacity)
            .field("max_probes", &self.max_probes)
            .field("initialized", &!self.slots.load(Ordering::Relaxed).is_null())
            .field("init_failed", &self.init_failed.load(Ordering::Relaxed))
            .field("bindings", &self.bindings)
            .finish()
    }
}
