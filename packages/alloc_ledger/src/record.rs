use crate::{AllocationKind, CategoryId};

/// Snapshot of one live allocation, as seen while iterating a [`Tracker`][crate::Tracker].
///
/// The snapshot is taken without stopping concurrent allocation activity, so by the time
/// you look at it the allocation may already have been freed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AllocationRecord {
    address: usize,
    size: usize,
    category: CategoryId,
    kind: AllocationKind,
}

impl AllocationRecord {
    pub(crate) const fn new(
        address: usize,
        size: usize,
        category: CategoryId,
        kind: AllocationKind,
    ) -> Self {
        Self {
            address,
            size,
            category,
            kind,
        }
    }

    /// Address of the allocation.
    #[must_use]
    pub const fn address(&self) -> usize {
        self.address
    }

    /// Size of the allocation in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Category the allocation is attributed to.
    #[must_use]
    pub const fn category(&self) -> CategoryId {
        self.category
    }

    /// Where the allocation came from.
    #[must_use]
    pub const fn kind(&self) -> AllocationKind {
        self.kind
    }
}
