use std::fmt;

/// Where a tracked allocation came from.
///
/// The kind is stored alongside each record and is only informational: all kinds are
/// accounted for in the same totals.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[non_exhaustive]
#[repr(u8)]
pub enum AllocationKind {
    /// Memory from a general-purpose heap allocator.
    #[default]
    Heap = 0,

    /// Stack memory registered for visibility; never actually freed through an allocator.
    Stack = 1,

    /// Memory handed out by an object pool.
    Pool = 2,

    /// Memory handed out by an arena or bump allocator.
    Arena = 3,

    /// Memory from some other application-specific allocator.
    Custom = 4,
}

impl AllocationKind {
    /// Human-readable name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Heap => "Heap",
            Self::Stack => "Stack",
            Self::Pool => "Pool",
            Self::Arena => "Arena",
            Self::Custom => "Custom",
        }
    }

    pub(crate) const fn to_raw(self) -> u8 {
        self as u8
    }

    /// Inverse of `to_raw()`. Values we never store decode as `Custom`.
    pub(crate) const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Heap,
            1 => Self::Stack,
            2 => Self::Pool,
            3 => Self::Arena,
            _ => Self::Custom,
        }
    }
}

impl fmt::Display for AllocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
