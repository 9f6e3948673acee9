use std::{fmt, str};

/// Identifies the category that an allocation is attributed to.
///
/// Any value is accepted when recording allocations but only categories below
/// [`MAX_CATEGORIES`] have statistics and names.
pub type CategoryId = u16;

/// Number of categories that have their own statistics block.
pub const MAX_CATEGORIES: usize = 64;

/// Size of the inline name buffer of a category. Names are truncated to one byte less
/// than this, on a character boundary.
pub const MAX_CATEGORY_NAME_LEN: usize = 32;

const MAX_NAME_BYTES: usize = MAX_CATEGORY_NAME_LEN - 1;

/// Well-known category identifiers.
///
/// Unless disabled via [`TrackerBuilder::without_default_categories()`][1], a new tracker
/// registers names for the identifiers `GENERAL` through `TEMPORARY`.
///
/// [1]: crate::TrackerBuilder::without_default_categories
pub mod categories {
    use crate::CategoryId;

    /// Allocations that were not attributed to anything more specific.
    pub const GENERAL: CategoryId = 0;
    /// Textures, meshes and other rendering resources.
    pub const GRAPHICS: CategoryId = 1;
    /// Sound buffers and mixer state.
    pub const AUDIO: CategoryId = 2;
    /// Collision and simulation state.
    pub const PHYSICS: CategoryId = 3;
    /// Decision-making and pathfinding state.
    pub const AI: CategoryId = 4;
    /// Connection state and packet buffers.
    pub const NETWORK: CategoryId = 5;
    /// User interface elements.
    pub const UI: CategoryId = 6;
    /// Game rules and world state.
    pub const GAMEPLAY: CategoryId = 7;
    /// Loaded assets not covered by a more specific category.
    pub const RESOURCE: CategoryId = 8;
    /// Short-lived scratch allocations.
    pub const TEMPORARY: CategoryId = 9;

    /// First identifier reserved for application-defined categories.
    ///
    /// Note that this is above [`MAX_CATEGORIES`][crate::MAX_CATEGORIES], so allocations
    /// in these categories are recorded and listed by identifier but have no per-category
    /// statistics.
    pub const USER_START: CategoryId = 100;
}

pub(crate) const DEFAULT_CATEGORY_NAMES: [&str; 10] = [
    "General",
    "Graphics",
    "Audio",
    "Physics",
    "AI",
    "Network",
    "UI",
    "Gameplay",
    "Resource",
    "Temporary",
];

/// Fixed-capacity inline category name. Always holds valid UTF-8.
#[derive(Clone, Copy)]
pub(crate) struct CategoryName {
    bytes: [u8; MAX_NAME_BYTES],
    len: u8,
}

impl CategoryName {
    pub(crate) const EMPTY: Self = Self {
        bytes: [0; MAX_NAME_BYTES],
        len: 0,
    };

    /// Copies as much of `name` as fits, cutting on a character boundary.
    #[expect(
        clippy::cast_possible_truncation,
        clippy::indexing_slicing,
        reason = "length is bounded by MAX_NAME_BYTES, which fits in u8 and in the buffer"
    )]
    pub(crate) const fn new(name: &str) -> Self {
        let source = name.as_bytes();

        let mut len = if source.len() < MAX_NAME_BYTES {
            source.len()
        } else {
            MAX_NAME_BYTES
        };

        // Step back over UTF-8 continuation bytes so we never split a character.
        while len > 0 && len < source.len() && (source[len] & 0xC0) == 0x80 {
            len = len.wrapping_sub(1);
        }

        let mut bytes = [0; MAX_NAME_BYTES];
        let mut i = 0;
        while i < len {
            bytes[i] = source[i];
            i = i.wrapping_add(1);
        }

        Self {
            bytes,
            len: len as u8,
        }
    }

    pub(crate) fn as_str(&self) -> &str {
        let bytes = self
            .bytes
            .get(..usize::from(self.len))
            .unwrap_or_default();

        // SAFETY: `new()` only ever stores a prefix of a `str` that ends on a character
        // boundary, so the bytes are valid UTF-8.
        unsafe { str::from_utf8_unchecked(bytes) }
    }
}

impl fmt::Debug for CategoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn short_name_is_kept() {
        assert_eq!(CategoryName::new("Audio").as_str(), "Audio");
        assert_eq!(CategoryName::EMPTY.as_str(), "");
    }

    #[test]
    fn long_name_is_truncated() {
        let name = "a".repeat(100);

        let stored = CategoryName::new(&name);

        assert_eq!(stored.as_str().len(), MAX_CATEGORY_NAME_LEN - 1);
        assert!(name.starts_with(stored.as_str()));
    }

    #[test]
    fn truncation_respects_character_boundaries() {
        // 30 ASCII bytes followed by a 3-byte character straddling the limit.
        let name = format!("{}€tail", "x".repeat(30));

        let stored = CategoryName::new(&name);

        assert_eq!(stored.as_str(), "x".repeat(30));
    }

    #[test]
    fn default_names_fit() {
        for name in DEFAULT_CATEGORY_NAMES {
            assert_eq!(CategoryName::new(name).as_str(), name);
        }
    }
}
