//! Platform-behaviour specification flags.
//!
//! A [`SpecFlags`] bitmask is handed to each conversion proxy at construction
//! and gates platform-specific behaviour: extra conflict rules in the
//! partition tables and special-cased dispatch paths (e.g. the go-cqhttp
//! file-upload route on OneBot v11).

use std::ops::{BitOr, BitOrAssign};

/// Bitmask of platform-specific behaviour flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SpecFlags(u32);

impl SpecFlags {
    /// No special behaviour.
    pub const NONE: Self = Self(0);

    /// The target is the QQ platform proper; enables QQ-only mixing
    /// restrictions such as "a reply and an image cannot share a message".
    pub const PLATFORM_QQ: Self = Self(1);

    /// The OneBot v11 implementation is go-cqhttp; file elements route
    /// through its dedicated upload APIs instead of a generic send.
    pub const GOCQHTTP_FILE: Self = Self(1 << 10);

    /// Creates a flag set from raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if every flag in `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if no flag is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for SpecFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for SpecFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_and_union() {
        let specs = SpecFlags::PLATFORM_QQ | SpecFlags::GOCQHTTP_FILE;
        assert!(specs.contains(SpecFlags::PLATFORM_QQ));
        assert!(specs.contains(SpecFlags::GOCQHTTP_FILE));
        assert!(specs.contains(SpecFlags::NONE));
        assert!(!SpecFlags::NONE.contains(SpecFlags::PLATFORM_QQ));
    }

    #[test]
    fn test_default_is_empty() {
        assert!(SpecFlags::default().is_empty());
    }
}
