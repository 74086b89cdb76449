//! Half-open ranges over buffer units.
//!
//! An [`Address`] is unit-agnostic: the byte store reads it as bytes and the
//! rune layer as runes. Addresses are not validated when they are built, only
//! when an operation uses them against a buffer of a known size.

use std::fmt;

use thiserror::Error;

/// The half-open range `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address {
    pub from: i64,
    pub to: i64,
}

impl Address {
    /// Create the address `[from, to)`.
    pub const fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    /// The empty address at `at`.
    pub const fn point(at: i64) -> Self {
        Self { from: at, to: at }
    }

    /// Number of units named by the address, computed without validation.
    pub const fn size(&self) -> i64 {
        self.to - self.from
    }

    pub const fn is_point(&self) -> bool {
        self.from == self.to
    }

    /// Whether the address names a valid range of a buffer holding `size` units.
    pub const fn is_valid(&self, size: i64) -> bool {
        self.from >= 0 && self.from <= self.to && self.to <= size
    }

    /// Check the address against a buffer holding `size` units.
    ///
    /// # Errors
    /// Returns an [`AddressError`] carrying `self` when
    /// `from < 0`, `from > to`, or `to > size`.
    pub const fn validate(self, size: i64) -> Result<Self, AddressError> {
        if self.is_valid(size) {
            Ok(self)
        } else {
            Err(AddressError(self))
        }
    }

    /// Scale both ends by `unit`, e.g. rune offsets to byte offsets.
    pub(crate) const fn scaled(self, unit: i64) -> Self {
        Self {
            from: self.from * unit,
            to: self.to * unit,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.from, self.to)
    }
}

impl From<std::ops::Range<i64>> for Address {
    fn from(range: std::ops::Range<i64>) -> Self {
        Self::new(range.start, range.end)
    }
}

/// An address that is out of range for the buffer it was used on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid address: {0}")]
pub struct AddressError(pub Address);

impl AddressError {
    /// The offending address.
    pub const fn address(&self) -> Address {
        self.0
    }
}
