//! Error types shared by the byte store and the rune layer.

use std::io;

use thiserror::Error;

use crate::address::{Address, AddressError};

/// Errors returned by [`Bytes`](crate::store::Bytes) and [`Runes`](crate::runes::Runes).
#[derive(Debug, Error)]
pub enum StoreError {
    /// An address or offset outside the buffer. Always reported before any mutation.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// A delete was asked to remove a negative number of units.
    #[error("invalid count: {0}")]
    NegativeCount(i64),

    /// A read started at or past the end of the buffer.
    #[error("end of data")]
    EndOfData,

    /// The backing storage failed.
    #[error("backing storage: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// The offending address, if this is an address error.
    pub const fn address(&self) -> Option<Address> {
        match self {
            Self::Address(err) => Some(err.address()),
            _ => None,
        }
    }

    pub const fn is_end_of_data(&self) -> bool {
        matches!(self, Self::EndOfData)
    }
}

/// Shorthand result for store operations.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// A storage failure while reading a rune that is within bounds.
///
/// Returned by [`Runes::rune`](crate::runes::Runes::rune); out-of-bounds
/// offsets panic instead, since they are a caller bug rather than a
/// storage condition.
#[derive(Debug, Error)]
#[error("reading rune at {offset}: {source}")]
pub struct RuneReadError {
    offset: i64,
    #[source]
    source: StoreError,
}

impl RuneReadError {
    pub(crate) const fn new(offset: i64, source: StoreError) -> Self {
        Self { offset, source }
    }

    /// The rune offset that failed.
    pub const fn offset(&self) -> i64 {
        self.offset
    }

    /// The underlying store error.
    pub fn into_inner(self) -> StoreError {
        self.source
    }
}
