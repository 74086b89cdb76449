use std::io;

use super::bytes::Bytes;
use super::slots::Slots;
use crate::error::StoreError;

/// Sequential [`io::Read`] access to a [`Bytes`] store.
///
/// Reaching the end of the store reads as `Ok(0)`.
#[derive(Debug)]
pub struct BytesReader<'a, S: Slots> {
    bytes: &'a Bytes<S>,
    pos: i64,
}

impl<'a, S: Slots> BytesReader<'a, S> {
    pub(crate) const fn new(bytes: &'a Bytes<S>, pos: i64) -> Self {
        Self { bytes, pos }
    }

    /// Byte offset of the next read.
    pub const fn position(&self) -> i64 {
        self.pos
    }
}

impl<S: Slots> io::Read for BytesReader<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.bytes.read_at(buf, self.pos) {
            Ok(n) => {
                self.pos += n as i64;
                Ok(n)
            }
            Err(StoreError::EndOfData) => Ok(0),
            Err(StoreError::Io(err)) => Err(err),
            Err(err) => Err(io::Error::new(io::ErrorKind::InvalidInput, err)),
        }
    }
}
