//! Unicode-aware addressing on top of the byte store.
//!
//! Every rune is stored as a fixed 4-byte little-endian record, so rune
//! offset `i` is byte offset `4 * i` in the underlying [`Bytes`] store.
//! Stream import and export convert to and from UTF-8.

use std::char::REPLACEMENT_CHARACTER;
use std::io::{self, Read, Write};
use std::path::Path;

use tracing::debug;

use crate::address::{Address, AddressError};
use crate::error::{Result, RuneReadError, StoreError};
use crate::store::{Bytes, DEFAULT_BLOCK_SIZE, MemorySlots, ScratchFile, Slots, StoreStats};

/// Bytes used to store one rune.
pub const RUNE_BYTES: usize = 4;

const UNIT: i64 = RUNE_BYTES as i64;

/// Size of each read issued by [`Runes::read_from`].
const READ_CHUNK: usize = 8 * 1024;

/// An editable buffer of runes.
///
/// Like [`Bytes`], a rune buffer is not internally synchronized.
#[derive(Debug)]
pub struct Runes<S: Slots = MemorySlots> {
    bytes: Bytes<S>,
}

/// Byte capacity of a block holding `block_size` runes; zero selects
/// [`DEFAULT_BLOCK_SIZE`] runes. `None` if the capacity overflows `usize`.
pub(crate) const fn checked_block_bytes(block_size: usize) -> Option<usize> {
    let runes = if block_size == 0 {
        DEFAULT_BLOCK_SIZE
    } else {
        block_size
    };
    runes.checked_mul(RUNE_BYTES)
}

fn block_bytes(block_size: usize) -> usize {
    checked_block_bytes(block_size).unwrap_or(usize::MAX / RUNE_BYTES * RUNE_BYTES)
}

impl Runes<MemorySlots> {
    /// Create an empty in-memory buffer whose blocks hold `block_size` runes.
    pub fn new(block_size: usize) -> Self {
        Self::with_slots(MemorySlots::new(block_bytes(block_size)))
    }
}

impl Runes<ScratchFile> {
    /// Create an empty buffer backed by a scratch file in the system
    /// temporary directory.
    ///
    /// # Errors
    /// Returns an error if the scratch file cannot be created.
    pub fn scratch(block_size: usize) -> io::Result<Self> {
        Ok(Self::with_slots(ScratchFile::new(block_bytes(block_size))?))
    }

    /// Create an empty buffer backed by a scratch file inside `dir`.
    ///
    /// # Errors
    /// Returns an error if the scratch file cannot be created.
    pub fn scratch_in(block_size: usize, dir: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::with_slots(ScratchFile::in_dir(
            block_bytes(block_size),
            dir,
        )?))
    }
}

impl<S: Slots> Runes<S> {
    /// Create an empty buffer over `slots`.
    ///
    /// # Panics
    /// Panics if a slot cannot hold at least one rune.
    pub fn with_slots(slots: S) -> Self {
        assert!(
            slots.capacity() >= RUNE_BYTES,
            "slot capacity must hold at least one rune"
        );
        Self {
            bytes: Bytes::with_slots(slots),
        }
    }

    /// Number of runes in the buffer.
    pub const fn size(&self) -> i64 {
        self.bytes.size() / UNIT
    }

    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Runes per block.
    pub fn rune_capacity(&self) -> usize {
        self.bytes.block_size() / RUNE_BYTES
    }

    /// The underlying byte store.
    pub const fn bytes(&self) -> &Bytes<S> {
        &self.bytes
    }

    pub fn stats(&self) -> StoreStats {
        self.bytes.stats()
    }

    /// Return the runes named by `at`.
    ///
    /// # Errors
    /// Returns an address error (in rune units) if `at` is out of range, or an
    /// I/O error from the backing storage.
    pub fn get(&self, at: Address) -> Result<Vec<char>> {
        let at = at.validate(self.size())?;
        let raw = self.bytes.read(at.scaled(UNIT))?;
        Ok(decode(&raw))
    }

    /// Replace the runes named by `at` with `rs`, returning the runes written.
    ///
    /// # Errors
    /// Returns an address error (in rune units) if `at` is out of range, or an
    /// I/O error from the backing storage. Nothing changes on an address error.
    pub fn put(&mut self, rs: &[char], at: Address) -> Result<usize> {
        let at = at.validate(self.size())?;
        self.bytes.write(&encode(rs), at.scaled(UNIT))?;
        Ok(rs.len())
    }

    /// Insert `rs` at rune offset `at`.
    ///
    /// # Errors
    /// Returns an address error on the point `at` unless `0 <= at <= size`.
    pub fn insert(&mut self, rs: &[char], at: i64) -> Result<usize> {
        if at < 0 || at > self.size() {
            return Err(AddressError(Address::point(at)).into());
        }
        self.bytes.insert(&encode(rs), at * UNIT)?;
        Ok(rs.len())
    }

    /// Remove `count` runes starting at rune offset `at`.
    ///
    /// # Errors
    /// Returns [`StoreError::NegativeCount`] if `count < 0`, or an address
    /// error (in rune units) if the range is not inside the buffer.
    pub fn delete(&mut self, count: i64, at: i64) -> Result<usize> {
        if count < 0 {
            return Err(StoreError::NegativeCount(count));
        }
        if at < 0 || at > self.size() {
            return Err(AddressError(Address::point(at)).into());
        }
        let range = Address::new(at, at.saturating_add(count)).validate(self.size())?;
        let n = self.bytes.delete(range.size() * UNIT, range.from * UNIT)?;
        Ok(n / RUNE_BYTES)
    }

    /// Append `rs` to the end of the buffer.
    ///
    /// # Errors
    /// Returns an I/O error from the backing storage.
    pub fn append(&mut self, rs: &[char]) -> Result<usize> {
        self.insert(rs, self.size())
    }

    /// The rune at offset `i`.
    ///
    /// # Panics
    /// Panics if `i` is outside `0..size()`.
    ///
    /// # Errors
    /// Returns a [`RuneReadError`] if the backing storage fails while reading
    /// an in-bounds rune.
    pub fn rune(&self, i: i64) -> std::result::Result<char, RuneReadError> {
        let size = self.size();
        assert!(
            (0..size).contains(&i),
            "rune offset {i} out of range 0..{size}"
        );
        let mut record = [0; RUNE_BYTES];
        match self.bytes.read_at(&mut record, i * UNIT) {
            Ok(RUNE_BYTES) => Ok(decode_one(record)),
            Ok(n) => Err(RuneReadError::new(
                i,
                StoreError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("short rune record: {n} bytes"),
                )),
            )),
            Err(err) => Err(RuneReadError::new(i, err)),
        }
    }

    /// Iterate over runes starting at rune offset `at`, fetching one block's
    /// worth at a time.
    ///
    /// # Errors
    /// Returns an address error on the point `at` unless `0 <= at <= size`.
    pub fn runes_from(&self, at: i64) -> Result<RunesFrom<'_, S>> {
        if at < 0 || at > self.size() {
            return Err(AddressError(Address::point(at)).into());
        }
        Ok(RunesFrom {
            runes: self,
            next: at,
            chunk: Vec::new(),
            pos: 0,
        })
    }

    /// Decode UTF-8 from `r` and append the runes to the end of the buffer,
    /// returning the number of bytes consumed.
    ///
    /// Invalid sequences decode as U+FFFD and reading continues. Each maximal
    /// invalid subsequence yields one U+FFFD, as `String::from_utf8_lossy`
    /// does, so `"\xe4\xb8x"` reads as two runes, not three.
    ///
    /// # Errors
    /// Returns an I/O error from the reader or the backing storage. Runes
    /// decoded before the error stay in the buffer.
    pub fn read_from<R: Read>(&mut self, mut r: R) -> Result<u64> {
        let batch = self.rune_capacity();
        let mut chunk = vec![0; READ_CHUNK];
        let mut pending = Vec::new();
        let mut decoded = Vec::with_capacity(batch);
        let mut total = 0u64;
        loop {
            let n = match r.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };
            total += n as u64;
            pending.extend_from_slice(&chunk[..n]);
            let used = decode_utf8(&pending, &mut decoded);
            pending.drain(..used);
            if decoded.len() >= batch {
                self.append(&decoded)?;
                decoded.clear();
            }
        }
        if !pending.is_empty() {
            // A truncated sequence at end of stream.
            decoded.push(REPLACEMENT_CHARACTER);
        }
        self.append(&decoded)?;
        debug!(bytes = total, runes = self.size(), "read from stream");
        Ok(total)
    }

    /// Encode the buffer as UTF-8 into `w`, returning the bytes written.
    ///
    /// The buffer is processed one block of runes at a time.
    ///
    /// # Errors
    /// Returns an I/O error from the writer or the backing storage.
    pub fn write_to<W: Write>(&self, mut w: W) -> Result<u64> {
        let size = self.size();
        let step = self.rune_capacity() as i64;
        let mut text = String::new();
        let mut total = 0u64;
        let mut from = 0;
        while from < size {
            let to = (from + step).min(size);
            text.clear();
            text.extend(self.get(Address::new(from, to))?);
            w.write_all(text.as_bytes())?;
            total += text.len() as u64;
            from = to;
        }
        w.flush()?;
        debug!(bytes = total, runes = size, "wrote to stream");
        Ok(total)
    }

    /// Release all backing storage.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be released.
    pub fn close(self) -> io::Result<()> {
        self.bytes.close()
    }
}

/// Iterator returned by [`Runes::runes_from`].
#[derive(Debug)]
pub struct RunesFrom<'a, S: Slots> {
    runes: &'a Runes<S>,
    next: i64,
    chunk: Vec<char>,
    pos: usize,
}

impl<S: Slots> Iterator for RunesFrom<'_, S> {
    type Item = Result<char>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos == self.chunk.len() {
            let size = self.runes.size();
            if self.next >= size {
                return None;
            }
            let to = (self.next + self.runes.rune_capacity() as i64).min(size);
            match self.runes.get(Address::new(self.next, to)) {
                Ok(chunk) => self.chunk = chunk,
                Err(err) => {
                    self.next = size;
                    return Some(Err(err));
                }
            }
            self.next = to;
            self.pos = 0;
        }
        let ch = self.chunk[self.pos];
        self.pos += 1;
        Some(Ok(ch))
    }
}

fn encode(rs: &[char]) -> Vec<u8> {
    rs.iter().flat_map(|&ch| u32::from(ch).to_le_bytes()).collect()
}

fn decode_one(record: [u8; RUNE_BYTES]) -> char {
    char::from_u32(u32::from_le_bytes(record)).unwrap_or(REPLACEMENT_CHARACTER)
}

fn decode(raw: &[u8]) -> Vec<char> {
    raw.chunks_exact(RUNE_BYTES)
        .map(|c| decode_one([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Decode as much of `input` as possible into `out`, returning the number of
/// bytes consumed. An incomplete sequence at the end is left unconsumed.
fn decode_utf8(input: &[u8], out: &mut Vec<char>) -> usize {
    let mut rest = input;
    loop {
        match std::str::from_utf8(rest) {
            Ok(s) => {
                out.extend(s.chars());
                return input.len();
            }
            Err(err) => {
                let (valid, after) = rest.split_at(err.valid_up_to());
                out.extend(String::from_utf8_lossy(valid).chars());
                match err.error_len() {
                    Some(len) => {
                        out.push(REPLACEMENT_CHARACTER);
                        rest = &after[len..];
                    }
                    None => return input.len() - after.len(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::store::SlotId;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn text<S: Slots>(r: &Runes<S>) -> String {
        r.get(Address::new(0, r.size())).unwrap().into_iter().collect()
    }

    /// Yields one byte per read call.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match (self.0.split_first(), buf.first_mut()) {
                (Some((&b, rest)), Some(slot)) => {
                    *slot = b;
                    self.0 = rest;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("broken pipe"))
        }
    }

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("broken pipe"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Memory slots whose reads fail while `fail_reads` is set and whose
    /// allocations fail past `alloc_limit` slots.
    #[derive(Debug)]
    struct Flaky {
        inner: MemorySlots,
        fail_reads: Rc<Cell<bool>>,
        alloc_limit: usize,
    }

    impl Flaky {
        fn new(capacity: usize, alloc_limit: usize) -> (Self, Rc<Cell<bool>>) {
            let fail_reads = Rc::new(Cell::new(false));
            let slots = Self {
                inner: MemorySlots::new(capacity),
                fail_reads: Rc::clone(&fail_reads),
                alloc_limit,
            };
            (slots, fail_reads)
        }
    }

    impl Slots for Flaky {
        fn capacity(&self) -> usize {
            self.inner.capacity()
        }

        fn allocated(&self) -> usize {
            self.inner.allocated()
        }

        fn allocate(&mut self) -> io::Result<SlotId> {
            if self.inner.allocated() >= self.alloc_limit {
                return Err(io::Error::other("full"));
            }
            self.inner.allocate()
        }

        fn read(&self, slot: SlotId, offset: usize, buf: &mut [u8]) -> io::Result<()> {
            if self.fail_reads.get() {
                return Err(io::Error::other("bad sector"));
            }
            self.inner.read(slot, offset, buf)
        }

        fn write(&mut self, slot: SlotId, offset: usize, data: &[u8]) -> io::Result<()> {
            self.inner.write(slot, offset, data)
        }

        fn release(&mut self) -> io::Result<()> {
            self.inner.release()
        }
    }

    #[test]
    fn test_rune_storage_failure_is_typed_error() {
        let (slots, fail_reads) = Flaky::new(8, usize::MAX);
        let mut r = Runes::with_slots(slots);
        r.put(&chars("abc"), Address::point(0)).unwrap();

        fail_reads.set(true);
        let err = r.rune(2).unwrap_err();
        assert_eq!(err.offset(), 2);
        assert!(matches!(err.into_inner(), StoreError::Io(_)));

        fail_reads.set(false);
        assert_eq!(r.rune(2).unwrap(), 'c');
    }

    #[test]
    fn test_insert_failure_restores_blocks_and_pool() {
        let (slots, _) = Flaky::new(8, 3);
        let mut r = Runes::with_slots(slots);
        r.append(&chars("abc")).unwrap();
        assert_eq!(r.bytes().block_sizes(), vec![8, 4]);

        let err = r.insert(&chars("12345"), 1).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert_eq!(r.bytes().block_sizes(), vec![8, 4]);
        assert_eq!(r.bytes().free_len(), 1);
        assert_eq!(r.bytes().allocated_slots(), 3);
        assert_eq!(text(&r), "abc");

        // The returned slot is reused by the next insert that fits.
        r.insert(&chars("z"), 3).unwrap();
        assert_eq!(r.bytes().free_len(), 0);
        assert_eq!(text(&r), "abcz");
    }

    #[test]
    fn test_read_from_invalid_sequence_is_one_replacement() {
        let mut r = Runes::new(4);
        r.read_from(&b"\xe4\xb8x"[..]).unwrap();
        assert_eq!(text(&r), "\u{FFFD}x");
    }

    #[test]
    fn test_put_get_round_trip() {
        let mut r = Runes::new(8);
        let hello = chars("Hello, 世界");
        assert_eq!(r.put(&hello, Address::point(0)).unwrap(), 9);
        assert_eq!(r.size(), 9);
        assert_eq!(r.get(Address::new(0, r.size())).unwrap(), hello);
        assert_eq!(r.bytes().size(), 36);
    }

    #[test]
    fn test_runes_are_little_endian_records() {
        let mut r = Runes::new(4);
        r.put(&['A', '世'], Address::point(0)).unwrap();
        let raw = r.bytes().read(Address::new(0, 8)).unwrap();
        assert_eq!(raw, vec![0x41, 0, 0, 0, 0x16, 0x4e, 0, 0]);
    }

    #[test]
    fn test_block_size_is_in_runes() {
        let r = Runes::new(8);
        assert_eq!(r.bytes().block_size(), 32);
        assert_eq!(r.rune_capacity(), 8);
        assert_eq!(Runes::new(0).rune_capacity(), DEFAULT_BLOCK_SIZE);
    }

    #[test]
    fn test_checked_block_bytes() {
        assert_eq!(checked_block_bytes(0), Some(DEFAULT_BLOCK_SIZE * RUNE_BYTES));
        assert_eq!(checked_block_bytes(8), Some(32));
        assert_eq!(checked_block_bytes(usize::MAX / 2), None);
    }

    #[test]
    fn test_put_replaces_range() {
        let mut r = Runes::new(3);
        r.put(&chars("αβγδε"), Address::point(0)).unwrap();
        r.put(&chars("XY"), Address::new(1, 4)).unwrap();
        assert_eq!(text(&r), "αXYε");
    }

    #[test]
    fn test_address_errors_are_in_rune_units() {
        let mut r = Runes::new(8);
        r.put(&chars("abc"), Address::point(0)).unwrap();
        for bad in [Address::new(0, 4), Address::new(2, 1), Address::new(-1, 1)] {
            assert_eq!(r.get(bad).unwrap_err().address(), Some(bad));
            assert_eq!(r.put(&['z'], bad).unwrap_err().address(), Some(bad));
        }
        assert_eq!(text(&r), "abc");
    }

    #[test]
    fn test_insert_delete_append() {
        let mut r = Runes::new(2);
        r.append(&chars("world")).unwrap();
        r.insert(&chars("hello "), 0).unwrap();
        assert_eq!(text(&r), "hello world");
        assert_eq!(r.delete(6, 0).unwrap(), 6);
        assert_eq!(text(&r), "world");
        assert!(matches!(r.delete(-2, 0), Err(StoreError::NegativeCount(-2))));
        assert_eq!(r.delete(1, 6).unwrap_err().address(), Some(Address::point(6)));
        assert_eq!(
            r.delete(3, 4).unwrap_err().address(),
            Some(Address::new(4, 7))
        );
        assert_eq!(r.insert(&['!'], 9).unwrap_err().address(), Some(Address::point(9)));
    }

    #[test]
    fn test_rune_random_access() {
        let mut r = Runes::new(2);
        r.put(&chars("añb世"), Address::point(0)).unwrap();
        assert_eq!(r.rune(0).unwrap(), 'a');
        assert_eq!(r.rune(1).unwrap(), 'ñ');
        assert_eq!(r.rune(3).unwrap(), '世');
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_rune_out_of_bounds_panics() {
        let mut r = Runes::new(2);
        r.put(&chars("ab"), Address::point(0)).unwrap();
        let _ = r.rune(2);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_rune_negative_panics() {
        let r = Runes::new(2);
        let _ = r.rune(-1);
    }

    #[test]
    fn test_read_from_decodes_utf8() {
        let mut r = Runes::new(4);
        let input = "Hello, 世界!";
        let n = r.read_from(input.as_bytes()).unwrap();
        assert_eq!(n, input.len() as u64);
        assert_eq!(text(&r), input);
    }

    #[test]
    fn test_read_from_appends_to_existing_content() {
        let mut r = Runes::new(4);
        r.put(&chars(">> "), Address::point(0)).unwrap();
        r.read_from("tail".as_bytes()).unwrap();
        assert_eq!(text(&r), ">> tail");
    }

    #[test]
    fn test_read_from_invalid_byte_is_replacement() {
        let mut r = Runes::new(4);
        let n = r.read_from(&b"a\x80b"[..]).unwrap();
        assert_eq!(n, 3);
        assert_eq!(r.get(Address::new(0, 3)).unwrap(), vec!['a', '\u{FFFD}', 'b']);
    }

    #[test]
    fn test_read_from_sequence_split_across_reads() {
        let mut r = Runes::new(2);
        let input = "é世🦀x";
        r.read_from(Trickle(input.as_bytes())).unwrap();
        assert_eq!(text(&r), input);
    }

    #[test]
    fn test_read_from_truncated_tail_is_replacement() {
        let mut r = Runes::new(2);
        r.read_from(&b"ok\xe4\xb8"[..]).unwrap();
        assert_eq!(text(&r), "ok\u{FFFD}");
    }

    #[test]
    fn test_read_from_larger_than_block() {
        let mut r = Runes::new(3);
        let input = "the quick brown fox jumps over the lazy dog ".repeat(500);
        r.read_from(input.as_bytes()).unwrap();
        assert_eq!(r.size(), input.chars().count() as i64);
        assert_eq!(text(&r), input);
    }

    #[test]
    fn test_read_from_reader_error() {
        let mut r = Runes::new(2);
        assert!(matches!(r.read_from(Broken), Err(StoreError::Io(_))));
    }

    #[test]
    fn test_write_to_encodes_utf8() {
        let mut r = Runes::new(3);
        let input = "Grüße, 世界 🦀";
        r.read_from(input.as_bytes()).unwrap();
        let mut out = Vec::new();
        let n = r.write_to(&mut out).unwrap();
        assert_eq!(n, input.len() as u64);
        assert_eq!(String::from_utf8(out).unwrap(), input);
    }

    #[test]
    fn test_write_to_empty_buffer() {
        let r = Runes::new(3);
        let mut out = Vec::new();
        assert_eq!(r.write_to(&mut out).unwrap(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_write_to_writer_error() {
        let mut r = Runes::new(3);
        r.append(&chars("abc")).unwrap();
        assert!(matches!(r.write_to(Broken), Err(StoreError::Io(_))));
    }

    #[test]
    fn test_runes_from_iterates_across_blocks() {
        let mut r = Runes::new(2);
        r.append(&chars("abcdefg")).unwrap();
        let tail: String = r.runes_from(3).unwrap().map(Result::unwrap).collect();
        assert_eq!(tail, "defg");
        assert_eq!(r.runes_from(7).unwrap().count(), 0);
        assert!(r.runes_from(8).is_err());
    }

    #[test]
    fn test_scratch_backed_runes() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = Runes::scratch_in(4, dir.path()).unwrap();
        r.read_from("scratch backed ✓".as_bytes()).unwrap();
        r.put(&chars("file"), Address::new(0, 7)).unwrap();
        assert_eq!(text(&r), "file backed ✓");
        r.close().unwrap();
    }

    #[test]
    fn test_decode_utf8_leaves_incomplete_tail() {
        let mut out = Vec::new();
        let used = decode_utf8(b"ab\xe4\xb8", &mut out);
        assert_eq!(used, 2);
        assert_eq!(out, vec!['a', 'b']);
    }
}
