use std::fmt;
use std::io;

use tracing::{debug, trace};

use super::block::{Block, locate};
use super::reader::BytesReader;
use super::slots::{MemorySlots, ScratchFile, SlotId, Slots};
use crate::address::{Address, AddressError};
use crate::error::{Result, StoreError};

/// Block capacity used when a caller asks for a block size of zero.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// An editable, unbounded byte buffer.
///
/// Content is the in-order concatenation of a list of blocks, each holding at
/// most `block_size` bytes in a slot of the backing [`Slots`] provider.
/// Vacated slots go to a free pool and are reused before the provider is asked
/// for fresh ones. Adjacent undersized blocks are never merged.
///
/// A store is not internally synchronized. Callers sharing one between threads
/// must serialize access themselves, e.g. with one mutex per buffer.
#[derive(Debug)]
pub struct Bytes<S: Slots = MemorySlots> {
    slots: S,
    blocks: Vec<Block>,
    free: Vec<SlotId>,
    size: usize,
}

/// A snapshot of a store's block structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub size: i64,
    pub block_size: usize,
    pub blocks: usize,
    pub free: usize,
    pub allocated: usize,
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "size={} block_size={} blocks={} free={} allocated={}",
            self.size, self.block_size, self.blocks, self.free, self.allocated
        )
    }
}

const fn normalize_block_size(block_size: usize) -> usize {
    if block_size == 0 {
        DEFAULT_BLOCK_SIZE
    } else {
        block_size
    }
}

impl Bytes<MemorySlots> {
    /// Create an empty in-memory store. A `block_size` of zero selects
    /// [`DEFAULT_BLOCK_SIZE`].
    pub fn new(block_size: usize) -> Self {
        Self::with_slots(MemorySlots::new(normalize_block_size(block_size)))
    }
}

impl Bytes<ScratchFile> {
    /// Create an empty store backed by an anonymous scratch file.
    ///
    /// # Errors
    /// Returns an error if the scratch file cannot be created.
    pub fn scratch(block_size: usize) -> io::Result<Self> {
        Ok(Self::with_slots(ScratchFile::new(normalize_block_size(
            block_size,
        ))?))
    }
}

impl<S: Slots> Bytes<S> {
    /// Create an empty store over `slots`. The block size is the slot capacity.
    ///
    /// # Panics
    /// Panics if the provider's slot capacity is zero.
    pub fn with_slots(slots: S) -> Self {
        assert!(slots.capacity() > 0, "slot capacity must be positive");
        Self {
            slots,
            blocks: Vec::new(),
            free: Vec::new(),
            size: 0,
        }
    }

    /// Maximum bytes per block.
    pub fn block_size(&self) -> usize {
        self.slots.capacity()
    }

    /// Total live content in bytes.
    pub const fn size(&self) -> i64 {
        self.size as i64
    }

    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Content length of each block, in list order.
    pub fn block_sizes(&self) -> Vec<usize> {
        self.blocks.iter().map(|b| b.n).collect()
    }

    /// Number of vacated slots waiting for reuse.
    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    /// Number of slots ever taken from the backing provider.
    pub fn allocated_slots(&self) -> usize {
        self.slots.allocated()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            size: self.size(),
            block_size: self.block_size(),
            blocks: self.block_count(),
            free: self.free_len(),
            allocated: self.allocated_slots(),
        }
    }

    /// Return a copy of the bytes named by `at`.
    ///
    /// # Errors
    /// Returns an address error if `at` is out of range, or an I/O error from
    /// the backing storage.
    pub fn read(&self, at: Address) -> Result<Vec<u8>> {
        let at = at.validate(self.size())?;
        let mut buf = vec![0; at.size() as usize];
        self.copy_out(at.from as usize, &mut buf)?;
        Ok(buf)
    }

    /// Replace the range `at` with `data`, returning the bytes written.
    ///
    /// The address is checked before anything is touched, so an invalid
    /// address leaves the store unchanged.
    ///
    /// # Errors
    /// Returns an address error if `at` is out of range, or an I/O error from
    /// the backing storage.
    pub fn write(&mut self, data: &[u8], at: Address) -> Result<usize> {
        let at = at.validate(self.size())?;
        self.delete(at.size(), at.from)?;
        self.insert(data, at.from)
    }

    /// Fill `buf` from byte offset `at`, returning the number of bytes copied.
    ///
    /// An empty `buf` always succeeds with 0.
    ///
    /// # Errors
    /// Returns an address error on the point `at` if it is negative, and
    /// [`StoreError::EndOfData`] if `at` is at or past the end of the store.
    pub fn read_at(&self, buf: &mut [u8], at: i64) -> Result<usize> {
        if at < 0 {
            return Err(AddressError(Address::point(at)).into());
        }
        if buf.is_empty() {
            return Ok(0);
        }
        if at >= self.size() {
            return Err(StoreError::EndOfData);
        }
        let at = at as usize;
        let n = buf.len().min(self.size - at);
        self.copy_out(at, &mut buf[..n])?;
        Ok(n)
    }

    /// An [`io::Read`] cursor over the store starting at byte `at`.
    pub const fn reader(&self, at: i64) -> BytesReader<'_, S> {
        BytesReader::new(self, at)
    }

    /// Insert `data` at byte offset `at`, returning the bytes inserted.
    ///
    /// Inserting strictly inside a block splits it into a left and a right
    /// block; inserting on a block boundary leaves existing blocks untouched.
    /// The data itself is laid out in fresh blocks of at most `block_size`
    /// bytes each, taken from the free pool first.
    ///
    /// # Errors
    /// Returns an address error on the point `at` unless `0 <= at <= size`,
    /// or an I/O error from the backing storage.
    pub fn insert(&mut self, data: &[u8], at: i64) -> Result<usize> {
        if at < 0 || at > self.size() {
            return Err(AddressError(Address::point(at)).into());
        }
        if data.is_empty() {
            return Ok(0);
        }

        let pos = locate(&self.blocks, at as usize);
        let mut fresh = Vec::with_capacity(data.len().div_ceil(self.block_size()) + 1);
        if let Err(err) = self.build_blocks(data, pos.index, pos.offset, &mut fresh) {
            self.free.extend(fresh.iter().map(|b| b.slot));
            return Err(err);
        }

        let splice_at = if pos.is_interior() {
            // The left half keeps the original slot.
            self.blocks[pos.index].n = pos.offset;
            debug!(
                block = pos.index,
                left = pos.offset,
                right = fresh.last().map_or(0, |b| b.n),
                "split block"
            );
            pos.index + 1
        } else {
            pos.index
        };
        trace!(at, len = data.len(), blocks = fresh.len(), "splice");
        self.blocks.splice(splice_at..splice_at, fresh);
        self.size += data.len();
        Ok(data.len())
    }

    /// Remove `count` bytes starting at byte offset `at`, returning the bytes
    /// removed.
    ///
    /// Wholly covered blocks go back to the free pool; partially covered
    /// blocks are trimmed in place and keep their slots.
    ///
    /// # Errors
    /// Returns [`StoreError::NegativeCount`] if `count < 0`, an address error
    /// if `[at, at + count)` is not inside the store, or an I/O error from the
    /// backing storage.
    pub fn delete(&mut self, count: i64, at: i64) -> Result<usize> {
        if count < 0 {
            return Err(StoreError::NegativeCount(count));
        }
        if at < 0 || at > self.size() {
            return Err(AddressError(Address::point(at)).into());
        }
        let end = at
            .checked_add(count)
            .filter(|&end| end <= self.size())
            .ok_or(AddressError(Address::new(at, at.saturating_add(count))))?;
        if count == 0 {
            return Ok(0);
        }
        let (lo, hi) = (at as usize, end as usize);

        // Only the block that `hi` falls strictly inside needs its bytes moved.
        // Do that first so the list surgery below cannot fail halfway.
        let tail = locate(&self.blocks, hi);
        if tail.is_interior() {
            let start = hi - tail.offset;
            let block = self.blocks[tail.index];
            let dest = lo.saturating_sub(start);
            self.slots
                .copy_within(block.slot, tail.offset, block.n - tail.offset, dest)?;
        }

        let free = &mut self.free;
        let mut start = 0;
        let mut freed = 0;
        self.blocks.retain_mut(|block| {
            let block_start = start;
            let block_end = start + block.n;
            start = block_end;
            if block_end <= lo || block_start >= hi {
                return true;
            }
            let cut_from = lo.max(block_start) - block_start;
            let cut_to = hi.min(block_end) - block_start;
            block.n -= cut_to - cut_from;
            if block.n == 0 {
                free.push(block.slot);
                freed += 1;
                return false;
            }
            true
        });
        if freed > 0 {
            debug!(freed, pool = self.free.len(), "freed blocks");
        }
        self.size -= hi - lo;
        Ok(hi - lo)
    }

    /// Release all backing storage, including the free pool.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be released.
    pub fn close(mut self) -> io::Result<()> {
        self.blocks.clear();
        self.free.clear();
        self.size = 0;
        self.slots.release()
    }

    /// Build the blocks replacing position `index`/`offset`: one per
    /// `block_size` piece of `data`, followed by the right half of block
    /// `index` when `offset` is interior.
    fn build_blocks(
        &mut self,
        data: &[u8],
        index: usize,
        offset: usize,
        out: &mut Vec<Block>,
    ) -> Result<()> {
        for piece in data.chunks(self.block_size()) {
            let block = self.new_block(piece)?;
            out.push(block);
        }
        if offset > 0 {
            let left = self.blocks[index];
            let mut right = vec![0; left.n - offset];
            self.slots.read(left.slot, offset, &mut right)?;
            let block = self.new_block(&right)?;
            out.push(block);
        }
        Ok(())
    }

    fn new_block(&mut self, content: &[u8]) -> Result<Block> {
        let slot = match self.free.pop() {
            Some(slot) => {
                trace!(slot = slot.index(), "reuse free slot");
                slot
            }
            None => self.slots.allocate()?,
        };
        if let Err(err) = self.slots.write(slot, 0, content) {
            self.free.push(slot);
            return Err(err.into());
        }
        Ok(Block::new(slot, content.len()))
    }

    /// Copy `buf.len()` bytes starting at `at`. The range must be in bounds.
    fn copy_out(&self, at: usize, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let pos = locate(&self.blocks, at);
        let mut offset = pos.offset;
        let mut filled = 0;
        for block in &self.blocks[pos.index..] {
            let n = (block.n - offset).min(buf.len() - filled);
            self.slots
                .read(block.slot, offset, &mut buf[filled..filled + n])?;
            filled += n;
            offset = 0;
            if filled == buf.len() {
                break;
            }
        }
        Ok(())
    }
}
