//! Backing storage for blocks.
//!
//! A slot is a fixed-capacity region that holds one block's bytes. Providers
//! only hand out and address slots; which slots are live and which sit in the
//! free pool is tracked by the store that owns them.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Handle to one slot of a [`Slots`] provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(usize);

impl SlotId {
    pub const fn index(self) -> usize {
        self.0
    }

    #[cfg(test)]
    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index)
    }
}

/// A provider of fixed-capacity storage slots.
pub trait Slots: fmt::Debug {
    /// Bytes per slot.
    fn capacity(&self) -> usize;

    /// Number of slots allocated so far.
    fn allocated(&self) -> usize;

    /// Allocate a fresh slot.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot grow.
    fn allocate(&mut self) -> io::Result<SlotId>;

    /// Fill `buf` from `slot` starting at `offset`.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be read.
    fn read(&self, slot: SlotId, offset: usize, buf: &mut [u8]) -> io::Result<()>;

    /// Store `data` into `slot` starting at `offset`.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be written.
    fn write(&mut self, slot: SlotId, offset: usize, data: &[u8]) -> io::Result<()>;

    /// Move `len` bytes at `src` to `dest` within the same slot.
    ///
    /// # Errors
    /// Returns an error if the backing storage fails.
    fn copy_within(&mut self, slot: SlotId, src: usize, len: usize, dest: usize) -> io::Result<()> {
        let mut tmp = vec![0; len];
        self.read(slot, src, &mut tmp)?;
        self.write(slot, dest, &tmp)
    }

    /// Drop every slot and give the storage back.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be released.
    fn release(&mut self) -> io::Result<()>;
}

impl<S: Slots + ?Sized> Slots for Box<S> {
    fn capacity(&self) -> usize {
        (**self).capacity()
    }

    fn allocated(&self) -> usize {
        (**self).allocated()
    }

    fn allocate(&mut self) -> io::Result<SlotId> {
        (**self).allocate()
    }

    fn read(&self, slot: SlotId, offset: usize, buf: &mut [u8]) -> io::Result<()> {
        (**self).read(slot, offset, buf)
    }

    fn write(&mut self, slot: SlotId, offset: usize, data: &[u8]) -> io::Result<()> {
        (**self).write(slot, offset, data)
    }

    fn copy_within(&mut self, slot: SlotId, src: usize, len: usize, dest: usize) -> io::Result<()> {
        (**self).copy_within(slot, src, len, dest)
    }

    fn release(&mut self) -> io::Result<()> {
        (**self).release()
    }
}

/// An in-memory arena of boxed slabs.
#[derive(Debug)]
pub struct MemorySlots {
    capacity: usize,
    slabs: Vec<Box<[u8]>>,
}

impl MemorySlots {
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slabs: Vec::new(),
        }
    }

    fn slab(&self, slot: SlotId) -> io::Result<&[u8]> {
        self.slabs
            .get(slot.0)
            .map(|slab| &slab[..])
            .ok_or_else(|| unknown_slot(slot))
    }
}

impl Slots for MemorySlots {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn allocated(&self) -> usize {
        self.slabs.len()
    }

    fn allocate(&mut self) -> io::Result<SlotId> {
        self.slabs.push(vec![0; self.capacity].into_boxed_slice());
        Ok(SlotId(self.slabs.len() - 1))
    }

    fn read(&self, slot: SlotId, offset: usize, buf: &mut [u8]) -> io::Result<()> {
        let slab = self.slab(slot)?;
        let src = slab
            .get(offset..offset + buf.len())
            .ok_or_else(|| out_of_slot(offset, buf.len()))?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, slot: SlotId, offset: usize, data: &[u8]) -> io::Result<()> {
        let slab = self.slabs.get_mut(slot.0).ok_or_else(|| unknown_slot(slot))?;
        let dst = slab
            .get_mut(offset..offset + data.len())
            .ok_or_else(|| out_of_slot(offset, data.len()))?;
        dst.copy_from_slice(data);
        Ok(())
    }

    fn copy_within(&mut self, slot: SlotId, src: usize, len: usize, dest: usize) -> io::Result<()> {
        let slab = self.slabs.get_mut(slot.0).ok_or_else(|| unknown_slot(slot))?;
        if src.max(dest) + len > slab.len() {
            return Err(out_of_slot(src.max(dest), len));
        }
        slab.copy_within(src..src + len, dest);
        Ok(())
    }

    fn release(&mut self) -> io::Result<()> {
        self.slabs = Vec::new();
        Ok(())
    }
}

/// Slots laid end to end in an anonymous scratch file.
///
/// Slot `k` lives at byte offset `k * capacity`. The file is unlinked on
/// creation, so the operating system reclaims it when the handle is dropped.
#[derive(Debug)]
pub struct ScratchFile {
    capacity: usize,
    count: usize,
    file: File,
}

impl ScratchFile {
    /// Create a scratch file in the system temporary directory.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn new(capacity: usize) -> io::Result<Self> {
        Ok(Self::with_file(capacity, tempfile::tempfile()?))
    }

    /// Create a scratch file inside `dir`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn in_dir(capacity: usize, dir: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::with_file(capacity, tempfile::tempfile_in(dir)?))
    }

    const fn with_file(capacity: usize, file: File) -> Self {
        Self {
            capacity,
            count: 0,
            file,
        }
    }

    fn position(&self, slot: SlotId, offset: usize, len: usize) -> io::Result<u64> {
        if slot.0 >= self.count {
            return Err(unknown_slot(slot));
        }
        if offset + len > self.capacity {
            return Err(out_of_slot(offset, len));
        }
        Ok((slot.0 * self.capacity + offset) as u64)
    }
}

impl Slots for ScratchFile {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn allocated(&self) -> usize {
        self.count
    }

    fn allocate(&mut self) -> io::Result<SlotId> {
        let len = (self.count + 1)
            .checked_mul(self.capacity)
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "scratch file size overflows")
            })?;
        self.file.set_len(len as u64)?;
        self.count += 1;
        Ok(SlotId(self.count - 1))
    }

    fn read(&self, slot: SlotId, offset: usize, buf: &mut [u8]) -> io::Result<()> {
        let pos = self.position(slot, offset, buf.len())?;
        let mut file = &self.file;
        file.seek(SeekFrom::Start(pos))?;
        file.read_exact(buf)
    }

    fn write(&mut self, slot: SlotId, offset: usize, data: &[u8]) -> io::Result<()> {
        let pos = self.position(slot, offset, data.len())?;
        self.file.seek(SeekFrom::Start(pos))?;
        self.file.write_all(data)
    }

    fn release(&mut self) -> io::Result<()> {
        self.count = 0;
        self.file.set_len(0)
    }
}

fn unknown_slot(slot: SlotId) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("unknown slot {}", slot.0),
    )
}

fn out_of_slot(offset: usize, len: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("range {offset}+{len} exceeds slot capacity"),
    )
}
