use super::slots::SlotId;

/// One run of live content, held in the first `n` bytes of its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Block {
    pub slot: SlotId,
    pub n: usize,
}

impl Block {
    pub const fn new(slot: SlotId, n: usize) -> Self {
        Self { slot, n }
    }
}

/// Where an offset falls in the block list.
///
/// `index` is the first block whose content extends past the offset, or the
/// block count when the offset is the end of the store. `offset` is local to
/// that block and is always less than its `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Position {
    pub index: usize,
    pub offset: usize,
}

impl Position {
    /// Whether the offset falls strictly inside a block.
    pub const fn is_interior(&self) -> bool {
        self.offset > 0
    }
}

/// Find the block holding byte `at`.
pub(crate) fn locate(blocks: &[Block], at: usize) -> Position {
    let mut start = 0;
    for (index, block) in blocks.iter().enumerate() {
        if at < start + block.n {
            return Position {
                index,
                offset: at - start,
            };
        }
        start += block.n;
    }
    Position {
        index: blocks.len(),
        offset: 0,
    }
}
