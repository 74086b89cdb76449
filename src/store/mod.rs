//! The block-list byte store.
//!
//! [`Bytes`] keeps its content in an ordered list of fixed-capacity blocks,
//! each backed by a slot from a [`Slots`] provider, and recycles vacated
//! slots through a per-store free pool.

mod block;
mod bytes;
mod reader;
mod slots;

pub use bytes::{Bytes, DEFAULT_BLOCK_SIZE, StoreStats};
pub use reader::BytesReader;
pub use slots::{MemorySlots, ScratchFile, SlotId, Slots};
