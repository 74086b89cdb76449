// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. store::StoreStats)
    clippy::module_name_repetitions
)]

//! # Runebuf
//!
//! An editable, unbounded text buffer.
//!
//! Runebuf stores text in a list of fixed-capacity blocks:
//! - Byte-addressed insert, delete, replace and random-access reads
//! - Interior inserts split one block; boundary inserts touch none
//! - Vacated block slots are recycled through a per-buffer free pool
//! - A rune layer stores each code point as a fixed 4-byte record
//!
//! ## Architecture
//!
//! - **Address**: half-open `[from, to)` ranges, validated at use
//! - **Bytes**: the block-list store and its slot backings
//! - **Runes**: code-point addressing and UTF-8 stream import/export
//!
//! Buffers are not internally synchronized. Anything that shares one buffer
//! between threads must serialize access to it.
//!
//! ## Modules
//!
//! - [`address`]: Ranges and address errors
//! - [`error`]: Store error taxonomy
//! - [`store`]: Block-list byte store
//! - [`runes`]: Rune layer
//! - [`splice`]: `FROM,TO:TEXT` edit directives
//! - [`config`]: Persisted defaults and buffer options
//! - [`perf`]: Timing scopes

pub mod address;
pub mod config;
pub mod error;
pub mod perf;
pub mod runes;
pub mod splice;
pub mod store;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::address::{Address, AddressError};
    pub use crate::error::{RuneReadError, StoreError};
    pub use crate::runes::Runes;
    pub use crate::store::{Bytes, Slots};
}
