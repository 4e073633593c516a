//! Core representation layer for wisp compressed pointers.
//!
//! This is the leaf crate of the workspace. It turns native addresses into
//! 32-bit [`Slot`]s and back, and owns the two pieces of process-wide state
//! that make that possible:
//!
//! - [`GlobalMask`]: the high-bit pattern shared by every directly
//!   compressed address, fixed lazily by the first one.
//! - [`OverflowTable`]: a side table for addresses that cannot be
//!   compressed. Slots naming it carry a tagged index instead.
//!
//! ```text
//! addr ──► Compression::try_compress ──► Direct(addr >> SHIFT)
//!              │ (misaligned / outside the mask window)
//!              └──► OverflowTable::insert ──► Indexed(i)
//! ```
//!
//! Ownership semantics live in `wisp-ptr`; nothing here frees pointees.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod alloc;
pub mod codec;
pub mod compression;
pub mod config;
pub mod error;
pub mod mask;
pub mod overflow;
pub mod slot;

pub use compression::{Compression, CompressionMode, DefaultCompression, Shifted, TableOnly};
#[cfg(feature = "unchecked")]
pub use compression::Unchecked;
pub use config::CodecConfig;
pub use error::{violation, CoreError};
pub use mask::GlobalMask;
pub use overflow::{OverflowStats, OverflowTable};
pub use slot::{Slot, SlotBits, SlotCell, SlotRepr};
