//! Build-time compression strategies.
//!
//! A strategy is a zero-sized type implementing the sealed [`Compression`]
//! trait. Handles carry it as a type parameter, so the choice costs nothing
//! at runtime and two handles with different strategies never mix.

use crate::config::{CodecConfig, MAX_CHECKED_SHIFT};
#[cfg(feature = "unchecked")]
use crate::config::MAX_UNCHECKED_SHIFT;
use crate::mask::GlobalMask;

mod sealed {
    pub trait Sealed {}
}

/// How a strategy treats addresses that do not fit a direct slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompressionMode {
    /// Check alignment and mask; spill to the overflow table on failure.
    Checked,
    /// Store `addr >> SHIFT` with no checks and no fallback.
    Unchecked,
    /// Always spill to the overflow table.
    TableOnly,
}

/// A compile-time address compression strategy.
///
/// Sealed: the codec relies on the exact set of modes.
pub trait Compression: sealed::Sealed + Send + Sync + 'static {
    /// Number of low address bits dropped by direct compression.
    const SHIFT: u32;

    /// Fallback behavior.
    const MODE: CompressionMode;

    /// Minimum pointee alignment the strategy needs to be correct.
    ///
    /// Checked strategies fall back at runtime and need none.
    const MIN_ALIGN: usize = 1;

    /// The process-wide mask this strategy compresses against.
    fn mask() -> &'static GlobalMask {
        GlobalMask::for_shift(Self::SHIFT)
    }

    /// Report the strategy's parameters.
    fn config() -> CodecConfig {
        CodecConfig {
            shift: Self::SHIFT,
            mode: Self::MODE,
            masked: cfg!(feature = "global-mask"),
        }
    }
}

/// Checked compression dropping `S` low bits (`S <= 3`).
///
/// Addresses must be aligned to `2^(S + 1)`; the extra bit tags overflow
/// indices. Anything else goes to the overflow table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Shifted<const S: u32>;

impl<const S: u32> sealed::Sealed for Shifted<S> {}

impl<const S: u32> Compression for Shifted<S> {
    const SHIFT: u32 = {
        assert!(S <= MAX_CHECKED_SHIFT, "checked shift must be at most 3");
        S
    };
    const MODE: CompressionMode = CompressionMode::Checked;
}

/// Stores every address in the overflow table at full width.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TableOnly;

impl sealed::Sealed for TableOnly {}

impl Compression for TableOnly {
    const SHIFT: u32 = 0;
    const MODE: CompressionMode = CompressionMode::TableOnly;
}

/// Unchecked compression dropping `S` low bits (`S <= 4`).
///
/// No tag bit, no range check, no overflow fallback. An address outside the
/// `2^(32 + S)` window around the mask decodes to a different address, and
/// an address equal to the mask itself decodes as null. Only use this when
/// every pointee lives in one known region.
#[cfg(feature = "unchecked")]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Unchecked<const S: u32>;

#[cfg(feature = "unchecked")]
impl<const S: u32> sealed::Sealed for Unchecked<S> {}

#[cfg(feature = "unchecked")]
impl<const S: u32> Compression for Unchecked<S> {
    const SHIFT: u32 = {
        assert!(S <= MAX_UNCHECKED_SHIFT, "unchecked shift must be at most 4");
        S
    };
    const MODE: CompressionMode = CompressionMode::Unchecked;
    const MIN_ALIGN: usize = 1 << S;
}

/// The strategy used when none is named: 8-byte granularity, 32 GiB window.
pub type DefaultCompression = Shifted<3>;
