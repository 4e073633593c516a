//! Codec configuration and representation limits.

use crate::compression::CompressionMode;
use crate::slot::SlotBits;

/// Largest shift a checked strategy accepts. One low bit must stay free
/// for the overflow tag.
pub const MAX_CHECKED_SHIFT: u32 = 3;

/// Largest shift an unchecked strategy accepts.
pub const MAX_UNCHECKED_SHIFT: u32 = 4;

/// Addresses below this never fix a global mask.
///
/// No allocation lives here; the only such addresses are the dangling
/// pointers of zero-sized pointees.
pub const NULL_PAGE_BYTES: usize = 4096;

/// Largest overflow index that still fits the tagged slot encoding.
///
/// Index `i` is stored as `((i + 1) << 1) | 1` in a [`SlotBits`].
pub const MAX_OVERFLOW_INDEX: u32 = (SlotBits::MAX >> 1) - 1;

/// Largest length a packed array header can carry (31 bits).
pub const MAX_ARRAY_LEN: usize = (1 << 31) - 1;

/// Description of an active compression strategy.
///
/// Obtained from [`Compression::config`](crate::Compression::config). The
/// values are fixed at build time; this type only reports them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodecConfig {
    /// Number of low address bits dropped by direct compression.
    pub shift: u32,

    /// How addresses that do not fit are handled.
    pub mode: CompressionMode,

    /// Whether a process-wide high-bit mask extends the window.
    ///
    /// Controlled by the `global-mask` cargo feature. Without it only
    /// addresses whose high bits are zero compress directly.
    pub masked: bool,
}

impl CodecConfig {
    /// Bytes addressable through one mask value: `2^(32 + shift)`.
    ///
    /// Zero for [`CompressionMode::TableOnly`], which never compresses.
    pub fn window_bytes(&self) -> u64 {
        match self.mode {
            CompressionMode::TableOnly => 0,
            _ => 1u64 << (32 + self.shift),
        }
    }

    /// Alignment an address needs to be stored directly.
    pub fn required_alignment(&self) -> usize {
        match self.mode {
            CompressionMode::Checked => 1 << (self.shift + 1),
            CompressionMode::Unchecked => 1 << self.shift,
            CompressionMode::TableOnly => 1,
        }
    }

    /// Low bits of a direct slot that carry no address information.
    pub fn free_low_bits(&self) -> u32 {
        match self.mode {
            CompressionMode::Checked => 1,
            _ => 0,
        }
    }
}
