//! Process-wide high-bit masks.
//!
//! Direct slots only carry 32 bits of an address. The remaining high bits
//! come from a mask fixed by the first address that compresses. One mask
//! exists per shift width, so strategies with different windows never
//! disagree about it.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Number of distinct shift widths (`0..=MAX_UNCHECKED_SHIFT`).
const SHIFT_COUNT: usize = crate::config::MAX_UNCHECKED_SHIFT as usize + 1;

static MASKS: [GlobalMask; SHIFT_COUNT] = [const { GlobalMask::new() }; SHIFT_COUNT];

/// A lazily fixed high-bit mask.
///
/// Starts unset. The first call to [`admit`](Self::admit) stores its high
/// bits with compare-and-swap; every later call only compares. The mask is
/// never reset.
///
/// The codec never fixes a mask from an address below
/// [`NULL_PAGE_BYTES`](crate::config::NULL_PAGE_BYTES). Checked strategies
/// spill such addresses until a heap address has fixed the mask.
pub struct GlobalMask {
    value: AtomicUsize,
}

impl GlobalMask {
    /// Sentinel stored while no address has fixed the mask.
    pub const UNSET: usize = usize::MAX;

    /// Create an unset mask.
    ///
    /// Codec paths use the shared instances from [`for_shift`](Self::for_shift);
    /// separate instances are mostly useful in tests.
    pub const fn new() -> Self {
        Self {
            value: AtomicUsize::new(Self::UNSET),
        }
    }

    /// The process-wide mask for `shift`.
    ///
    /// # Panics
    ///
    /// Panics if `shift` exceeds the largest unchecked shift.
    pub fn for_shift(shift: u32) -> &'static Self {
        &MASKS[shift as usize]
    }

    /// High bits of `addr` outside a `2^(32 + shift)` window.
    pub fn high_bits(addr: usize, shift: u32) -> usize {
        let window = 32 + shift;
        (((addr as u64) >> window) << window) as usize
    }

    /// The fixed mask, if any.
    pub fn get(&self) -> Option<usize> {
        match self.value.load(Ordering::Acquire) {
            Self::UNSET => None,
            mask => Some(mask),
        }
    }

    /// Mask bits to OR into an expanded address. Zero while unset.
    pub fn bits(&self) -> usize {
        self.get().unwrap_or(0)
    }

    /// Whether `high` (from [`high_bits`](Self::high_bits)) may be stored
    /// directly, fixing the mask if it is still unset.
    #[cfg(feature = "global-mask")]
    pub fn admit(&self, high: usize) -> bool {
        match self.value.compare_exchange(
            Self::UNSET,
            high,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                tracing::debug!(mask = high, "global address mask fixed");
                true
            }
            Err(current) => current == high,
        }
    }

    /// Whether `high` (from [`high_bits`](Self::high_bits)) may be stored
    /// directly. Without the `global-mask` feature only zero qualifies.
    #[cfg(not(feature = "global-mask"))]
    pub fn admit(&self, high: usize) -> bool {
        high == 0
    }
}

impl Default for GlobalMask {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GlobalMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.get() {
            Some(mask) => write!(f, "GlobalMask({mask:#x})"),
            None => f.write_str("GlobalMask(unset)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_bits_respect_window() {
        assert_eq!(GlobalMask::high_bits(0x1234_5678, 0), 0);
        assert_eq!(GlobalMask::high_bits(0x1_0000_0000, 0), 0x1_0000_0000);
        assert_eq!(GlobalMask::high_bits(0x1_0000_0000, 3), 0);
        assert_eq!(GlobalMask::high_bits(0x8_0000_0000, 3), 0x8_0000_0000);
    }

    #[test]
    fn unset_mask_contributes_nothing() {
        let mask = GlobalMask::new();
        assert_eq!(mask.get(), None);
        assert_eq!(mask.bits(), 0);
    }

    #[test]
    fn zero_high_bits_always_admitted() {
        let mask = GlobalMask::new();
        assert!(mask.admit(0));
        assert!(mask.admit(0));
    }

    #[cfg(all(feature = "global-mask", target_pointer_width = "64"))]
    #[test]
    fn first_admission_fixes_mask() {
        let mask = GlobalMask::new();
        assert!(mask.admit(0x7f00_0000_0000));
        assert_eq!(mask.get(), Some(0x7f00_0000_0000));
        assert!(mask.admit(0x7f00_0000_0000));
        assert!(!mask.admit(0x5500_0000_0000));
        assert_eq!(mask.get(), Some(0x7f00_0000_0000));
    }

    #[cfg(all(not(feature = "global-mask"), target_pointer_width = "64"))]
    #[test]
    fn unmasked_rejects_high_addresses() {
        let mask = GlobalMask::new();
        assert!(!mask.admit(0x7f00_0000_0000));
        assert_eq!(mask.get(), None);
    }

    #[cfg(all(feature = "global-mask", target_pointer_width = "64"))]
    #[test]
    fn concurrent_admission_has_one_winner() {
        let mask = GlobalMask::new();
        let winners: Vec<bool> = std::thread::scope(|s| {
            let handles: Vec<_> = (1..=8usize)
                .map(|i| {
                    let mask = &mask;
                    s.spawn(move || mask.admit(i << 40))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(winners.iter().filter(|w| **w).count(), 1);
        let fixed = mask.get().unwrap();
        assert!((1..=8usize).any(|i| fixed == i << 40));
    }

    #[test]
    fn shared_masks_are_per_shift() {
        let a = GlobalMask::for_shift(0) as *const GlobalMask;
        let b = GlobalMask::for_shift(3) as *const GlobalMask;
        assert_ne!(a, b);
    }
}
