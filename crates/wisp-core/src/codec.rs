//! Address ⇄ slot conversion.
//!
//! `encode` allocates an overflow entry when it has to; every slot it
//! returns must eventually reach [`release`] (or be passed as `old` to
//! [`replace`]). [`SlotCell`](crate::SlotCell) does this bookkeeping, and
//! most callers should go through it rather than these functions.

use crate::compression::{Compression, CompressionMode};
use crate::config::NULL_PAGE_BYTES;
use crate::error::violation;
use crate::mask::GlobalMask;
use crate::overflow::{self, OverflowTable};
use crate::slot::{Slot, SlotBits, SlotRepr};

/// Direct encoding of `addr` under strategy `C`, if it has one.
///
/// Does not handle null and never touches the overflow table. May fix the
/// strategy's global mask.
pub fn try_compress<C: Compression>(addr: usize) -> Option<SlotBits> {
    compress_with(C::mask(), C::SHIFT, C::MODE, addr)
}

/// [`try_compress`] against an explicit mask.
pub fn compress_with(
    mask: &GlobalMask,
    shift: u32,
    mode: CompressionMode,
    addr: usize,
) -> Option<SlotBits> {
    match mode {
        CompressionMode::TableOnly => None,
        CompressionMode::Checked => {
            // One bit beyond the shift stays clear for the overflow tag.
            let align_bits = (1usize << (shift + 1)) - 1;
            if addr & align_bits != 0 {
                return None;
            }
            if pins_null_page(mask, addr) || !mask.admit(GlobalMask::high_bits(addr, shift)) {
                return None;
            }
            let bits = low_bits(addr, shift);
            (bits != 0).then_some(bits)
        }
        CompressionMode::Unchecked => {
            if !pins_null_page(mask, addr) {
                mask.admit(GlobalMask::high_bits(addr, shift));
            }
            Some(low_bits(addr, shift))
        }
    }
}

/// Whether `addr` would be the first to fix `mask` from inside the null
/// page, tying every later heap address to the overflow table.
fn pins_null_page(mask: &GlobalMask, addr: usize) -> bool {
    cfg!(feature = "global-mask") && addr < NULL_PAGE_BYTES && mask.get().is_none()
}

/// Expand direct bits back into an address.
pub fn expand_with(mask: &GlobalMask, shift: u32, bits: SlotBits) -> usize {
    (((bits as u64) << shift) as usize) | mask.bits()
}

fn low_bits(addr: usize, shift: u32) -> SlotBits {
    ((addr as u64) >> shift) as SlotBits
}

/// Overflow index named by `slot` under strategy `C`.
///
/// Unchecked strategies have no tag bit, so their slots never name one.
pub fn overflow_index<C: Compression>(slot: Slot) -> Option<u32> {
    match C::MODE {
        CompressionMode::Unchecked => None,
        _ => slot.index(),
    }
}

/// Encode `addr` into a slot, spilling to the overflow table if needed.
pub fn encode<C: Compression>(addr: usize) -> Slot {
    if addr == 0 {
        return Slot::EMPTY;
    }
    match try_compress::<C>(addr) {
        Some(bits) => Slot::from_bits(bits),
        None => spill(addr),
    }
}

/// Decode a slot produced by [`encode`] or [`replace`].
///
/// A tagged slot whose entry has been vacated decodes to 0.
pub fn decode<C: Compression>(slot: Slot) -> usize {
    match overflow_index::<C>(slot) {
        Some(index) => overflow::global().read().lookup(index),
        None if slot.is_empty() => 0,
        None => expand_with(C::mask(), C::SHIFT, slot.bits()),
    }
}

/// Decode against an already locked table.
pub fn decode_with<C: Compression>(table: &OverflowTable, slot: Slot) -> usize {
    match overflow_index::<C>(slot) {
        Some(index) => table.lookup(index),
        None if slot.is_empty() => 0,
        None => expand_with(C::mask(), C::SHIFT, slot.bits()),
    }
}

/// Re-encode a holder that currently stores `old` so it stores `addr`.
///
/// A tagged `old` is updated in place when `addr` also needs the table and
/// released when it does not.
pub fn replace<C: Compression>(old: Slot, addr: usize) -> Slot {
    let old_index = overflow_index::<C>(old);
    if addr == 0 {
        release::<C>(old);
        return Slot::EMPTY;
    }
    if let Some(bits) = try_compress::<C>(addr) {
        release::<C>(old);
        return Slot::from_bits(bits);
    }
    match old_index {
        Some(index) => {
            overflow::global().write().update(index, addr);
            old
        }
        None => spill(addr),
    }
}

/// Give back the overflow entry held by `slot`, if any.
pub fn release<C: Compression>(slot: Slot) {
    if let Some(index) = overflow_index::<C>(slot) {
        let freed = overflow::global().write().remove(index);
        tracing::trace!(index, released = freed.is_some(), "overflow entry released");
    }
}

fn spill(addr: usize) -> Slot {
    let index = match overflow::global().write().insert(addr) {
        Ok(index) => index,
        Err(err) => violation(&err.to_string()),
    };
    tracing::trace!(addr, index, "address spilled to overflow table");
    Slot::indexed(index)
}

/// Describe how `slot` is represented under strategy `C`.
pub fn repr<C: Compression>(slot: Slot) -> SlotRepr {
    match (slot.is_empty(), overflow_index::<C>(slot)) {
        (true, _) => SlotRepr::Null,
        (false, Some(index)) => SlotRepr::Indexed(index),
        (false, None) => SlotRepr::Direct(slot.bits()),
    }
}
