//! The 32-bit compressed slot and its owning cell.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::codec;
use crate::compression::Compression;
use crate::overflow;

/// Raw storage type of a slot.
pub type SlotBits = u32;

/// A compressed reference: null, direct bits, or a tagged overflow index.
///
/// A `Slot` is plain data. It does not own its overflow entry; see
/// [`SlotCell`] for the owning form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Slot(SlotBits);

impl Slot {
    /// The null slot.
    pub const EMPTY: Slot = Slot(0);

    /// Wrap raw bits.
    pub const fn from_bits(bits: SlotBits) -> Self {
        Self(bits)
    }

    /// Slot naming overflow entry `index`.
    pub const fn indexed(index: u32) -> Self {
        debug_assert!(index <= crate::config::MAX_OVERFLOW_INDEX);
        Self(((index + 1) << 1) | 1)
    }

    /// Raw bits.
    pub const fn bits(self) -> SlotBits {
        self.0
    }

    /// Whether this is the null slot.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The overflow index if the tag bit is set.
    ///
    /// Meaningless for unchecked strategies, which have no tag bit; use
    /// [`codec::overflow_index`] when the strategy is known.
    pub const fn index(self) -> Option<u32> {
        if self.0 & 1 == 1 {
            (self.0 >> 1).checked_sub(1)
        } else {
            None
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slot({:#010x})", self.0)
    }
}

/// Tagged view of a slot under a known strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotRepr {
    /// No address.
    Null,
    /// Address stored in the slot itself.
    Direct(SlotBits),
    /// Address stored in the overflow table at this index.
    Indexed(u32),
}

/// An atomically stored slot that owns its overflow entry.
///
/// Every reassignment and the final drop release the entry, so no two
/// cells ever share an overflow index. Copying an address into another
/// holder goes through [`SlotCell::new`], which encodes it afresh.
pub struct SlotCell<C: Compression> {
    bits: AtomicU32,
    _strategy: PhantomData<fn() -> C>,
}

impl<C: Compression> SlotCell<C> {
    /// A cell holding no address.
    pub const fn empty() -> Self {
        Self {
            bits: AtomicU32::new(0),
            _strategy: PhantomData,
        }
    }

    /// A cell holding `addr` (0 for none).
    pub fn new(addr: usize) -> Self {
        Self {
            bits: AtomicU32::new(codec::encode::<C>(addr).bits()),
            _strategy: PhantomData,
        }
    }

    /// Current slot value.
    pub fn slot(&self) -> Slot {
        Slot(self.bits.load(Ordering::Acquire))
    }

    /// Decoded address, 0 when empty.
    pub fn addr(&self) -> usize {
        let slot = self.slot();
        if codec::overflow_index::<C>(slot).is_none() {
            return codec::decode::<C>(slot);
        }
        // Reload under the lock so a concurrent `clear` cannot hand our
        // index to someone else between the load and the lookup.
        let table = overflow::global().read();
        codec::decode_with::<C>(&table, self.slot())
    }

    /// Whether the cell holds no address.
    pub fn is_empty(&self) -> bool {
        self.slot().is_empty()
    }

    /// Whether the address is stored directly (or the cell is empty).
    pub fn is_compressed(&self) -> bool {
        codec::overflow_index::<C>(self.slot()).is_none()
    }

    /// Representation of the current value.
    pub fn repr(&self) -> SlotRepr {
        codec::repr::<C>(self.slot())
    }

    /// Store `addr`, releasing or reusing the previous overflow entry.
    pub fn set(&mut self, addr: usize) {
        let bits = self.bits.get_mut();
        *bits = codec::replace::<C>(Slot(*bits), addr).bits();
    }

    /// Store `addr` and return the previous address.
    pub fn swap(&mut self, addr: usize) -> usize {
        let old = self.addr();
        self.set(addr);
        old
    }

    /// Empty the cell and return the previous address.
    pub fn take(&mut self) -> usize {
        self.swap(0)
    }

    /// Store `addr` if the cell is empty.
    ///
    /// Lock-free with respect to other `fill_if_empty` callers. On failure
    /// the freshly encoded slot is released and the address already stored
    /// is returned.
    pub fn fill_if_empty(&self, addr: usize) -> Result<(), usize> {
        let slot = codec::encode::<C>(addr);
        match self
            .bits
            .compare_exchange(0, slot.bits(), Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(()),
            Err(_) => {
                codec::release::<C>(slot);
                Err(self.addr())
            }
        }
    }

    /// Empty the cell through a shared reference and return the old address.
    ///
    /// Serialized against [`addr`](Self::addr) reads of tagged slots by the
    /// overflow table lock.
    pub fn clear(&self) -> usize {
        let current = self.slot();
        if codec::overflow_index::<C>(current).is_none()
            && self
                .bits
                .compare_exchange(current.bits(), 0, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            return codec::decode::<C>(current);
        }
        let mut table = overflow::global().write();
        let old = Slot(self.bits.swap(0, Ordering::AcqRel));
        let addr = codec::decode_with::<C>(&table, old);
        if let Some(index) = codec::overflow_index::<C>(old) {
            table.remove(index);
        }
        addr
    }
}

impl<C: Compression> Default for SlotCell<C> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<C: Compression> Drop for SlotCell<C> {
    fn drop(&mut self) {
        codec::release::<C>(Slot(*self.bits.get_mut()));
    }
}

impl<C: Compression> fmt::Debug for SlotCell<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotCell")
            .field("repr", &self.repr())
            .field("addr", &format_args!("{:#x}", self.addr()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::{DefaultCompression, TableOnly};

    #[test]
    fn tag_encoding() {
        assert_eq!(Slot::indexed(0).bits(), 0b11);
        assert_eq!(Slot::indexed(5).bits(), (6 << 1) | 1);
        assert_eq!(Slot::indexed(5).index(), Some(5));
        assert_eq!(Slot::from_bits(0x40).index(), None);
        assert_eq!(Slot::EMPTY.index(), None);
        assert_eq!(Slot::from_bits(1).index(), None);
    }

    #[test]
    fn slot_is_four_bytes() {
        assert_eq!(std::mem::size_of::<Slot>(), 4);
        assert_eq!(std::mem::size_of::<SlotCell<DefaultCompression>>(), 4);
    }

    #[test]
    fn cell_round_trip() {
        let value = Box::new(17u64);
        let addr = &*value as *const u64 as usize;
        let cell = SlotCell::<DefaultCompression>::new(addr);
        assert_eq!(cell.addr(), addr);
        assert!(!cell.is_empty());
    }

    #[test]
    fn table_only_cell_releases_on_drop() {
        let value = Box::new(3u32);
        let addr = &*value as *const u32 as usize;
        let cell = SlotCell::<TableOnly>::new(addr);
        assert!(!cell.is_compressed());
        assert!(matches!(cell.repr(), SlotRepr::Indexed(_)));
        let index = cell.slot().index().unwrap();
        drop(cell);
        assert_ne!(overflow::global().read().lookup(index), addr);
    }

    #[test]
    fn set_take_swap() {
        let a = Box::new(1u64);
        let b = Box::new(2u64);
        let a_addr = &*a as *const u64 as usize;
        let b_addr = &*b as *const u64 as usize;

        let mut cell = SlotCell::<TableOnly>::empty();
        assert_eq!(cell.swap(a_addr), 0);
        let index = cell.slot().index();
        assert_eq!(cell.swap(b_addr), a_addr);
        assert_eq!(cell.slot().index(), index, "overflow entry updated in place");
        assert_eq!(cell.take(), b_addr);
        assert!(cell.is_empty());
    }

    #[test]
    fn fill_if_empty_first_wins() {
        let a = Box::new(1u64);
        let b = Box::new(2u64);
        let a_addr = &*a as *const u64 as usize;
        let b_addr = &*b as *const u64 as usize;

        let cell = SlotCell::<DefaultCompression>::empty();
        assert_eq!(cell.fill_if_empty(a_addr), Ok(()));
        assert_eq!(cell.fill_if_empty(b_addr), Err(a_addr));
        assert_eq!(cell.addr(), a_addr);
    }

    #[test]
    fn clear_through_shared_ref() {
        let a = Box::new(9u64);
        let a_addr = &*a as *const u64 as usize;
        let cell = SlotCell::<TableOnly>::new(a_addr);
        assert_eq!(cell.clear(), a_addr);
        assert!(cell.is_empty());
        assert_eq!(cell.clear(), 0);
    }

    #[test]
    fn concurrent_fill_has_one_winner() {
        let values: Vec<Box<u64>> = (0..8).map(Box::new).collect();
        let cell = SlotCell::<TableOnly>::empty();
        let wins = std::thread::scope(|s| {
            let handles: Vec<_> = values
                .iter()
                .map(|v| {
                    let addr = &**v as *const u64 as usize;
                    let cell = &cell;
                    s.spawn(move || cell.fill_if_empty(addr).is_ok())
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|won| *won)
                .count()
        });
        assert_eq!(wins, 1);
        let stored = cell.addr();
        assert!(values.iter().any(|v| &**v as *const u64 as usize == stored));
    }
}
