//! `CompactArray`: an 8-byte dynamic array over a compressed buffer.
//!
//! The header is a backing slot plus one `u32` that packs the ownership
//! flag (bit 31) with the length (low 31 bits). Empty arrays allocate
//! nothing. Owned buffers are `Box<[T]>` of exactly `len` elements.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::ptr;
use std::slice;

use wisp_core::config::MAX_ARRAY_LEN;
use wisp_core::{violation, Compression, CoreError, DefaultCompression};

use crate::compressed::RawPtr;
use crate::fixed::FixedArray;
use crate::policy::{Borrowed, Unique};

const OWNS_BIT: u32 = 1 << 31;
const LEN_MASK: u32 = !OWNS_BIT;

/// A dynamic array whose header fits in 8 bytes.
pub struct CompactArray<T, C: Compression = DefaultCompression> {
    data: RawPtr<T, C>,
    meta: u32,
}

impl<T, C: Compression> CompactArray<T, C> {
    /// An empty array. Allocates nothing.
    pub fn new() -> Self {
        Self {
            data: RawPtr::empty(),
            meta: 0,
        }
    }

    /// Build an owning array from `items`.
    ///
    /// Degrades to an empty (owning) array if the buffer cannot be
    /// allocated or the length does not fit.
    pub fn from_list<I: IntoIterator<Item = T>>(items: I) -> Self {
        let items = items.into_iter();
        let mut buf = Vec::new();
        if let Err(err) = buf.try_reserve_exact(items.size_hint().0) {
            tracing::warn!(%err, "compact array allocation failed");
            return Self::owning_empty();
        }
        buf.extend(items);
        match Self::try_from_vec(buf) {
            Ok(array) => array,
            Err(err) => {
                tracing::warn!(%err, "compact array allocation failed");
                Self::owning_empty()
            }
        }
    }

    fn owning_empty() -> Self {
        Self {
            data: RawPtr::empty(),
            meta: OWNS_BIT,
        }
    }

    /// Take over a vector's elements.
    pub fn try_from_vec(items: Vec<T>) -> Result<Self, CoreError> {
        let len = items.len();
        if len > MAX_ARRAY_LEN {
            return Err(CoreError::LengthOverflow {
                requested: len,
                max: MAX_ARRAY_LEN,
            });
        }
        if len == 0 {
            return Ok(Self::owning_empty());
        }
        let buf = Box::into_raw(items.into_boxed_slice()) as *mut T;
        // SAFETY: `buf` holds `len` elements allocated as a boxed slice.
        Ok(unsafe { Self::from_raw_parts(buf, len, true) })
    }

    /// Wrap an existing buffer.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for `len` elements for the array's whole life.
    /// If `owns` is set it must come from a `Box<[T]>` of exactly `len`
    /// elements, whose ownership passes to the array.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds 31 bits, or `len > 0` with a null `ptr`.
    #[track_caller]
    pub unsafe fn from_raw_parts(ptr: *mut T, len: usize, owns: bool) -> Self {
        if len > MAX_ARRAY_LEN {
            violation("array length exceeds 31 bits");
        }
        if len > 0 && ptr.is_null() {
            violation("non-empty array with a null buffer");
        }
        Self {
            // SAFETY: forwarded to the caller.
            data: unsafe { RawPtr::from_raw(ptr) },
            meta: (len as u32) | if owns { OWNS_BIT } else { 0 },
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        (self.meta & LEN_MASK) as usize
    }

    /// Whether the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether dropping the array frees its buffer.
    pub fn owns_buffer(&self) -> bool {
        self.meta & OWNS_BIT != 0
    }

    /// Buffer address, null for an empty array.
    pub fn as_ptr(&self) -> *mut T {
        self.data.ptr()
    }

    /// The elements as a slice.
    pub fn as_slice(&self) -> &[T] {
        let ptr = self.as_ptr();
        if ptr.is_null() {
            return &[];
        }
        // SAFETY: non-null buffers hold `len` live elements.
        unsafe { slice::from_raw_parts(ptr, self.len()) }
    }

    /// The elements as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let ptr = self.as_ptr();
        if ptr.is_null() {
            return &mut [];
        }
        // SAFETY: non-null buffers hold `len` live elements; `&mut self`
        // is exclusive.
        unsafe { slice::from_raw_parts_mut(ptr, self.len()) }
    }

    /// Element `i`, or `None` past the end.
    pub fn at(&self, i: usize) -> Option<&T> {
        self.as_slice().get(i)
    }

    /// Element `i` without a bounds check.
    ///
    /// # Safety
    ///
    /// `i` must be less than [`len`](Self::len).
    pub unsafe fn at_unchecked(&self, i: usize) -> &T {
        // SAFETY: forwarded to the caller.
        unsafe { &*self.as_ptr().add(i) }
    }

    /// Iterate over the elements.
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Position of the first element equal to `value`.
    pub fn index_of(&self, value: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.iter().position(|item| item == value)
    }

    /// Whether some element equals `value`.
    pub fn contains(&self, value: &T) -> bool
    where
        T: PartialEq,
    {
        self.as_slice().contains(value)
    }

    /// Resize to `len` elements. Returns `false` on failure, leaving the
    /// array unchanged.
    pub fn resize(&mut self, len: usize) -> bool
    where
        T: Clone + Default,
    {
        match self.try_resize(len) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%err, requested = len, "compact array resize failed");
                false
            }
        }
    }

    /// Resize to `len` elements into a fresh owned buffer.
    ///
    /// The first `min(old, new)` elements are cloned over and the rest are
    /// `T::default()`. The old buffer is freed if owned.
    pub fn try_resize(&mut self, len: usize) -> Result<(), CoreError>
    where
        T: Clone + Default,
    {
        if len > MAX_ARRAY_LEN {
            return Err(CoreError::LengthOverflow {
                requested: len,
                max: MAX_ARRAY_LEN,
            });
        }
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|_| CoreError::AllocationFailed {
                bytes: len.saturating_mul(std::mem::size_of::<T>()),
            })?;
        let keep = len.min(self.len());
        buf.extend_from_slice(&self.as_slice()[..keep]);
        buf.resize_with(len, T::default);
        *self = Self::try_from_vec(buf)?;
        Ok(())
    }

    /// Move an owned buffer of exactly `N` elements into a fixed array.
    ///
    /// Returns the array unchanged if it does not own its buffer or its
    /// length differs from `N`.
    pub fn into_fixed<const N: usize>(mut self) -> Result<FixedArray<T, N, Unique, C>, Self> {
        if !self.owns_buffer() || self.len() != N {
            return Err(self);
        }
        let ptr = self.data.take_ptr();
        self.meta = 0;
        // SAFETY: the buffer is a `Box<[T]>` of `N` elements, now unowned here.
        Ok(unsafe { FixedArray::from_raw(ptr) })
    }

    /// A non-owning fixed-length view of the buffer.
    ///
    /// # Safety
    ///
    /// The view must not outlive this array's buffer.
    pub unsafe fn fixed_view<const N: usize>(&self) -> Option<FixedArray<T, N, Borrowed, C>> {
        if self.len() != N {
            return None;
        }
        // SAFETY: the buffer holds `N` elements; lifetime per the caller.
        Some(unsafe { FixedArray::from_raw(self.as_ptr()) })
    }
}

impl<T, C: Compression> Drop for CompactArray<T, C> {
    fn drop(&mut self) {
        let len = self.len();
        let ptr = self.data.take_ptr();
        if self.owns_buffer() && !ptr.is_null() {
            // SAFETY: owned buffers are `Box<[T]>` of exactly `len` elements.
            drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(ptr, len)) });
        }
    }
}

impl<T, C: Compression> Default for CompactArray<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: Compression> From<Vec<T>> for CompactArray<T, C> {
    /// # Panics
    ///
    /// Panics if the vector is longer than 31 bits can count.
    #[track_caller]
    fn from(items: Vec<T>) -> Self {
        match Self::try_from_vec(items) {
            Ok(array) => array,
            Err(err) => violation(&err.to_string()),
        }
    }
}

impl<T, C: Compression, const N: usize> From<[T; N]> for CompactArray<T, C> {
    fn from(items: [T; N]) -> Self {
        Self::from(Vec::from(items))
    }
}

impl<T, C: Compression> FromIterator<T> for CompactArray<T, C> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_list(iter)
    }
}

impl<T, C: Compression> Index<usize> for CompactArray<T, C> {
    type Output = T;

    #[track_caller]
    fn index(&self, i: usize) -> &T {
        &self.as_slice()[i]
    }
}

impl<T, C: Compression> IndexMut<usize> for CompactArray<T, C> {
    #[track_caller]
    fn index_mut(&mut self, i: usize) -> &mut T {
        &mut self.as_mut_slice()[i]
    }
}

impl<'a, T, C: Compression> IntoIterator for &'a CompactArray<T, C> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T, C: Compression> PartialEq for CompactArray<T, C> {
    fn eq(&self, other: &Self) -> bool {
        self.as_ptr() == other.as_ptr() && self.len() == other.len()
    }
}

impl<T, C: Compression> Eq for CompactArray<T, C> {}

impl<T, C: Compression> PartialOrd for CompactArray<T, C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, C: Compression> Ord for CompactArray<T, C> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.as_ptr(), self.len()).cmp(&(other.as_ptr(), other.len()))
    }
}

// Raw comparisons look at the buffer address only.
impl<T, C: Compression> PartialEq<*const T> for CompactArray<T, C> {
    fn eq(&self, other: &*const T) -> bool {
        self.as_ptr() as *const T == *other
    }
}

impl<T, C: Compression> PartialOrd<*const T> for CompactArray<T, C> {
    fn partial_cmp(&self, other: &*const T) -> Option<Ordering> {
        (self.as_ptr() as *const T).partial_cmp(other)
    }
}

impl<T: fmt::Debug, C: Compression> fmt::Debug for CompactArray<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wisp_core::TableOnly;
    use wisp_test_utils::{Counted, DropCounter};

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn header_is_eight_bytes() {
        assert_eq!(std::mem::size_of::<CompactArray<u64>>(), 8);
        assert_eq!(std::mem::size_of::<CompactArray<String, TableOnly>>(), 8);
    }

    #[test]
    fn empty_array_allocates_nothing() {
        let a = CompactArray::<u32>::new();
        assert!(a.is_empty());
        assert!(a.as_ptr().is_null());
        assert!(!a.owns_buffer());
        assert_eq!(a.as_slice(), &[] as &[u32]);
        assert_eq!(a.at(0), None);
    }

    #[test]
    fn from_list_owns_buffer() {
        let a = CompactArray::<u32>::from_list([4, 5, 6]);
        assert_eq!(a.len(), 3);
        assert!(a.owns_buffer());
        assert_eq!(a[1], 5);
        assert_eq!(a.at(2), Some(&6));
        assert_eq!(a.at(3), None);
        assert_eq!(a.index_of(&6), Some(2));
        assert!(a.contains(&4));
        assert!(!a.contains(&7));
        assert_eq!(a.iter().sum::<u32>(), 15);

        let empty = CompactArray::<u32>::from_list(std::iter::empty());
        assert!(empty.owns_buffer());
        assert!(empty.as_ptr().is_null());
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn index_past_end_panics() {
        let a = CompactArray::<u8>::from(vec![1, 2]);
        let _value: u8 = a[2];
    }

    #[test]
    fn owned_elements_dropped_once() {
        let drops = DropCounter::new();
        let a: CompactArray<Counted> = (0..4).map(|i| drops.track(i)).collect();
        assert_eq!(a.len(), 4);
        drop(a);
        assert_eq!(drops.dropped(), 4);
    }

    #[test]
    fn borrowed_buffer_not_freed() {
        let drops = DropCounter::new();
        let mut backing: Vec<Counted> = (0..3).map(|i| drops.track(i)).collect();
        {
            // SAFETY: `backing` outlives the array.
            let view = unsafe {
                CompactArray::<Counted>::from_raw_parts(backing.as_mut_ptr(), backing.len(), false)
            };
            assert!(!view.owns_buffer());
            assert_eq!(view[2].id, 2);
        }
        assert_eq!(drops.dropped(), 0);
    }

    #[test]
    fn resize_preserves_prefix_and_fills_default() {
        let mut a = CompactArray::<u32>::from(vec![1, 2, 3]);
        assert!(a.resize(5));
        assert_eq!(a.as_slice(), &[1, 2, 3, 0, 0]);
        assert!(a.resize(2));
        assert_eq!(a.as_slice(), &[1, 2]);
        assert!(a.resize(0));
        assert!(a.is_empty());
        assert!(a.owns_buffer());
    }

    #[test]
    fn resize_of_borrowed_takes_ownership() {
        let mut backing = [7u16, 8, 9];
        // SAFETY: `backing` outlives the array.
        let mut a = unsafe { CompactArray::<u16>::from_raw_parts(backing.as_mut_ptr(), 3, false) };
        assert!(a.resize(4));
        assert!(a.owns_buffer());
        assert_eq!(a.as_slice(), &[7, 8, 9, 0]);
        a[0] = 1;
        assert_eq!(backing[0], 7);
    }

    #[test]
    fn resize_overflow_leaves_array_unchanged() {
        let mut a = CompactArray::<u8>::from(vec![1]);
        let err = a.try_resize(MAX_ARRAY_LEN + 1).unwrap_err();
        assert!(matches!(err, CoreError::LengthOverflow { .. }));
        assert!(!a.resize(MAX_ARRAY_LEN + 1));
        assert_eq!(a.as_slice(), &[1]);
    }

    #[test]
    fn identity_comparisons() {
        let a = CompactArray::<u8>::from(vec![1, 2]);
        let b = CompactArray::<u8>::from(vec![1, 2]);
        assert_ne!(a, b, "equal contents in different buffers differ");
        assert_eq!(a, a);
        assert_eq!(CompactArray::<u8>::new(), CompactArray::<u8>::new());
        assert_eq!(a.cmp(&b), a.as_ptr().cmp(&b.as_ptr()));
    }

    #[test]
    fn index_mut_writes_through() {
        let mut a = CompactArray::<u32>::from([0; 3]);
        a[1] = 9;
        a.as_mut_slice()[2] = 8;
        assert_eq!(a.as_slice(), &[0, 9, 8]);
        // SAFETY: index 1 is in bounds.
        assert_eq!(unsafe { *a.at_unchecked(1) }, 9);
    }

    #[test]
    fn into_fixed_requires_owned_exact_length() {
        let a = CompactArray::<u32>::from(vec![1, 2, 3]);
        let a = a.into_fixed::<4>().unwrap_err();
        let fixed = a.into_fixed::<3>().unwrap();
        assert_eq!(fixed.as_slice(), &[1, 2, 3]);

        let mut backing = [1u32, 2];
        // SAFETY: `backing` outlives the array.
        let borrowed = unsafe { CompactArray::<u32>::from_raw_parts(backing.as_mut_ptr(), 2, false) };
        assert!(borrowed.into_fixed::<2>().is_err());
    }

    #[test]
    fn fixed_view_borrows() {
        let a = CompactArray::<u8>::from(vec![5, 6]);
        // SAFETY: `a` outlives the view.
        let view = unsafe { a.fixed_view::<2>() }.unwrap();
        assert_eq!(view[1], 6);
        drop(view);
        assert_eq!(a[0], 5);
        // SAFETY: as above.
        assert!(unsafe { a.fixed_view::<3>() }.is_none());
    }

    #[test]
    fn debug_lists_elements() {
        let a = CompactArray::<u8>::from(vec![1, 2]);
        assert_eq!(format!("{a:?}"), "[1, 2]");
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn resize_keeps_prefix(items in prop::collection::vec(any::<u32>(), 0..64), len in 0usize..96) {
                let mut a = CompactArray::<u32>::from(items.clone());
                prop_assert!(a.resize(len));
                prop_assert_eq!(a.len(), len);
                let keep = len.min(items.len());
                prop_assert_eq!(&a.as_slice()[..keep], &items[..keep]);
                prop_assert!(a.as_slice()[keep..].iter().all(|&x| x == 0));
            }
        }
    }

    #[test]
    fn compares_against_raw_buffer() {
        let a = CompactArray::<u16>::from_list([1, 2, 3]);
        let raw = a.as_ptr() as *const u16;
        assert!(a == raw);
        assert!(a >= raw);
        assert!(a < raw.wrapping_add(1));
        assert!(a != raw.wrapping_add(1));
    }
}
