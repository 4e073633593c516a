//! `FixedArray`: a 4-byte handle to a buffer of compile-time length.

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};
use std::slice;

use wisp_core::{violation, Compression, DefaultCompression};

use crate::array::CompactArray;
use crate::compressed::RawPtr;
use crate::policy::{Ownership, Owning, Unique};

/// A buffer of exactly `N` elements behind one slot.
///
/// `O` decides whether dropping the handle frees the buffer.
pub struct FixedArray<T, const N: usize, O: Ownership = Unique, C: Compression = DefaultCompression>
{
    data: RawPtr<T, C>,
    _ownership: PhantomData<O>,
}

impl<T, const N: usize, O: Ownership, C: Compression> FixedArray<T, N, O, C> {
    /// Wrap an existing buffer.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for `N` elements for the handle's whole life.
    /// For owning handles it must come from a `Box<[T; N]>` (or a
    /// `Box<[T]>` of length `N`) whose ownership passes to the handle.
    ///
    /// # Panics
    ///
    /// Panics if `ptr` is null and `N > 0`.
    #[track_caller]
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        if N > 0 && ptr.is_null() {
            violation("non-empty fixed array with a null buffer");
        }
        Self {
            // SAFETY: forwarded to the caller.
            data: unsafe { RawPtr::from_raw(ptr) },
            _ownership: PhantomData,
        }
    }

    /// Number of elements.
    pub const fn len(&self) -> usize {
        N
    }

    /// Whether `N` is zero.
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Buffer address.
    pub fn as_ptr(&self) -> *mut T {
        self.data.ptr()
    }

    /// The elements as a slice.
    pub fn as_slice(&self) -> &[T] {
        let ptr = self.as_ptr();
        if ptr.is_null() {
            return &[];
        }
        // SAFETY: the buffer holds `N` live elements.
        unsafe { slice::from_raw_parts(ptr, N) }
    }

    /// Element `i`, or `None` past the end.
    pub fn at(&self, i: usize) -> Option<&T> {
        self.as_slice().get(i)
    }

    /// Iterate over the elements.
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Convert into a dynamic array with the same buffer and ownership.
    pub fn into_compact(mut self) -> CompactArray<T, C> {
        let ptr = self.data.take_ptr();
        // SAFETY: `ptr` holds `N` elements; ownership moves with `O::OWNS`.
        unsafe { CompactArray::from_raw_parts(ptr, if ptr.is_null() { 0 } else { N }, O::OWNS) }
    }
}

impl<T, const N: usize, O: Owning, C: Compression> FixedArray<T, N, O, C> {
    /// Move `items` onto the heap and own them.
    pub fn new(items: [T; N]) -> Self {
        let ptr = Box::into_raw(Box::new(items)) as *mut T;
        // SAFETY: `ptr` comes from a `Box<[T; N]>`.
        unsafe { Self::from_raw(ptr) }
    }

    /// The elements as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let ptr = self.as_ptr();
        if ptr.is_null() {
            return &mut [];
        }
        // SAFETY: the buffer holds `N` elements owned by this handle.
        unsafe { slice::from_raw_parts_mut(ptr, N) }
    }
}

impl<T, const N: usize, O: Ownership, C: Compression> Drop for FixedArray<T, N, O, C> {
    fn drop(&mut self) {
        let ptr = self.data.take_ptr();
        if O::OWNS && !ptr.is_null() {
            // SAFETY: owned buffers hold exactly `N` elements from a box.
            drop(unsafe { Box::from_raw(ptr as *mut [T; N]) });
        }
    }
}

impl<T, const N: usize, O: Ownership, C: Compression> Index<usize> for FixedArray<T, N, O, C> {
    type Output = T;

    #[track_caller]
    fn index(&self, i: usize) -> &T {
        &self.as_slice()[i]
    }
}

impl<T, const N: usize, O: Owning, C: Compression> IndexMut<usize> for FixedArray<T, N, O, C> {
    #[track_caller]
    fn index_mut(&mut self, i: usize) -> &mut T {
        &mut self.as_mut_slice()[i]
    }
}

impl<T, const N: usize, O: Ownership, C: Compression> PartialEq for FixedArray<T, N, O, C> {
    fn eq(&self, other: &Self) -> bool {
        self.as_ptr() == other.as_ptr()
    }
}

impl<T, const N: usize, O: Ownership, C: Compression> Eq for FixedArray<T, N, O, C> {}

impl<T, const N: usize, O: Ownership, C: Compression> PartialOrd for FixedArray<T, N, O, C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, const N: usize, O: Ownership, C: Compression> Ord for FixedArray<T, N, O, C> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_ptr().cmp(&other.as_ptr())
    }
}

impl<T, const N: usize, O: Ownership, C: Compression> PartialEq<*const T>
    for FixedArray<T, N, O, C>
{
    fn eq(&self, other: &*const T) -> bool {
        self.as_ptr() as *const T == *other
    }
}

impl<T, const N: usize, O: Ownership, C: Compression> PartialOrd<*const T>
    for FixedArray<T, N, O, C>
{
    fn partial_cmp(&self, other: &*const T) -> Option<Ordering> {
        (self.as_ptr() as *const T).partial_cmp(other)
    }
}

impl<T: fmt::Debug, const N: usize, O: Ownership, C: Compression> fmt::Debug
    for FixedArray<T, N, O, C>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
