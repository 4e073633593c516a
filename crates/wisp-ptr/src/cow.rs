//! `CowShared`: a shared handle that copies its pointee before mutation.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Deref;
use std::ptr::NonNull;

use wisp_core::{violation, Compression, DefaultCompression};

use crate::cell::CellRef;
use crate::handle::Handle;

/// A 4-byte copy-on-write shared handle.
///
/// Behaves like [`Shared`](crate::Shared) for reading. Before mutating,
/// [`make_mut`](Self::make_mut) or [`detach`](Self::detach) give this handle
/// its own copy if others share the pointee. Weak handles are not offered.
pub struct CowShared<T, C: Compression = DefaultCompression> {
    inner: CellRef<T, C>,
}

// SAFETY: like `Arc<T>`.
unsafe impl<T: Send + Sync, C: Compression> Send for CowShared<T, C> {}
// SAFETY: see `Send`.
unsafe impl<T: Send + Sync, C: Compression> Sync for CowShared<T, C> {}

impl<T, C: Compression> CowShared<T, C> {
    /// Share `value`.
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }

    /// Share a boxed value.
    pub fn from_box(value: Box<T>) -> Self {
        Self {
            inner: CellRef::new(value),
        }
    }

    /// Share a raw pointee. Null gives an empty handle.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or come from [`Box::into_raw`]; ownership passes
    /// to the handle group.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        match NonNull::new(ptr) {
            // SAFETY: forwarded to the caller.
            Some(ptr) => Self::from_box(unsafe { Box::from_raw(ptr.as_ptr()) }),
            None => Self::empty(),
        }
    }

    /// A handle that refers to nothing.
    pub fn empty() -> Self {
        Self {
            inner: CellRef::empty(),
        }
    }

    /// Pointee address, null when empty.
    pub fn ptr(&self) -> *mut T {
        self.inner.payload()
    }

    /// Whether the cell address is stored inside the slot.
    pub fn is_compressed(&self) -> bool {
        self.inner.is_compressed()
    }

    /// Number of handles sharing the pointee, 0 when empty.
    pub fn strong_count(&self) -> usize {
        self.inner.strong_count()
    }

    /// Whether another handle shares the pointee.
    pub fn is_shared(&self) -> bool {
        self.strong_count() > 1
    }

    /// Mutable access when no other handle shares the pointee.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.inner.get_mut()
    }

    /// Leave the current group and start a new one holding `value`.
    pub fn replace(&mut self, value: T) {
        self.inner = CellRef::new(Box::new(value));
    }

    /// Leave the current group, becoming empty.
    pub fn reset(&mut self) {
        self.inner.reset();
    }

    /// The pointee, starting a new group with `f()` if empty.
    pub fn ref_or_new<F: FnOnce() -> T>(&mut self, f: F) -> &T {
        if self.inner.cell().is_none() {
            self.inner = CellRef::new(Box::new(f()));
        }
        self.ref_or_fail()
    }

    /// The pointee, starting a new group with `T::default()` if empty.
    pub fn ref_or_def(&mut self) -> &T
    where
        T: Default,
    {
        self.ref_or_new(T::default)
    }
}

impl<T: Clone, C: Compression> CowShared<T, C> {
    /// Give this handle its own copy of the pointee.
    ///
    /// Copies when the pointee is shared, or always when `force` is set.
    /// Other handles keep the original. Returns whether a copy was made;
    /// an empty handle never copies.
    pub fn detach(&mut self, force: bool) -> bool {
        let Some(current) = self.try_ref() else {
            return false;
        };
        if !force && !self.is_shared() {
            return false;
        }
        let copy = current.clone();
        self.inner = CellRef::new(Box::new(copy));
        true
    }

    /// Mutable access, copying first if the pointee is shared.
    ///
    /// # Panics
    ///
    /// Panics if the handle is empty.
    #[track_caller]
    pub fn make_mut(&mut self) -> &mut T {
        self.detach(false);
        match self.inner.get_mut() {
            Some(target) => target,
            None => violation("make_mut on an empty copy-on-write handle"),
        }
    }
}

// SAFETY: our strong reference keeps the payload alive.
unsafe impl<T, C: Compression> Handle for CowShared<T, C> {
    type Target = T;

    fn as_ptr(&self) -> *const T {
        self.ptr()
    }
}

impl<T, C: Compression> Deref for CowShared<T, C> {
    type Target = T;

    #[track_caller]
    fn deref(&self) -> &T {
        match self.try_ref() {
            Some(target) => target,
            None => violation("dereferenced an empty copy-on-write handle"),
        }
    }
}

impl<T, C: Compression> Clone for CowShared<T, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, C: Compression> Default for CowShared<T, C> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T, C: Compression> From<Box<T>> for CowShared<T, C> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T, C: Compression> PartialEq for CowShared<T, C> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr() == other.ptr()
    }
}

impl<T, C: Compression> Eq for CowShared<T, C> {}

impl<T, C: Compression> PartialEq<*const T> for CowShared<T, C> {
    fn eq(&self, other: &*const T) -> bool {
        self.ptr() as *const T == *other
    }
}

impl<T, C: Compression> PartialOrd for CowShared<T, C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, C: Compression> Ord for CowShared<T, C> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ptr().cmp(&other.ptr())
    }
}

impl<T, C: Compression> PartialOrd<*const T> for CowShared<T, C> {
    fn partial_cmp(&self, other: &*const T) -> Option<Ordering> {
        (self.ptr() as *const T).partial_cmp(other)
    }
}

impl<T: fmt::Debug, C: Compression> fmt::Debug for CowShared<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CowShared")
            .field("value", &self.try_ref())
            .field("strong", &self.strong_count())
            .finish()
    }
}
