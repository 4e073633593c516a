//! `Shared`: a tracked, reference-counted strong handle.

use std::fmt;
use std::ops::Deref;
use std::ptr::NonNull;

use wisp_core::{violation, Compression, DefaultCompression};

use crate::cell::CellRef;
use crate::handle::Handle;
use crate::weak::Weak;

/// A 4-byte shared handle.
///
/// Cloning adds a strong reference. When the last strong handle drops, the
/// pointee is freed and every [`Weak`] made from the group is cleared.
///
/// The pointee's alignment must cover the strategy's dropped low bits.
/// Under-aligned pointees are rejected when the handle is built:
///
#[cfg_attr(feature = "unchecked", doc = "```compile_fail")]
#[cfg_attr(not(feature = "unchecked"), doc = "```ignore")]
/// use wisp_core::Unchecked;
/// use wisp_ptr::Shared;
///
/// let _s = Shared::<(), Unchecked<4>>::new(());
/// ```
pub struct Shared<T, C: Compression = DefaultCompression> {
    inner: CellRef<T, C>,
}

// SAFETY: like `Arc<T>`: the pointee is shared across threads and dropped on
// whichever thread releases it last.
unsafe impl<T: Send + Sync, C: Compression> Send for Shared<T, C> {}
// SAFETY: see `Send`.
unsafe impl<T: Send + Sync, C: Compression> Sync for Shared<T, C> {}

impl<T, C: Compression> Shared<T, C> {
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

    pub(crate) fn from_inner(inner: CellRef<T, C>) -> Self {
        Self { inner }
    }

    /// Pointee address, null when empty.
    pub fn ptr(&self) -> *mut T {
        self.inner.payload()
    }

    /// Whether the cell address is stored inside the slot.
    pub fn is_compressed(&self) -> bool {
        self.inner.is_compressed()
    }

    /// Number of strong handles in the group, 0 when empty.
    pub fn strong_count(&self) -> usize {
        self.inner.strong_count()
    }

    /// Number of live weak handles tracking the group.
    pub fn weak_count(&self) -> usize {
        self.inner.cell().map_or(0, |cell| cell.tracker().len())
    }

    /// Mutable access when this is the only handle of any kind.
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

    /// A tracked weak handle. Absent if this handle is empty.
    pub fn weak_ref(&self) -> Weak<T, C> {
        match self.inner.cell_ptr() {
            Some(cell) => Weak::observe(cell, self.ptr() as usize),
            None => Weak::new(),
        }
    }
}

// SAFETY: our strong reference keeps the payload alive.
unsafe impl<T, C: Compression> Handle for Shared<T, C> {
    type Target = T;

    fn as_ptr(&self) -> *const T {
        self.ptr()
    }
}

impl<T, C: Compression> Deref for Shared<T, C> {
    type Target = T;

    #[track_caller]
    fn deref(&self) -> &T {
        match self.try_ref() {
            Some(target) => target,
            None => violation("dereferenced an empty shared handle"),
        }
    }
}

impl<T, C: Compression> Clone for Shared<T, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, C: Compression> Default for Shared<T, C> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T, C: Compression> From<Box<T>> for Shared<T, C> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T, C: Compression> PartialEq for Shared<T, C> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr() == other.ptr()
    }
}

impl<T, C: Compression> Eq for Shared<T, C> {}

impl<T, C: Compression> PartialEq<*const T> for Shared<T, C> {
    fn eq(&self, other: &*const T) -> bool {
        self.ptr() as *const T == *other
    }
}

impl<T, C: Compression> PartialOrd for Shared<T, C> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, C: Compression> Ord for Shared<T, C> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ptr().cmp(&other.ptr())
    }
}

impl<T, C: Compression> PartialOrd<*const T> for Shared<T, C> {
    fn partial_cmp(&self, other: &*const T) -> Option<std::cmp::Ordering> {
        (self.ptr() as *const T).partial_cmp(other)
    }
}

impl<T: fmt::Debug, C: Compression> fmt::Debug for Shared<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("value", &self.try_ref())
            .field("strong", &self.strong_count())
            .finish()
    }
}
