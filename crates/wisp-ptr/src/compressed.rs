//! `CompressedPtr`: a 4-byte pointer with compile-time ownership.
//!
//! The handle is one [`SlotCell`]. Ownership (`O`) decides whether the
//! pointee is freed on drop; nullability (`N`) decides whether the handle
//! may be empty and what dereferencing an empty one does.
//!
//! | Alias | Ownership | Nullability |
//! |---|---|---|
//! | [`UniquePtr`] | [`Unique`] | [`Nullable`] |
//! | [`UniqueRef`] | [`Unique`] | [`Required`] |
//! | [`LazyPtr`] | [`Unique`] | [`Lazy`] |
//! | [`RelayPtr`] | [`Relay`] | [`Nullable`] |
//! | [`RawPtr`] | [`Borrowed`] | [`Nullable`] |
//! | [`RawRef`] | [`Borrowed`] | [`Required`] |
//!
//! Owning handles hold pointees allocated with [`Box`].

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut};

use wisp_core::{violation, Compression, DefaultCompression, SlotCell, SlotRepr};

use crate::handle::Handle;
use crate::policy::{
    Borrowed, Emptyable, Lazy, Nullability, Nullable, Ownership, Owning, Relay, Required,
    Resolve, Unique,
};

/// Owning, nullable.
pub type UniquePtr<T, C = DefaultCompression> = CompressedPtr<T, Unique, Nullable, C>;
/// Owning, never empty.
pub type UniqueRef<T, C = DefaultCompression> = CompressedPtr<T, Unique, Required, C>;
/// Owning, built on first dereference.
pub type LazyPtr<T, C = DefaultCompression> = CompressedPtr<T, Unique, Lazy, C>;
/// Owning with explicit hand-off.
pub type RelayPtr<T, C = DefaultCompression> = CompressedPtr<T, Relay, Nullable, C>;
/// Non-owning, nullable.
pub type RawPtr<T, C = DefaultCompression> = CompressedPtr<T, Borrowed, Nullable, C>;
/// Non-owning, never empty.
pub type RawRef<T, C = DefaultCompression> = CompressedPtr<T, Borrowed, Required, C>;

/// A pointer stored as a 32-bit slot.
pub struct CompressedPtr<T, O = Unique, N = Nullable, C = DefaultCompression>
where
    O: Ownership,
    N: Nullability,
    C: Compression,
{
    slot: SlotCell<C>,
    _marker: PhantomData<(*const T, O, N)>,
}

// SAFETY: owning handles behave like `Box<T>` and borrowed ones like `&T`;
// requiring both bounds covers either case. Lazy construction through `&self`
// is a single atomic publish.
unsafe impl<T, O, N, C> Send for CompressedPtr<T, O, N, C>
where
    T: Send + Sync,
    O: Ownership,
    N: Nullability,
    C: Compression,
{
}

// SAFETY: see `Send`.
unsafe impl<T, O, N, C> Sync for CompressedPtr<T, O, N, C>
where
    T: Send + Sync,
    O: Ownership,
    N: Nullability,
    C: Compression,
{
}

impl<T, O: Ownership, N: Nullability, C: Compression> CompressedPtr<T, O, N, C> {
    const VALID: () = {
        assert!(O::OWNS || !N::LAZY, "lazy construction requires an owning pointer");
        assert!(
            mem::align_of::<T>() >= C::MIN_ALIGN,
            "pointee alignment is below the compression granularity"
        );
    };

    fn from_slot(slot: SlotCell<C>) -> Self {
        let () = Self::VALID;
        Self {
            slot,
            _marker: PhantomData,
        }
    }

    /// Wrap a raw address.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or valid for as long as the handle can reach it.
    /// For owning handles it must come from [`Box::into_raw`] and ownership
    /// passes to the handle.
    ///
    /// # Panics
    ///
    /// Panics if `ptr` is null and the handle is [`Required`].
    #[track_caller]
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        if ptr.is_null() && !N::ALLOWS_NULL {
            violation("null stored in a required pointer");
        }
        Self::from_slot(SlotCell::new(ptr as usize))
    }

    /// The current address, null when empty. Never builds a lazy pointee.
    pub fn ptr(&self) -> *mut T {
        self.slot.addr() as *mut T
    }

    /// Whether the address is stored inside the slot (true when empty).
    pub fn is_compressed(&self) -> bool {
        self.slot.is_compressed()
    }

    /// Representation of the stored address.
    pub fn repr(&self) -> SlotRepr {
        self.slot.repr()
    }

    /// Borrow the pointee if present. Never builds a lazy pointee.
    pub fn as_ref(&self) -> Option<&T> {
        self.try_ref()
    }

    /// Replace the stored address. Owning handles free the old pointee.
    ///
    /// Storing the address already held is a no-op.
    ///
    /// # Safety
    ///
    /// Same contract as [`from_raw`](Self::from_raw).
    ///
    /// # Panics
    ///
    /// Panics if `ptr` is null and the handle is [`Required`].
    #[track_caller]
    pub unsafe fn set_ptr(&mut self, ptr: *mut T) {
        if ptr.is_null() && !N::ALLOWS_NULL {
            violation("null stored in a required pointer");
        }
        let old = self.ptr();
        if old == ptr {
            return;
        }
        self.slot.set(ptr as usize);
        // SAFETY: `old` was owned by this handle and is no longer reachable.
        unsafe { Self::free(old) };
    }

    /// Builder form of [`set_ptr`](Self::set_ptr).
    ///
    /// # Safety
    ///
    /// Same contract as [`from_raw`](Self::from_raw).
    #[track_caller]
    pub unsafe fn with_ptr(mut self, ptr: *mut T) -> Self {
        // SAFETY: forwarded to the caller.
        unsafe { self.set_ptr(ptr) };
        self
    }

    /// Exchange addresses with `other`. Nothing is freed.
    pub fn swap_ptr(&mut self, other: &mut Self) {
        mem::swap(&mut self.slot, &mut other.slot);
    }

    unsafe fn free(ptr: *mut T) {
        if O::OWNS && !ptr.is_null() {
            // SAFETY: owning handles only ever hold `Box::into_raw` results.
            drop(unsafe { Box::from_raw(ptr) });
        }
    }
}

impl<T, O: Ownership, N: Emptyable, C: Compression> CompressedPtr<T, O, N, C> {
    /// An empty handle.
    pub fn empty() -> Self {
        Self::from_slot(SlotCell::empty())
    }

    /// Empty the handle and return the address. The caller takes over
    /// whatever ownership the handle had.
    pub fn take_ptr(&mut self) -> *mut T {
        self.slot.take() as *mut T
    }

    /// Empty the handle, freeing the pointee if owning.
    pub fn reset(&mut self) {
        let old = self.take_ptr();
        // SAFETY: the handle held `old` and no longer does.
        unsafe { Self::free(old) };
    }
}

impl<T, O: Owning, N: Nullability, C: Compression> CompressedPtr<T, O, N, C> {
    /// Box `value` and own it.
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }

    /// Take ownership of a boxed value.
    pub fn from_box(value: Box<T>) -> Self {
        Self::from_slot(SlotCell::new(Box::into_raw(value) as usize))
    }

    /// Mutably borrow the pointee if present.
    pub fn as_mut(&mut self) -> Option<&mut T> {
        // SAFETY: owning handles are the only path to their pointee.
        unsafe { self.ptr().as_mut() }
    }

    /// Replace the pointee with `value`, returning the old one.
    pub fn replace(&mut self, value: T) -> Option<T> {
        let old = self.ptr();
        self.slot.set(Box::into_raw(Box::new(value)) as usize);
        if old.is_null() {
            return None;
        }
        // SAFETY: owned by this handle until the `set` above.
        Some(*unsafe { Box::from_raw(old) })
    }

    /// The pointee, allocating `f()` first if the handle is empty.
    pub fn ref_or_new<F: FnOnce() -> T>(&mut self, f: F) -> &mut T {
        if self.slot.is_empty() {
            self.slot.set(Box::into_raw(Box::new(f())) as usize);
        }
        match self.as_mut() {
            Some(target) => target,
            None => violation("pointer emptied during construction"),
        }
    }

    /// The pointee, allocating `T::default()` first if the handle is empty.
    pub fn ref_or_def(&mut self) -> &mut T
    where
        T: Default,
    {
        self.ref_or_new(T::default)
    }

    /// The pointee (built on demand for lazy handles).
    pub fn value_mut(&mut self) -> &mut T
    where
        N: Resolve<T>,
    {
        let ptr = N::resolve(&self.slot);
        // SAFETY: resolved pointers are live; `&mut self` is exclusive.
        unsafe { &mut *ptr.as_ptr() }
    }

    /// Give up ownership and return the box, if any.
    pub fn into_box(mut self) -> Option<Box<T>> {
        let ptr = self.slot.take() as *mut T;
        // SAFETY: owning handles only ever hold `Box::into_raw` results.
        (!ptr.is_null()).then(|| unsafe { Box::from_raw(ptr) })
    }
}

impl<T, O: Owning, N: Emptyable, C: Compression> CompressedPtr<T, O, N, C> {
    /// Remove and return the pointee, leaving the handle empty.
    pub fn take(&mut self) -> Option<T> {
        let ptr = self.take_ptr();
        // SAFETY: the handle owned `ptr` until `take_ptr`.
        (!ptr.is_null()).then(|| *unsafe { Box::from_raw(ptr) })
    }
}

impl<T, N: Emptyable, C: Compression> CompressedPtr<T, Relay, N, C> {
    /// Move ownership into a new handle, leaving this one empty.
    pub fn hand_off(&mut self) -> Self {
        Self::from_slot(mem::take(&mut self.slot))
    }
}

impl<T, N: Nullability, C: Compression> CompressedPtr<T, Borrowed, N, C> {
    /// Borrow a reference without tying it to a lifetime.
    ///
    /// # Safety
    ///
    /// `target` must outlive every use of the handle and its clones.
    pub unsafe fn from_ref(target: &T) -> Self {
        Self::from_slot(SlotCell::new(target as *const T as usize))
    }

    /// The pointee, storing `ptr` first if the handle is empty.
    ///
    /// # Safety
    ///
    /// Same contract as [`from_raw`](Self::from_raw).
    #[track_caller]
    pub unsafe fn ref_or_set(&mut self, ptr: *mut T) -> &T {
        if self.slot.is_empty() {
            // SAFETY: forwarded to the caller.
            unsafe { self.set_ptr(ptr) };
        }
        self.ref_or_fail()
    }
}

impl<T, O: Ownership, N: Resolve<T>, C: Compression> CompressedPtr<T, O, N, C> {
    /// The pointee. Lazy handles build it on first call.
    ///
    /// # Panics
    ///
    /// Panics if the handle is empty and not lazy.
    #[track_caller]
    pub fn value(&self) -> &T {
        let ptr = N::resolve(&self.slot);
        // SAFETY: resolved pointers are live for the borrow of `self`.
        unsafe { &*ptr.as_ptr() }
    }
}

// SAFETY: the slot holds null or a pointee kept alive by the handle (owning)
// or by the `from_raw` contract (borrowed).
unsafe impl<T, O: Ownership, N: Nullability, C: Compression> Handle for CompressedPtr<T, O, N, C> {
    type Target = T;

    fn as_ptr(&self) -> *const T {
        self.ptr()
    }
}

impl<T, O: Ownership, N: Resolve<T>, C: Compression> Deref for CompressedPtr<T, O, N, C> {
    type Target = T;

    #[track_caller]
    fn deref(&self) -> &T {
        self.value()
    }
}

impl<T, O: Owning, N: Resolve<T>, C: Compression> DerefMut for CompressedPtr<T, O, N, C> {
    #[track_caller]
    fn deref_mut(&mut self) -> &mut T {
        self.value_mut()
    }
}

impl<T, O: Ownership, N: Nullability, C: Compression> Drop for CompressedPtr<T, O, N, C> {
    fn drop(&mut self) {
        if O::OWNS {
            let ptr = self.slot.take() as *mut T;
            // SAFETY: the handle owned `ptr`.
            unsafe { Self::free(ptr) };
        }
    }
}

impl<T, N: Nullability, C: Compression> Clone for CompressedPtr<T, Borrowed, N, C> {
    fn clone(&self) -> Self {
        Self::from_slot(SlotCell::new(self.slot.addr()))
    }
}

impl<T, O: Ownership, N: Emptyable, C: Compression> Default for CompressedPtr<T, O, N, C> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T, O: Owning, N: Nullability, C: Compression> From<Box<T>> for CompressedPtr<T, O, N, C> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T, O, N, C> PartialEq for CompressedPtr<T, O, N, C>
where
    O: Ownership,
    N: Nullability,
    C: Compression,
{
    fn eq(&self, other: &Self) -> bool {
        self.ptr() == other.ptr()
    }
}

impl<T, O: Ownership, N: Nullability, C: Compression> Eq for CompressedPtr<T, O, N, C> {}

impl<T, O, N, C> PartialEq<*const T> for CompressedPtr<T, O, N, C>
where
    O: Ownership,
    N: Nullability,
    C: Compression,
{
    fn eq(&self, other: &*const T) -> bool {
        self.ptr() as *const T == *other
    }
}

impl<T, O, N, C> PartialEq<*mut T> for CompressedPtr<T, O, N, C>
where
    O: Ownership,
    N: Nullability,
    C: Compression,
{
    fn eq(&self, other: &*mut T) -> bool {
        self.ptr() == *other
    }
}

impl<T, O, N, C> PartialOrd for CompressedPtr<T, O, N, C>
where
    O: Ownership,
    N: Nullability,
    C: Compression,
{
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, O: Ownership, N: Nullability, C: Compression> Ord for CompressedPtr<T, O, N, C> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ptr().cmp(&other.ptr())
    }
}

impl<T, O, N, C> PartialOrd<*const T> for CompressedPtr<T, O, N, C>
where
    O: Ownership,
    N: Nullability,
    C: Compression,
{
    fn partial_cmp(&self, other: &*const T) -> Option<Ordering> {
        (self.ptr() as *const T).partial_cmp(other)
    }
}

impl<T, O: Ownership, N: Nullability, C: Compression> Hash for CompressedPtr<T, O, N, C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ptr().hash(state);
    }
}

impl<T, O: Ownership, N: Nullability, C: Compression> fmt::Debug for CompressedPtr<T, O, N, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressedPtr")
            .field("ptr", &self.ptr())
            .field("repr", &self.repr())
            .finish()
    }
}

impl<T, O: Ownership, N: Nullability, C: Compression> fmt::Pointer for CompressedPtr<T, O, N, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.ptr(), f)
    }
}
