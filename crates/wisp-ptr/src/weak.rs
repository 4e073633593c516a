//! `Weak`: a tracked observer of a [`Shared`] group.
//!
//! A weak handle never changes the strong count. It keeps the cell block
//! alive (through a link) but not the pointee; when the last strong handle
//! drops, the tracker clears this handle's observer and it reads as absent.
//!
//! Reading through a weak handle without pinning is inherently racy, so
//! raw access is `unsafe`. [`Weak::with`], [`Weak::run_if_ref`] and
//! [`Weak::call_if_ref`] pin the pointee with a temporary strong reference.

use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use wisp_core::{violation, Compression, DefaultCompression, SlotCell};

use crate::cell::{Cell, CellRef};
use crate::compressed::UniquePtr;
use crate::shared::Shared;
use crate::tracker::WeakObserver;

/// An 8-byte weak handle: cell slot plus observer slot.
pub struct Weak<T, C: Compression = DefaultCompression> {
    cell: SlotCell<C>,
    observer: UniquePtr<WeakObserver<C>, C>,
    _marker: PhantomData<*const T>,
}

// SAFETY: pinning produces a `Shared<T>`, which needs the same bounds.
unsafe impl<T: Send + Sync, C: Compression> Send for Weak<T, C> {}
// SAFETY: see `Send`.
unsafe impl<T: Send + Sync, C: Compression> Sync for Weak<T, C> {}

impl<T, C: Compression> Weak<T, C> {
    /// A weak handle that observes nothing.
    pub fn new() -> Self {
        Self {
            cell: SlotCell::empty(),
            observer: UniquePtr::empty(),
            _marker: PhantomData,
        }
    }

    /// Observe `cell`, whose payload lives at `target`.
    ///
    /// The caller must keep the cell alive for the duration of the call.
    pub(crate) fn observe(cell: NonNull<Cell<T, C>>, target: usize) -> Self {
        // SAFETY: the caller holds a strong handle or a link on `cell`.
        let block = unsafe { cell.as_ref() };
        block.acquire_link();
        let observer = UniquePtr::new(WeakObserver::new());
        if let Some(o) = observer.as_ref() {
            // SAFETY: the observer is boxed and untracked in `drop` before
            // the box is freed.
            unsafe { block.tracker().track(o, target) };
        }
        Self {
            cell: SlotCell::new(cell.as_ptr() as usize),
            observer,
            _marker: PhantomData,
        }
    }

    fn cell_ptr(&self) -> Option<NonNull<Cell<T, C>>> {
        NonNull::new(self.cell.addr() as *mut Cell<T, C>)
    }

    /// Whether the observed pointee is still alive.
    pub fn is_present(&self) -> bool {
        self.observer.as_ref().is_some_and(WeakObserver::is_present)
    }

    /// Observed address, null once the group has died.
    ///
    /// The address may dangle by the time it is used unless a strong
    /// handle is held.
    pub fn ptr(&self) -> *mut T {
        self.observer
            .as_ref()
            .map_or(std::ptr::null_mut(), |o| o.target() as *mut T)
    }

    /// Strong handles in the observed group, 0 when dead or empty.
    pub fn strong_count(&self) -> usize {
        // SAFETY: our link keeps the block alive.
        self.cell_ptr()
            .map_or(0, |cell| unsafe { cell.as_ref() }.strong() as usize)
    }

    /// A strong handle if the group is still alive.
    pub fn upgrade(&self) -> Option<Shared<T, C>> {
        let cell = self.cell_ptr()?;
        // SAFETY: our link keeps the block alive.
        if !unsafe { cell.as_ref() }.try_acquire_strong() {
            return None;
        }
        // SAFETY: the strong reference acquired above is transferred.
        Some(Shared::from_inner(unsafe { CellRef::adopt(cell) }))
    }

    /// A strong handle to the observed group.
    ///
    /// # Panics
    ///
    /// Panics if the group has died.
    #[track_caller]
    pub fn shared_ref(&self) -> Shared<T, C> {
        match self.upgrade() {
            Some(strong) => strong,
            None => violation("weak handle outlived its target"),
        }
    }

    /// Run `f` on the pointee, pinned for the duration of the call.
    ///
    /// # Panics
    ///
    /// Panics if the group has died.
    #[track_caller]
    pub fn with<R, F: FnOnce(&T) -> R>(&self, f: F) -> R {
        let pinned = self.shared_ref();
        f(&pinned)
    }

    /// Run `f` on the pointee if alive. Returns whether it ran.
    pub fn run_if_ref<F: FnOnce(&T)>(&self, f: F) -> bool {
        match self.upgrade() {
            Some(pinned) => {
                f(&pinned);
                true
            }
            None => false,
        }
    }

    /// `f(pointee)` if alive, otherwise `fallback`.
    pub fn call_if_ref<R, F: FnOnce(&T) -> R>(&self, f: F, fallback: R) -> R {
        match self.upgrade() {
            Some(pinned) => f(&pinned),
            None => fallback,
        }
    }

    /// Borrow the pointee without pinning it.
    ///
    /// # Safety
    ///
    /// The caller must hold a strong handle to the same group for the whole
    /// lifetime of the returned reference.
    pub unsafe fn as_ref(&self) -> Option<&T> {
        // SAFETY: forwarded to the caller.
        unsafe { self.ptr().as_ref() }
    }
}

impl<T, C: Compression> Clone for Weak<T, C> {
    fn clone(&self) -> Self {
        match self.cell_ptr() {
            Some(cell) => Self::observe(cell, self.ptr() as usize),
            None => Self::new(),
        }
    }
}

impl<T, C: Compression> Default for Weak<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: Compression> Drop for Weak<T, C> {
    fn drop(&mut self) {
        let Some(cell) = NonNull::new(self.cell.take() as *mut Cell<T, C>) else {
            return;
        };
        // SAFETY: our link keeps the block alive until released below.
        let block = unsafe { cell.as_ref() };
        if let Some(o) = self.observer.as_ref() {
            block.tracker().untrack(o);
        }
        self.observer.reset();
        // SAFETY: the link taken in `observe` is released exactly once.
        unsafe { Cell::release_link(cell) };
    }
}

impl<T, C: Compression> fmt::Debug for Weak<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Weak")
            .field("ptr", &self.ptr())
            .field("present", &self.is_present())
            .finish()
    }
}
