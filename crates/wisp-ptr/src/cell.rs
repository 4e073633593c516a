//! The reference-counted heap block behind shared handles.
//!
//! ```text
//! Shared ──┐                      ┌── Weak ── WeakObserver.target ─┐
//! Shared ──┼─► Cell { payload, strong, links, tracker } ◄─┘         │
//! CowShared┘        │                                              │
//!                   └──────────────────► T ◄───────────────────────┘
//! ```
//!
//! `strong` counts strong handles. `links` counts one reference for the
//! whole strong group plus one per weak handle; the block itself is freed
//! when it reaches zero. The payload is freed by whichever thread moves
//! `strong` from 1 to 0, before the weak observers are cleared.

use std::marker::PhantomData;
use std::mem;
use std::process;
use std::ptr::{self, NonNull};
use std::sync::atomic::{fence, AtomicU32, Ordering};

use wisp_core::{Compression, SlotCell};

use crate::tracker::WeakTracker;

/// Counts above this abort instead of risking wrap-around.
const MAX_COUNT: u32 = u32::MAX >> 1;

// Aligned so its address compresses directly under every strategy.
#[repr(align(16))]
pub(crate) struct Cell<T, C: Compression> {
    payload: SlotCell<C>,
    strong: AtomicU32,
    links: AtomicU32,
    tracker: WeakTracker<C>,
    _marker: PhantomData<T>,
}

impl<T, C: Compression> Cell<T, C> {
    const VALID: () = assert!(
        mem::align_of::<T>() >= C::MIN_ALIGN,
        "pointee alignment is below the compression granularity"
    );

    /// Allocate a cell with one strong reference owning `payload`.
    fn allocate(payload: Box<T>) -> NonNull<Self> {
        let () = Self::VALID;
        let cell = Box::new(Self {
            payload: SlotCell::new(Box::into_raw(payload) as usize),
            strong: AtomicU32::new(1),
            links: AtomicU32::new(1),
            tracker: WeakTracker::new(),
            _marker: PhantomData,
        });
        NonNull::from(Box::leak(cell))
    }

    pub(crate) fn payload(&self) -> *mut T {
        self.payload.addr() as *mut T
    }

    pub(crate) fn strong(&self) -> u32 {
        self.strong.load(Ordering::Acquire)
    }

    pub(crate) fn links(&self) -> u32 {
        self.links.load(Ordering::Acquire)
    }

    pub(crate) fn tracker(&self) -> &WeakTracker<C> {
        &self.tracker
    }

    /// Add a strong reference. The caller must already hold one.
    pub(crate) fn acquire_strong(&self) {
        if self.strong.fetch_add(1, Ordering::Relaxed) > MAX_COUNT {
            process::abort();
        }
    }

    /// Add a strong reference unless the count has already reached zero.
    pub(crate) fn try_acquire_strong(&self) -> bool {
        let mut current = self.strong.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return false;
            }
            if current > MAX_COUNT {
                process::abort();
            }
            match self.strong.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Add a link for a new weak handle.
    pub(crate) fn acquire_link(&self) {
        if self.links.fetch_add(1, Ordering::Relaxed) > MAX_COUNT {
            process::abort();
        }
    }

    /// Drop one strong reference.
    ///
    /// # Safety
    ///
    /// `this` must be live and the caller must own the strong reference
    /// being released.
    pub(crate) unsafe fn release_strong(this: NonNull<Self>) {
        // SAFETY: live per the caller contract.
        let cell = unsafe { this.as_ref() };
        if cell.strong.fetch_sub(1, Ordering::Release) != 1 {
            return;
        }
        fence(Ordering::Acquire);

        let payload = cell.payload.clear() as *mut T;
        if !payload.is_null() {
            // SAFETY: the payload came from `Box::into_raw` and this thread
            // observed the only 1 -> 0 transition.
            drop(unsafe { Box::from_raw(payload) });
        }
        cell.tracker.invalidate_all();

        // SAFETY: the strong group's link is released exactly once, here.
        unsafe { Self::release_link(this) };
    }

    /// Drop one link, freeing the block on the last one.
    ///
    /// # Safety
    ///
    /// `this` must be live and the caller must own the link being released.
    pub(crate) unsafe fn release_link(this: NonNull<Self>) {
        // SAFETY: live per the caller contract.
        if unsafe { this.as_ref() }.links.fetch_sub(1, Ordering::Release) != 1 {
            return;
        }
        fence(Ordering::Acquire);
        tracing::trace!(cell = ?this, "shared cell freed");
        // SAFETY: no handle of any kind refers to the block any more.
        drop(unsafe { Box::from_raw(this.as_ptr()) });
    }
}

/// One strong reference to a [`Cell`], stored as a slot.
pub(crate) struct CellRef<T, C: Compression> {
    slot: SlotCell<C>,
    _marker: PhantomData<*const Cell<T, C>>,
}

impl<T, C: Compression> CellRef<T, C> {
    pub(crate) fn empty() -> Self {
        Self {
            slot: SlotCell::empty(),
            _marker: PhantomData,
        }
    }

    pub(crate) fn new(value: Box<T>) -> Self {
        // SAFETY: a fresh cell starts with the one strong reference we adopt.
        unsafe { Self::adopt(Cell::allocate(value)) }
    }

    /// Take over a strong reference the caller already owns.
    ///
    /// # Safety
    ///
    /// `cell` must be live and the caller must transfer one strong reference.
    pub(crate) unsafe fn adopt(cell: NonNull<Cell<T, C>>) -> Self {
        Self {
            slot: SlotCell::new(cell.as_ptr() as usize),
            _marker: PhantomData,
        }
    }

    pub(crate) fn cell_ptr(&self) -> Option<NonNull<Cell<T, C>>> {
        NonNull::new(self.slot.addr() as *mut Cell<T, C>)
    }

    pub(crate) fn cell(&self) -> Option<&Cell<T, C>> {
        // SAFETY: our strong reference keeps the cell alive.
        self.cell_ptr().map(|cell| unsafe { &*cell.as_ptr() })
    }

    pub(crate) fn payload(&self) -> *mut T {
        self.cell().map_or(ptr::null_mut(), Cell::payload)
    }

    pub(crate) fn strong_count(&self) -> usize {
        self.cell().map_or(0, |cell| cell.strong() as usize)
    }

    /// Whether this is the only handle of any kind on the cell.
    pub(crate) fn is_unique(&self) -> bool {
        self.cell()
            .is_some_and(|cell| cell.strong() == 1 && cell.links() == 1)
    }

    pub(crate) fn is_compressed(&self) -> bool {
        self.slot.is_compressed()
    }

    pub(crate) fn get_mut(&mut self) -> Option<&mut T> {
        if !self.is_unique() {
            return None;
        }
        // SAFETY: no other handle can reach the payload while `&mut self`
        // is held and no weak handle exists to upgrade.
        unsafe { self.payload().as_mut() }
    }

    /// Give up this reference, leaving the handle empty.
    pub(crate) fn reset(&mut self) {
        if let Some(cell) = NonNull::new(self.slot.take() as *mut Cell<T, C>) {
            // SAFETY: the slot held one strong reference, now released.
            unsafe { Cell::release_strong(cell) };
        }
    }
}

impl<T, C: Compression> Clone for CellRef<T, C> {
    fn clone(&self) -> Self {
        match self.cell_ptr() {
            Some(cell) => {
                // SAFETY: `self` keeps the cell alive while we add a reference.
                unsafe { cell.as_ref() }.acquire_strong();
                // SAFETY: the reference just acquired is transferred.
                unsafe { Self::adopt(cell) }
            }
            None => Self::empty(),
        }
    }
}

impl<T, C: Compression> Drop for CellRef<T, C> {
    fn drop(&mut self) {
        self.reset();
    }
}
