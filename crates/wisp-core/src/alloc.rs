//! Global allocator that keeps heap addresses compressible.
//!
//! The default strategy stores an address directly only when it is 16-byte
//! aligned. Installing [`AlignedAlloc`] raises every allocation to that
//! alignment so small boxes never fall back to the overflow table:
//!
//! ```ignore
//! #[global_allocator]
//! static ALLOC: wisp_core::alloc::AlignedAlloc = wisp_core::alloc::AlignedAlloc::new();
//! ```

use std::alloc::{GlobalAlloc, Layout, System};

/// Alignment every allocation is raised to.
pub const MIN_ALIGN: usize = 16;

/// A [`GlobalAlloc`] wrapper raising alignment to [`MIN_ALIGN`].
#[derive(Clone, Copy, Debug, Default)]
pub struct AlignedAlloc<A = System> {
    inner: A,
}

impl AlignedAlloc<System> {
    /// Wrap the system allocator.
    pub const fn new() -> Self {
        Self { inner: System }
    }
}

impl<A> AlignedAlloc<A> {
    /// Wrap an arbitrary allocator.
    pub const fn with_inner(inner: A) -> Self {
        Self { inner }
    }
}

fn raise(layout: Layout) -> Layout {
    layout.align_to(MIN_ALIGN).unwrap_or(layout)
}

// SAFETY: every call forwards to `inner` with the same raised layout, so
// blocks are always freed and resized with the layout they were made with.
#[allow(unsafe_code)]
unsafe impl<A: GlobalAlloc> GlobalAlloc for AlignedAlloc<A> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // SAFETY: caller guarantees a non-zero size; raising alignment keeps it.
        unsafe { self.inner.alloc(raise(layout)) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        // SAFETY: as for `alloc`.
        unsafe { self.inner.alloc_zeroed(raise(layout)) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY: `ptr` came from `alloc` with the same raised layout.
        unsafe { self.inner.dealloc(ptr, raise(layout)) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // SAFETY: `ptr` came from `alloc` with the same raised layout.
        unsafe { self.inner.realloc(ptr, raise(layout), new_size) }
    }
}
