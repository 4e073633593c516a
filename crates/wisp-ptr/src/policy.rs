//! Compile-time ownership and nullability markers.
//!
//! A [`CompressedPtr`](crate::CompressedPtr) carries one marker of each
//! kind. Operations are gated on the marker traits, so an illegal
//! combination (a borrowed pointer with lazy construction, `take` on a
//! required reference) fails to compile instead of failing at runtime.

use std::ptr::NonNull;

use wisp_core::{violation, Compression, SlotCell};

mod sealed {
    pub trait Sealed {}
}

/// Who frees the pointee.
pub trait Ownership: sealed::Sealed + Send + Sync + 'static {
    /// Whether the handle frees the pointee on drop.
    const OWNS: bool;
}

/// Ownership markers that free the pointee.
pub trait Owning: Ownership {}

/// Never frees. Cloning copies the address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Borrowed;

/// Frees exactly once, on drop. Not cloneable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Unique;

/// Owning, with an explicit hand-off that empties the source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Relay;

impl sealed::Sealed for Borrowed {}
impl sealed::Sealed for Unique {}
impl sealed::Sealed for Relay {}

impl Ownership for Borrowed {
    const OWNS: bool = false;
}

impl Ownership for Unique {
    const OWNS: bool = true;
}

impl Ownership for Relay {
    const OWNS: bool = true;
}

impl Owning for Unique {}
impl Owning for Relay {}

/// Whether a handle may be empty, and what dereferencing an empty one does.
pub trait Nullability: sealed::Sealed + Send + Sync + 'static {
    /// Whether the empty state is legal.
    const ALLOWS_NULL: bool;
    /// Whether the first dereference default-constructs the pointee.
    const LAZY: bool;
}

/// Nullability markers whose handles can be emptied.
pub trait Emptyable: Nullability {}

/// Never empty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Required;

/// May be empty. Dereferencing an empty handle is a contract violation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Nullable;

/// Empty until first dereference, which builds `T::default()`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Lazy;

impl sealed::Sealed for Required {}
impl sealed::Sealed for Nullable {}
impl sealed::Sealed for Lazy {}

impl Nullability for Required {
    const ALLOWS_NULL: bool = false;
    const LAZY: bool = false;
}

impl Nullability for Nullable {
    const ALLOWS_NULL: bool = true;
    const LAZY: bool = false;
}

impl Nullability for Lazy {
    const ALLOWS_NULL: bool = true;
    const LAZY: bool = true;
}

impl Emptyable for Nullable {}
impl Emptyable for Lazy {}

/// How a nullability marker turns a stored address into a pointee.
pub trait Resolve<T>: Nullability {
    /// Pointee address for dereferencing. Never null.
    fn resolve<C: Compression>(slot: &SlotCell<C>) -> NonNull<T>;
}

impl<T> Resolve<T> for Required {
    #[track_caller]
    fn resolve<C: Compression>(slot: &SlotCell<C>) -> NonNull<T> {
        match NonNull::new(slot.addr() as *mut T) {
            Some(ptr) => ptr,
            None => violation("required pointer is empty"),
        }
    }
}

impl<T> Resolve<T> for Nullable {
    #[track_caller]
    fn resolve<C: Compression>(slot: &SlotCell<C>) -> NonNull<T> {
        match NonNull::new(slot.addr() as *mut T) {
            Some(ptr) => ptr,
            None => violation("dereferenced an empty pointer"),
        }
    }
}

impl<T: Default> Resolve<T> for Lazy {
    fn resolve<C: Compression>(slot: &SlotCell<C>) -> NonNull<T> {
        if let Some(ptr) = NonNull::new(slot.addr() as *mut T) {
            return ptr;
        }
        let fresh = Box::into_raw(Box::new(T::default()));
        match slot.fill_if_empty(fresh as usize) {
            // SAFETY: `fresh` came from `Box::into_raw` and is non-null.
            Ok(()) => unsafe { NonNull::new_unchecked(fresh) },
            Err(winner) => {
                // SAFETY: the CAS failed, so `fresh` was never published.
                drop(unsafe { Box::from_raw(fresh) });
                match NonNull::new(winner as *mut T) {
                    Some(ptr) => ptr,
                    None => violation("lazy pointer emptied during construction"),
                }
            }
        }
    }
}
