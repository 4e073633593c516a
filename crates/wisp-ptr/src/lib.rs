//! Ownership layer for wisp compressed pointers.
//!
//! Every handle here stores its address as a 32-bit slot from `wisp-core`
//! and adds ownership semantics on top:
//!
//! - [`CompressedPtr`]: unique, relay or borrowed ownership, selected by
//!   marker types from [`policy`], with required, nullable or lazy
//!   nullability.
//! - [`Shared`] / [`Weak`]: atomically counted shared ownership with
//!   tracked weak observers that are cleared when the last strong handle
//!   drops.
//! - [`CowShared`]: shared ownership that copies before mutation.
//! - [`CompactArray`] / [`FixedArray`]: arrays whose headers are 8 and 4
//!   bytes.
//!
//! The [`Handle`] trait gives every strong handle the same optional-access
//! combinators.
//!
//! # Thread safety
//!
//! Counts, the overflow table and weak registries are synchronized. The
//! pointee itself is not: mutation goes through `&mut` as usual.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod array;
mod cell;
pub mod compressed;
pub mod cow;
pub mod fixed;
pub mod handle;
pub mod policy;
pub mod shared;
pub mod tracker;
pub mod weak;

pub use array::CompactArray;
pub use compressed::{
    CompressedPtr, LazyPtr, RawPtr, RawRef, RelayPtr, UniquePtr, UniqueRef,
};
pub use cow::CowShared;
pub use fixed::FixedArray;
pub use handle::Handle;
pub use policy::{Borrowed, Lazy, Nullable, Relay, Required, Unique};
pub use shared::Shared;
pub use tracker::{WeakObserver, WeakTracker};
pub use weak::Weak;

// Handles cross thread boundaries whenever their pointee can.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<UniquePtr<String>>();
    assert::<Shared<Vec<u8>>>();
    assert::<Weak<Vec<u8>>>();
    assert::<CowShared<String>>();
    assert::<CompactArray<u64>>();
    assert::<FixedArray<u64, 4>>();
};
