//! Wisp: 32-bit compressed pointers with unique, shared, weak and
//! copy-on-write ownership.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the wisp sub-crates. For most users, adding `wisp` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use wisp::prelude::*;
//!
//! #[derive(Default)]
//! struct Node {
//!     value: u32,
//!     next: UniquePtr<Node>,
//! }
//!
//! // Each link costs four bytes.
//! assert_eq!(std::mem::size_of::<UniquePtr<Node>>(), 4);
//!
//! let tail = UniquePtr::new(Node { value: 2, next: UniquePtr::empty() });
//! let head: UniquePtr<Node> = UniquePtr::new(Node { value: 1, next: tail });
//! assert_eq!(head.next.value, 2);
//!
//! // Shared ownership with a weak observer.
//! let strong: Shared<String> = Shared::new(String::from("config"));
//! let weak = strong.weak_ref();
//! assert_eq!(weak.upgrade().as_deref().map(String::as_str), Some("config"));
//! drop(strong);
//! assert!(weak.upgrade().is_none());
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the
//! prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`slot`] | `wisp-core` | Slot codec, compression strategies, global mask, overflow table |
//! | [`ptr`] | `wisp-ptr` | Ownership handles, weak tracking, compact arrays |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Slot encoding and the shared overflow table (`wisp-core`).
///
/// Most users only need a [`slot::Compression`] strategy from this module
/// when the default [`slot::DefaultCompression`] does not fit.
pub use wisp_core as slot;

/// Ownership handles over compressed slots (`wisp-ptr`).
///
/// Includes [`ptr::CompressedPtr`] and its aliases, [`ptr::Shared`],
/// [`ptr::Weak`], [`ptr::CowShared`], [`ptr::CompactArray`] and
/// [`ptr::FixedArray`].
pub use wisp_ptr as ptr;

/// Common imports for typical wisp usage.
///
/// ```rust
/// use wisp::prelude::*;
/// ```
pub mod prelude {
    // Strategies
    pub use wisp_core::{Compression, DefaultCompression, Shifted, TableOnly};

    // Errors
    pub use wisp_core::CoreError;

    // Handles
    pub use wisp_ptr::{
        CompactArray, CompressedPtr, CowShared, FixedArray, Handle, LazyPtr, RawPtr, RawRef,
        RelayPtr, Shared, UniquePtr, UniqueRef, Weak,
    };

    // Policies
    pub use wisp_ptr::{Borrowed, Lazy, Nullable, Relay, Required, Unique};
}
