//! Error types and the precondition-violation hook.
//!
//! Two classes of failure exist. Recoverable capacity problems are reported
//! as [`CoreError`]. Contract breaches (dereferencing an empty handle that
//! may not be empty, storing null in a required reference) are fatal and
//! go through [`violation`].

use std::error::Error;
use std::fmt;

/// Recoverable errors from slot encoding and buffer management.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoreError {
    /// The overflow table ran out of taggable indices.
    OverflowExhausted {
        /// Number of live entries at the time of the request.
        live: usize,
    },
    /// The allocator could not provide a buffer.
    AllocationFailed {
        /// Number of bytes requested.
        bytes: usize,
    },
    /// A length does not fit in the packed length field.
    LengthOverflow {
        /// The requested length.
        requested: usize,
        /// Largest representable length.
        max: usize,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OverflowExhausted { live } => {
                write!(f, "overflow table exhausted with {live} live entries")
            }
            Self::AllocationFailed { bytes } => {
                write!(f, "allocation of {bytes} bytes failed")
            }
            Self::LengthOverflow { requested, max } => {
                write!(f, "length {requested} exceeds packed maximum {max}")
            }
        }
    }
}

impl Error for CoreError {}

/// Abort the current operation because a handle contract was broken.
///
/// Not recoverable: callers are expected to uphold the contract, the same
/// way an out-of-bounds slice index is a bug rather than an error value.
#[cold]
#[inline(never)]
#[track_caller]
pub fn violation(what: &str) -> ! {
    panic!("precondition violated: {what}")
}
