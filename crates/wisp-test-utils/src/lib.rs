//! Test utilities for wisp development.
//!
//! Provides drop-counting fixtures ([`DropCounter`], [`Counted`]) for
//! checking that owning handles free exactly once, plus address fixtures
//! in [`fixtures`] for exercising the overflow path.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared tally of how many [`Counted`] values have been dropped.
///
/// Clones share the same tally, so a counter can be handed to several
/// threads.
#[derive(Clone, Debug, Default)]
pub struct DropCounter {
    dropped: Arc<AtomicUsize>,
}

impl DropCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A value whose drop is recorded by this counter.
    pub fn track(&self, id: u32) -> Counted {
        Counted {
            id,
            counter: Arc::clone(&self.dropped),
        }
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }
}

/// A value that bumps its [`DropCounter`] when dropped.
///
/// Cloning makes a second tracked value, which is counted separately.
#[derive(Clone, Debug)]
pub struct Counted {
    pub id: u32,
    counter: Arc<AtomicUsize>,
}

impl PartialEq for Counted {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Default for Counted {
    fn default() -> Self {
        Self {
            id: 0,
            counter: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Drop for Counted {
    fn drop(&mut self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }
}
