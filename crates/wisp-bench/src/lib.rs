//! Benchmark workloads for wisp handles.
//!
//! Provides small pointer-heavy structures used by the criterion benches:
//!
//! - [`build_list`] / [`sum_list`]: a singly linked list whose links are
//!   4-byte [`UniquePtr`]s
//! - [`fan_out`]: one shared payload with many strong and weak handles

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use wisp_ptr::{Shared, UniquePtr, Weak};

/// A list node linked through a compressed owning pointer.
#[derive(Default)]
pub struct Node {
    /// Payload.
    pub value: u64,
    /// Next node, empty at the tail.
    pub next: UniquePtr<Node>,
}

/// Build a list holding `0..len`, head first.
pub fn build_list(len: u64) -> UniquePtr<Node> {
    let mut head = UniquePtr::empty();
    for value in (0..len).rev() {
        head = UniquePtr::new(Node { value, next: head });
    }
    head
}

/// Sum every value reachable from `head`.
pub fn sum_list(head: &UniquePtr<Node>) -> u64 {
    let mut total = 0;
    let mut cursor = head.as_ref();
    while let Some(node) = cursor {
        total += node.value;
        cursor = node.next.as_ref();
    }
    total
}

/// Tear down a list iteratively so long lists do not recurse in `Drop`.
pub fn drop_list(mut head: UniquePtr<Node>) {
    while let Some(mut node) = head.take() {
        head = std::mem::take(&mut node.next);
    }
}

/// A shared payload with `strong` extra strong handles and `weak` weak
/// handles.
pub fn fan_out(strong: usize, weak: usize) -> (Vec<Shared<u64>>, Vec<Weak<u64>>) {
    let root = Shared::new(42);
    let weaks = (0..weak).map(|_| root.weak_ref()).collect();
    let mut strongs: Vec<_> = (0..strong).map(|_| root.clone()).collect();
    strongs.push(root);
    (strongs, weaks)
}
