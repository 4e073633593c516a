//! Side table for addresses that cannot be compressed.
//!
//! Entries are raw addresses; zero marks a vacated index. Removal nulls the
//! entry in place unless it is the last one, in which case trailing nulls
//! are popped. The `first_free` hint never exceeds the index of any null
//! entry, so inserts always reuse the lowest free index and the table never
//! grows past the peak number of simultaneously live entries.

use parking_lot::RwLock;

use crate::config::MAX_OVERFLOW_INDEX;
use crate::error::CoreError;

static TABLE: RwLock<OverflowTable> = parking_lot::const_rwlock(OverflowTable::new());

/// The process-wide overflow table used by the codec.
///
/// Mutations take the write lock. Lookups take the read lock: a `Vec`
/// cannot be read safely while another thread may be growing it.
pub fn global() -> &'static RwLock<OverflowTable> {
    &TABLE
}

/// Snapshot of the process-wide table.
pub fn stats() -> OverflowStats {
    TABLE.read().stats()
}

/// Occupancy counters for an [`OverflowTable`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OverflowStats {
    /// Number of entries, including vacated ones below the last live entry.
    pub len: usize,
    /// Number of live entries.
    pub live: usize,
}

/// Growable table of raw addresses indexed by tagged slots.
#[derive(Debug, Default)]
pub struct OverflowTable {
    entries: Vec<usize>,
    first_free: usize,
}

impl OverflowTable {
    /// Create an empty table.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            first_free: 0,
        }
    }

    /// Store `addr` and return its index.
    ///
    /// Reuses the lowest vacated index, else appends. Fails only when the
    /// index would not fit the tagged slot encoding.
    pub fn insert(&mut self, addr: usize) -> Result<u32, CoreError> {
        debug_assert_ne!(addr, 0, "null is never stored in the overflow table");
        let start = self.first_free.min(self.entries.len());
        let index = match self.entries[start..].iter().position(|&e| e == 0) {
            Some(offset) => {
                let index = start + offset;
                self.entries[index] = addr;
                index
            }
            None => {
                let index = self.entries.len();
                if index > MAX_OVERFLOW_INDEX as usize {
                    return Err(CoreError::OverflowExhausted { live: self.live() });
                }
                self.entries.push(addr);
                index
            }
        };
        self.first_free = index + 1;
        Ok(index as u32)
    }

    /// Overwrite the entry at `index` with a new non-null address.
    ///
    /// Out-of-range indices are ignored.
    pub fn update(&mut self, index: u32, addr: usize) {
        debug_assert_ne!(addr, 0, "use remove to vacate an entry");
        if let Some(entry) = self.entries.get_mut(index as usize) {
            *entry = addr;
        }
    }

    /// Vacate `index`, returning the address it held.
    pub fn remove(&mut self, index: u32) -> Option<usize> {
        let index = index as usize;
        if index >= self.entries.len() {
            return None;
        }
        let old = if index + 1 == self.entries.len() {
            let old = self.entries.pop();
            while self.entries.last() == Some(&0) {
                self.entries.pop();
            }
            self.first_free = self.first_free.min(self.entries.len());
            old
        } else {
            let old = std::mem::replace(&mut self.entries[index], 0);
            self.first_free = self.first_free.min(index);
            Some(old)
        };
        old.filter(|&addr| addr != 0)
    }

    /// Address stored at `index`, or 0 if vacated or out of range.
    pub fn lookup(&self, index: u32) -> usize {
        self.entries.get(index as usize).copied().unwrap_or(0)
    }

    /// Number of entries, live or vacated.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of live (non-null) entries.
    pub fn live(&self) -> usize {
        self.entries.iter().filter(|&&e| e != 0).count()
    }

    /// Current free-index hint.
    pub fn first_free(&self) -> usize {
        self.first_free
    }

    /// Occupancy snapshot.
    pub fn stats(&self) -> OverflowStats {
        OverflowStats {
            len: self.len(),
            live: self.live(),
        }
    }
}
