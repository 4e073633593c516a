//! Per-cell registry of weak observers.
//!
//! Each weak handle owns a heap-pinned [`WeakObserver`] whose `target` slot
//! holds the payload address. The cell's tracker remembers every observer so
//! that the thread dropping the last strong handle can clear them all.

use std::fmt;

use parking_lot::Mutex;
use smallvec::SmallVec;
use wisp_core::{Compression, SlotCell};

use crate::compressed::RawPtr;

/// The part of a weak handle the tracker can reach.
// Aligned so its address compresses directly under every strategy.
#[repr(align(16))]
pub struct WeakObserver<C: Compression> {
    target: SlotCell<C>,
}

impl<C: Compression> WeakObserver<C> {
    /// An observer that points at nothing.
    pub fn new() -> Self {
        Self {
            target: SlotCell::empty(),
        }
    }

    /// Observed payload address, 0 once invalidated.
    pub fn target(&self) -> usize {
        self.target.addr()
    }

    /// Whether the observer still points at a payload.
    pub fn is_present(&self) -> bool {
        !self.target.is_empty()
    }
}

impl<C: Compression> Default for WeakObserver<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Compression> fmt::Debug for WeakObserver<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObserver")
            .field("target", &format_args!("{:#x}", self.target()))
            .finish()
    }
}

struct TrackerState<C: Compression> {
    observers: SmallVec<[RawPtr<WeakObserver<C>, C>; 4]>,
    invalidated: bool,
}

/// Registry of the weak observers of one cell.
pub struct WeakTracker<C: Compression> {
    state: Mutex<TrackerState<C>>,
}

impl<C: Compression> WeakTracker<C> {
    /// An empty tracker.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TrackerState {
                observers: SmallVec::new(),
                invalidated: false,
            }),
        }
    }

    /// Point `observer` at `target` and register it.
    ///
    /// Returns `false` and leaves the observer empty if the tracker has
    /// already been invalidated.
    ///
    /// # Safety
    ///
    /// `observer` must stay at its address until it is passed to
    /// [`untrack`](Self::untrack) or the tracker is invalidated.
    pub unsafe fn track(&self, observer: &WeakObserver<C>, target: usize) -> bool {
        let mut state = self.state.lock();
        if state.invalidated || target == 0 {
            return false;
        }
        if observer.target.fill_if_empty(target).is_err() {
            return false;
        }
        let ptr = observer as *const WeakObserver<C> as *mut WeakObserver<C>;
        // SAFETY: the caller keeps `observer` in place while it is tracked.
        state.observers.push(unsafe { RawPtr::from_raw(ptr) });
        true
    }

    /// Forget `observer`. A miss is not an error.
    pub fn untrack(&self, observer: &WeakObserver<C>) -> bool {
        let wanted = observer as *const WeakObserver<C> as *mut WeakObserver<C>;
        let mut state = self.state.lock();
        match state.observers.iter().position(|o| o.ptr() == wanted) {
            Some(i) => {
                state.observers.remove(i);
                true
            }
            None => false,
        }
    }

    /// Clear every tracked observer and refuse future ones.
    ///
    /// The lock is held across the whole walk, so no observer can be
    /// untracked and freed while it is being cleared. Returns the number of
    /// observers cleared.
    pub fn invalidate_all(&self) -> usize {
        let drained = {
            let mut state = self.state.lock();
            state.invalidated = true;
            for observer in &state.observers {
                observer.value().target.clear();
            }
            std::mem::take(&mut state.observers)
        };
        let count = drained.len();
        tracing::trace!(observers = count, "weak observers invalidated");
        count
    }

    /// Number of tracked observers.
    pub fn len(&self) -> usize {
        self.state.lock().observers.len()
    }

    /// Whether no observer is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether [`invalidate_all`](Self::invalidate_all) has run.
    pub fn is_invalidated(&self) -> bool {
        self.state.lock().invalidated
    }
}

impl<C: Compression> Default for WeakTracker<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Compression> fmt::Debug for WeakTracker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("WeakTracker")
            .field("observers", &state.observers.len())
            .field("invalidated", &state.invalidated)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wisp_core::{DefaultCompression, TableOnly};

    type Tracker = WeakTracker<DefaultCompression>;
    type Observer = WeakObserver<DefaultCompression>;

    #[test]
    fn track_and_untrack() {
        let payload = Box::new(1u64);
        let addr = &*payload as *const u64 as usize;
        let tracker = Tracker::new();
        let a = Box::new(Observer::new());
        let b = Box::new(Observer::new());

        // SAFETY: both observers outlive the tracker's use of them.
        unsafe {
            assert!(tracker.track(&a, addr));
            assert!(tracker.track(&b, addr));
        }
        assert_eq!(tracker.len(), 2);
        assert_eq!(a.target(), addr);

        assert!(tracker.untrack(&a));
        assert!(!tracker.untrack(&a));
        assert_eq!(tracker.len(), 1);
        assert!(tracker.untrack(&b));
        assert!(tracker.is_empty());
    }

    #[test]
    fn invalidate_clears_every_observer() {
        let payload = Box::new(2u64);
        let addr = &*payload as *const u64 as usize;
        let tracker = Tracker::new();
        let observers: Vec<Box<Observer>> = (0..6).map(|_| Box::new(Observer::new())).collect();
        for o in &observers {
            // SAFETY: observers outlive the tracker.
            assert!(unsafe { tracker.track(o, addr) });
        }

        assert_eq!(tracker.invalidate_all(), 6);
        assert!(tracker.is_invalidated());
        assert!(tracker.is_empty());
        assert!(observers.iter().all(|o| !o.is_present()));
    }

    #[test]
    fn track_after_invalidation_is_refused() {
        let payload = Box::new(3u64);
        let addr = &*payload as *const u64 as usize;
        let tracker = Tracker::new();
        tracker.invalidate_all();
        let late = Observer::new();
        // SAFETY: refused observers are never stored.
        assert!(!unsafe { tracker.track(&late, addr) });
        assert!(!late.is_present());
        assert_eq!(tracker.len(), 0);
    }

    #[test]
    fn overflowed_targets_are_released() {
        let payload = Box::new(4u64);
        let addr = &*payload as *const u64 as usize;
        let tracker = WeakTracker::<TableOnly>::new();
        let o = Box::new(WeakObserver::<TableOnly>::new());
        // SAFETY: `o` outlives the tracker.
        assert!(unsafe { tracker.track(&o, addr) });
        assert_eq!(o.target(), addr);
        tracker.invalidate_all();
        assert_eq!(o.target(), 0);
    }
}
