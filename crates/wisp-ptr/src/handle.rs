//! The shared capability surface of every strong handle.
//!
//! Handles differ in how they store and free their pointee but agree on one
//! question: "what does this point at right now?". [`Handle`] answers it once
//! and derives the optional-access combinators from the answer.

use wisp_core::violation;

/// A handle whose pointee can be borrowed for as long as the handle is.
///
/// # Safety
///
/// [`as_ptr`](Handle::as_ptr) must return either null or a pointer to a
/// live, initialized `Target` that stays valid and unaliased by `&mut` for
/// as long as the `&self` borrow it was obtained through.
pub unsafe trait Handle {
    /// The pointee type.
    type Target;

    /// Current pointee address, null when empty.
    ///
    /// Never constructs a lazy pointee.
    fn as_ptr(&self) -> *const Self::Target;

    /// Whether the handle currently refers to something.
    fn has_ref(&self) -> bool {
        !self.as_ptr().is_null()
    }

    /// Borrow the pointee if present.
    fn try_ref(&self) -> Option<&Self::Target> {
        // SAFETY: the trait contract makes a non-null pointer valid for
        // the lifetime of `&self`.
        unsafe { self.as_ptr().as_ref() }
    }

    /// Borrow the pointee, treating an empty handle as a contract violation.
    #[track_caller]
    fn ref_or_fail(&self) -> &Self::Target {
        match self.try_ref() {
            Some(target) => target,
            None => violation("handle is empty"),
        }
    }

    /// Borrow the pointee, or `fallback` when empty.
    fn ref_or_else<'a>(&'a self, fallback: &'a Self::Target) -> &'a Self::Target {
        self.try_ref().unwrap_or(fallback)
    }

    /// Run `f` on the pointee if present. Returns whether it ran.
    fn run_if_ref<F>(&self, f: F) -> bool
    where
        F: FnOnce(&Self::Target),
    {
        match self.try_ref() {
            Some(target) => {
                f(target);
                true
            }
            None => false,
        }
    }

    /// `f(pointee)` if present, otherwise `fallback`.
    fn call_if_ref<R, F>(&self, f: F, fallback: R) -> R
    where
        F: FnOnce(&Self::Target) -> R,
    {
        self.try_ref().map_or(fallback, f)
    }

    /// `f(pointee)` if present, otherwise `default()`.
    fn map_or_else<R, D, F>(&self, default: D, f: F) -> R
    where
        D: FnOnce() -> R,
        F: FnOnce(&Self::Target) -> R,
    {
        self.try_ref().map_or_else(default, f)
    }

    /// Whether both handles refer to the same address (both empty counts).
    fn ptr_eq<H>(&self, other: &H) -> bool
    where
        H: Handle<Target = Self::Target> + ?Sized,
    {
        std::ptr::eq(self.as_ptr(), other.as_ptr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Option<Box<u32>>);

    // SAFETY: the box lives as long as `self`.
    unsafe impl Handle for Fixed {
        type Target = u32;

        fn as_ptr(&self) -> *const u32 {
            self.0.as_deref().map_or(std::ptr::null(), |v| v as *const u32)
        }
    }

    #[test]
    fn combinators_on_present_handle() {
        let h = Fixed(Some(Box::new(7)));
        assert!(h.has_ref());
        assert_eq!(h.try_ref(), Some(&7));
        assert_eq!(*h.ref_or_fail(), 7);
        assert_eq!(*h.ref_or_else(&0), 7);
        assert_eq!(h.call_if_ref(|v| v * 2, 0), 14);
        assert_eq!(h.map_or_else(|| 0, |v| v + 1), 8);

        let mut seen = 0;
        assert!(h.run_if_ref(|v| seen = *v));
        assert_eq!(seen, 7);
    }

    #[test]
    fn combinators_on_empty_handle() {
        let h = Fixed(None);
        assert!(!h.has_ref());
        assert_eq!(h.try_ref(), None);
        assert_eq!(*h.ref_or_else(&3), 3);
        assert_eq!(h.call_if_ref(|v| *v, 9), 9);
        assert_eq!(h.map_or_else(|| 5, |v| *v), 5);
        assert!(!h.run_if_ref(|_| panic!("must not run")));
    }

    #[test]
    #[should_panic(expected = "handle is empty")]
    fn ref_or_fail_on_empty_panics() {
        Fixed(None).ref_or_fail();
    }

    #[test]
    fn ptr_eq_compares_addresses() {
        let a = Fixed(Some(Box::new(1)));
        let b = Fixed(Some(Box::new(1)));
        assert!(a.ptr_eq(&a));
        assert!(!a.ptr_eq(&b));
        assert!(Fixed(None).ptr_eq(&Fixed(None)));
    }
}
