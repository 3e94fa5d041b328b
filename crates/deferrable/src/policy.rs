//! Sharing policy abstraction.
//!
//! This module provides the `SharingPolicy` trait for abstracting over
//! single-threaded (`Rc`) and thread-safe (`Arc`) ownership of handle values.

use std::cell::RefCell;
use std::ops::Deref;
use std::rc::{self, Rc};
use std::sync::{self, Arc};

use parking_lot::Mutex;

/// Trait abstracting over Rc/Arc, their weak pointers, and interior mutability.
///
/// This allows the retention state machine and the soft pool to work for
/// both single-threaded and thread-safe handles without code duplication.
pub trait SharingPolicy: 'static {
    /// Reference-counted pointer type (Rc or Arc).
    type Ptr<T: 'static>: Clone + Deref<Target = T>;

    /// Non-owning pointer type (rc::Weak or sync::Weak).
    type WeakPtr<T: 'static>: Clone;

    /// Lock type guarding shared mutable state (RefCell or Mutex).
    type Lock<T: 'static>;

    /// Move a value into a new shared pointer.
    fn share<T: 'static>(value: T) -> Self::Ptr<T>;

    /// Create a non-owning observation of a shared pointer.
    fn downgrade<T: 'static>(ptr: &Self::Ptr<T>) -> Self::WeakPtr<T>;

    /// Resolve a weak pointer, if some strong holder is still alive.
    fn upgrade<T: 'static>(weak: &Self::WeakPtr<T>) -> Option<Self::Ptr<T>>;

    /// Wrap state in the policy's lock.
    fn new_lock<T: 'static>(value: T) -> Self::Lock<T>;

    /// Run `f` with exclusive access to the locked state.
    fn with_lock<T: 'static, R>(lock: &Self::Lock<T>, f: impl FnOnce(&mut T) -> R) -> R;
}

// ============================================================================
// SingleThreaded Policy
// ============================================================================

/// Single-threaded policy using Rc and RefCell.
///
/// Best for single-threaded applications where performance is critical.
/// Locked sections never call user code, so the RefCell is never re-borrowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleThreaded;

impl SharingPolicy for SingleThreaded {
    type Ptr<T: 'static> = Rc<T>;
    type WeakPtr<T: 'static> = rc::Weak<T>;
    type Lock<T: 'static> = RefCell<T>;

    #[inline]
    fn share<T: 'static>(value: T) -> Rc<T> {
        Rc::new(value)
    }

    #[inline]
    fn downgrade<T: 'static>(ptr: &Rc<T>) -> rc::Weak<T> {
        Rc::downgrade(ptr)
    }

    #[inline]
    fn upgrade<T: 'static>(weak: &rc::Weak<T>) -> Option<Rc<T>> {
        weak.upgrade()
    }

    #[inline]
    fn new_lock<T: 'static>(value: T) -> RefCell<T> {
        RefCell::new(value)
    }

    #[inline]
    fn with_lock<T: 'static, R>(lock: &RefCell<T>, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut *lock.borrow_mut())
    }
}

// ============================================================================
// ThreadSafe Policy
// ============================================================================

/// Thread-safe policy using Arc and parking_lot::Mutex.
///
/// Safe for sharing across thread boundaries.
/// Slightly higher overhead due to atomic reference counts and locking.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSafe;

impl SharingPolicy for ThreadSafe {
    type Ptr<T: 'static> = Arc<T>;
    type WeakPtr<T: 'static> = sync::Weak<T>;
    type Lock<T: 'static> = Mutex<T>;

    #[inline]
    fn share<T: 'static>(value: T) -> Arc<T> {
        Arc::new(value)
    }

    #[inline]
    fn downgrade<T: 'static>(ptr: &Arc<T>) -> sync::Weak<T> {
        Arc::downgrade(ptr)
    }

    #[inline]
    fn upgrade<T: 'static>(weak: &sync::Weak<T>) -> Option<Arc<T>> {
        weak.upgrade()
    }

    #[inline]
    fn new_lock<T: 'static>(value: T) -> Mutex<T> {
        Mutex::new(value)
    }

    #[inline]
    fn with_lock<T: 'static, R>(lock: &Mutex<T>, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut *lock.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<P: SharingPolicy>() {
        let strong = P::share(String::from("value"));
        let weak = P::downgrade::<String>(&strong);

        let upgraded = P::upgrade::<String>(&weak).unwrap();
        assert_eq!(*upgraded, "value");

        drop(strong);
        assert!(P::upgrade::<String>(&weak).is_some());

        drop(upgraded);
        assert!(P::upgrade::<String>(&weak).is_none());
    }

    #[test]
    fn test_single_threaded_weak_lifecycle() {
        roundtrip::<SingleThreaded>();
    }

    #[test]
    fn test_thread_safe_weak_lifecycle() {
        roundtrip::<ThreadSafe>();
    }

    #[test]
    fn test_with_lock_mutates() {
        let cell = SingleThreaded::new_lock(1);
        SingleThreaded::with_lock(&cell, |v| *v += 1);
        assert_eq!(SingleThreaded::with_lock(&cell, |v| *v), 2);

        let mutex = ThreadSafe::new_lock(vec![1]);
        ThreadSafe::with_lock(&mutex, |v| v.push(2));
        assert_eq!(ThreadSafe::with_lock(&mutex, |v| v.len()), 2);
    }
}
