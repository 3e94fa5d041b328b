//! Single-threaded reclaimable handles.
//!
//! A [`Reclaimable`] holds an expensive value that can be released and
//! brought back. Values are shared as `Rc<T>`: callers that keep a clone
//! after `release` are what keep a weakly retained value salvageable.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use deferrable::Reclaimable;
//!
//! let mut mesh = Reclaimable::weak_retain(None, || vec![0.0f32; 1024]);
//! let in_use = mesh.get();
//!
//! mesh.release();
//! assert!(!mesh.is_present());
//!
//! // Still referenced elsewhere, so the next get salvages it.
//! let again = mesh.get();
//! assert!(Rc::ptr_eq(&in_use, &again));
//! assert_eq!(mesh.stats().restores, 1);
//! ```

use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;

use crate::deferred::{infallible, into_ok};
use crate::error::BuildError;
use crate::policy::SingleThreaded;
use crate::retention::{LifecycleStats, RetainPolicy, Retention, Source};
use crate::soft::SoftPool;

type RestoreFn<T, E> = Box<dyn FnMut() -> Result<T, E>>;
type Hook<T> = Box<dyn FnMut(&T)>;

/// A value that can be released and later salvaged or rebuilt.
///
/// `E` is the restore function's error type. Infallible handles use the
/// default and get the panic-free [`get`](Reclaimable::get).
pub struct Reclaimable<T: 'static, E = Infallible> {
    state: Retention<T, SingleThreaded>,
    restore: RestoreFn<T, E>,
    on_reload: Option<Hook<T>>,
    on_unload: Option<Hook<T>>,
}

impl<T: 'static> Reclaimable<T> {
    /// Create a handle with the given policy. `initial: None` means lazy.
    pub fn with_policy(
        policy: RetainPolicy,
        initial: Option<T>,
        restore: impl FnMut() -> T + 'static,
    ) -> Self {
        Self::fallible(policy, initial, infallible(restore))
    }

    /// Handle that discards its value on release.
    pub fn no_retain(initial: Option<T>, restore: impl FnMut() -> T + 'static) -> Self {
        Self::with_policy(RetainPolicy::NoRetain, initial, restore)
    }

    /// Handle that salvages its value if it is still referenced elsewhere.
    pub fn weak_retain(initial: Option<T>, restore: impl FnMut() -> T + 'static) -> Self {
        Self::with_policy(RetainPolicy::WeakRetain, initial, restore)
    }

    /// Handle that keeps its value pinned until the host relieves memory.
    ///
    /// The handle gets a private [`SoftPool`] on first release; reach it
    /// through [`soft_pool`](Reclaimable::soft_pool).
    pub fn soft_retain(initial: Option<T>, restore: impl FnMut() -> T + 'static) -> Self {
        Self::with_policy(RetainPolicy::SoftRetain, initial, restore)
    }

    /// Soft-retaining handle pinning into a shared pool.
    pub fn soft_retain_in(
        pool: &SoftPool<T>,
        initial: Option<T>,
        restore: impl FnMut() -> T + 'static,
    ) -> Self {
        Self::from_parts(
            RetainPolicy::SoftRetain,
            initial,
            Some(pool.clone()),
            Box::new(infallible(restore)),
        )
    }

    pub fn builder() -> ReclaimableBuilder<T> {
        ReclaimableBuilder::new()
    }

    /// Get the value, salvaging or restoring it if released.
    pub fn get(&mut self) -> Rc<T> {
        into_ok(self.try_get())
    }
}

impl<T: 'static, E> Reclaimable<T, E> {
    /// Create a handle whose restore function may fail.
    pub fn fallible(
        policy: RetainPolicy,
        initial: Option<T>,
        restore: impl FnMut() -> Result<T, E> + 'static,
    ) -> Self {
        Self::from_parts(policy, initial, None, Box::new(restore))
    }

    fn from_parts(
        policy: RetainPolicy,
        initial: Option<T>,
        pool: Option<SoftPool<T>>,
        restore: RestoreFn<T, E>,
    ) -> Self {
        Self {
            state: Retention::new(policy, initial, pool),
            restore,
            on_reload: None,
            on_unload: None,
        }
    }

    /// Get the value, salvaging or restoring it if released.
    ///
    /// `on_reload` fires whenever the value had to be brought back. A
    /// restore error is returned unchanged and the handle stays released.
    pub fn try_get(&mut self) -> Result<Rc<T>, E> {
        let (value, source) = self.state.acquire(&mut self.restore)?;
        if source != Source::Held {
            if let Some(hook) = self.on_reload.as_mut() {
                hook(&*value);
            }
        }
        Ok(value)
    }

    /// Release the value under the handle's policy. No-op when released.
    ///
    /// `on_unload` fires while the value is still present; if it panics the
    /// handle keeps the value.
    pub fn release(&mut self) {
        if let Some(value) = self.state.present().cloned() {
            if let Some(hook) = self.on_unload.as_mut() {
                hook(&*value);
            }
        }
        self.state.release();
    }

    #[inline]
    pub fn is_present(&self) -> bool {
        self.state.present().is_some()
    }

    /// Run `f` with the value only if it is present. Never salvages or restores.
    pub fn if_present(&self, f: impl FnOnce(&T)) {
        if let Some(value) = self.state.present() {
            f(value);
        }
    }

    /// The present value, if any.
    #[inline]
    pub fn peek(&self) -> Option<&Rc<T>> {
        self.state.present()
    }

    /// Returns true if released and the next get would salvage.
    pub fn is_salvageable(&self) -> bool {
        self.state.is_salvageable()
    }

    #[inline]
    pub fn policy(&self) -> RetainPolicy {
        self.state.policy()
    }

    #[inline]
    pub fn stats(&self) -> LifecycleStats {
        self.state.stats()
    }

    /// The pool soft-retained values are pinned into, once there is one.
    pub fn soft_pool(&self) -> Option<&SoftPool<T>> {
        self.state.pool()
    }

    /// Set the hook fired when a released value is salvaged or restored.
    pub fn set_on_reload(&mut self, hook: impl FnMut(&T) + 'static) {
        self.on_reload = Some(Box::new(hook));
    }

    /// Set the hook fired with the value being released.
    pub fn set_on_unload(&mut self, hook: impl FnMut(&T) + 'static) {
        self.on_unload = Some(Box::new(hook));
    }
}

impl<T: fmt::Debug + 'static, E> fmt::Debug for Reclaimable<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reclaimable")
            .field("policy", &self.policy())
            .field("value", &self.peek())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Step-by-step construction of a [`Reclaimable`].
///
/// ```
/// use deferrable::{Reclaimable, RetainPolicy};
///
/// let mut handle = Reclaimable::builder()
///     .policy(RetainPolicy::SoftRetain)
///     .restore(|| String::from("atlas"))
///     .build()
///     .unwrap();
/// assert_eq!(handle.get().as_str(), "atlas");
/// ```
pub struct ReclaimableBuilder<T: 'static, E = Infallible> {
    policy: RetainPolicy,
    initial: Option<T>,
    pool: Option<SoftPool<T>>,
    restore: Option<RestoreFn<T, E>>,
    on_reload: Option<Hook<T>>,
    on_unload: Option<Hook<T>>,
}

impl<T: 'static> ReclaimableBuilder<T> {
    pub fn restore(mut self, restore: impl FnMut() -> T + 'static) -> Self {
        self.restore = Some(Box::new(infallible(restore)));
        self
    }
}

impl<T: 'static, E> ReclaimableBuilder<T, E> {
    pub fn new() -> Self {
        Self {
            policy: RetainPolicy::default(),
            initial: None,
            pool: None,
            restore: None,
            on_reload: None,
            on_unload: None,
        }
    }

    pub fn policy(mut self, policy: RetainPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Start present with `value` instead of constructing lazily.
    pub fn initial(mut self, value: T) -> Self {
        self.initial = Some(value);
        self
    }

    /// Pool used by `SoftRetain`; ignored by the other policies.
    pub fn pool(mut self, pool: &SoftPool<T>) -> Self {
        self.pool = Some(pool.clone());
        self
    }

    pub fn try_restore(mut self, restore: impl FnMut() -> Result<T, E> + 'static) -> Self {
        self.restore = Some(Box::new(restore));
        self
    }

    pub fn on_reload(mut self, hook: impl FnMut(&T) + 'static) -> Self {
        self.on_reload = Some(Box::new(hook));
        self
    }

    pub fn on_unload(mut self, hook: impl FnMut(&T) + 'static) -> Self {
        self.on_unload = Some(Box::new(hook));
        self
    }

    /// Fails with [`BuildError::MissingRestore`] if no restore function was set.
    pub fn build(self) -> Result<Reclaimable<T, E>, BuildError> {
        let restore = self.restore.ok_or(BuildError::MissingRestore)?;
        let mut handle = Reclaimable::from_parts(self.policy, self.initial, self.pool, restore);
        handle.on_reload = self.on_reload;
        handle.on_unload = self.on_unload;
        Ok(handle)
    }
}

impl<T: 'static, E> Default for ReclaimableBuilder<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    fn counted(calls: &Rc<Cell<u32>>) -> impl FnMut() -> String + 'static {
        let calls = Rc::clone(calls);
        move || {
            calls.set(calls.get() + 1);
            format!("build-{}", calls.get())
        }
    }

    #[test]
    fn test_lazy_until_first_get() {
        let calls = Rc::new(Cell::new(0));
        let mut handle = Reclaimable::no_retain(None, counted(&calls));

        assert!(!handle.is_present());
        assert_eq!(calls.get(), 0);
        assert_eq!(handle.get().as_str(), "build-1");
        assert!(handle.is_present());
    }

    #[test]
    fn test_initial_value_skips_restore() {
        let calls = Rc::new(Cell::new(0));
        let mut handle = Reclaimable::weak_retain(Some(String::from("seed")), counted(&calls));

        assert!(handle.is_present());
        assert_eq!(handle.get().as_str(), "seed");
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_no_retain_rebuilds_distinct_value() {
        let calls = Rc::new(Cell::new(0));
        let mut handle = Reclaimable::no_retain(None, counted(&calls));
        let first = handle.get();

        handle.release();
        let second = handle.get();

        assert!(!Rc::ptr_eq(&first, &second));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_hooks_fire_on_reload_and_unload() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut handle = Reclaimable::no_retain(None, || 5);
        let reload_log = Rc::clone(&log);
        let unload_log = Rc::clone(&log);
        handle.set_on_reload(move |v| reload_log.borrow_mut().push(format!("reload {v}")));
        handle.set_on_unload(move |v| unload_log.borrow_mut().push(format!("unload {v}")));

        handle.get();
        handle.get();
        handle.release();
        handle.release();

        assert_eq!(*log.borrow(), vec!["reload 5", "unload 5"]);
    }

    #[test]
    fn test_if_present_never_constructs() {
        let calls = Rc::new(Cell::new(0));
        let mut handle = Reclaimable::soft_retain(None, counted(&calls));
        let seen = Cell::new(false);

        handle.if_present(|_| seen.set(true));
        assert!(!seen.get());
        assert_eq!(calls.get(), 0);

        handle.get();
        handle.if_present(|v| seen.set(v == "build-1"));
        assert!(seen.get());
    }

    #[test]
    fn test_soft_retain_private_pool() {
        let calls = Rc::new(Cell::new(0));
        let mut handle = Reclaimable::soft_retain(None, counted(&calls));
        let first = Rc::downgrade(&handle.get());
        assert!(handle.soft_pool().is_none());

        handle.release();
        assert!(handle.is_salvageable());
        let pool = handle.soft_pool().cloned().unwrap();
        assert_eq!(pool.len(), 1);

        pool.relieve();
        assert!(first.upgrade().is_none());
        assert!(!handle.is_salvageable());
        assert_eq!(handle.get().as_str(), "build-2");
    }

    #[test]
    fn test_builder_requires_restore() {
        let built = ReclaimableBuilder::<i32>::new()
            .policy(RetainPolicy::WeakRetain)
            .build();
        assert_eq!(built.map(|_| ()).unwrap_err(), BuildError::MissingRestore);
    }

    #[test]
    fn test_builder_wires_everything() {
        let pool = SoftPool::new();
        let unloaded = Rc::new(Cell::new(0));
        let sink = Rc::clone(&unloaded);
        let mut handle = Reclaimable::builder()
            .policy(RetainPolicy::SoftRetain)
            .initial(1)
            .pool(&pool)
            .restore(|| 2)
            .on_unload(move |v| sink.set(*v))
            .build()
            .unwrap();

        handle.release();
        assert_eq!(unloaded.get(), 1);
        assert_eq!(pool.len(), 1);
        assert_eq!(*handle.get(), 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_fallible_restore_retries() {
        let attempts = Rc::new(Cell::new(0));
        let counter = Rc::clone(&attempts);
        let mut handle: Reclaimable<u32, String> =
            Reclaimable::fallible(RetainPolicy::NoRetain, None, move || {
                counter.set(counter.get() + 1);
                match counter.get() {
                    1 => Err(String::from("disk not ready")),
                    n => Ok(n),
                }
            });

        assert_eq!(handle.try_get().map(|v| *v), Err(String::from("disk not ready")));
        assert!(!handle.is_present());
        assert_eq!(handle.try_get().map(|v| *v), Ok(2));
        assert_eq!(handle.stats().restores, 1);
    }

    #[test]
    fn test_debug_shows_state() {
        let mut handle = Reclaimable::weak_retain(None, || 3);
        handle.get();
        let text = format!("{handle:?}");
        assert!(text.contains("WeakRetain"));
        assert!(text.contains('3'));
    }
}
