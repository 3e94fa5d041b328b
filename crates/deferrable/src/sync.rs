//! Thread-safe reclaimable handles.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::deferred::{infallible, into_ok};
use crate::policy::ThreadSafe;
use crate::retention::{LifecycleStats, RetainPolicy, Retention, Source};
use crate::soft::SoftPool;

type RestoreFn<T, E> = Box<dyn FnMut() -> Result<T, E> + Send>;
type Hook<T> = Box<dyn FnMut(&T) + Send>;

struct Inner<T: 'static, E> {
    state: Retention<T, ThreadSafe>,
    restore: RestoreFn<T, E>,
    on_reload: Option<Hook<T>>,
    on_unload: Option<Hook<T>>,
}

/// Thread-safe [`Reclaimable`](crate::Reclaimable), sharing its value as `Arc<T>`.
///
/// Every operation takes the handle's lock for its whole duration:
///
/// - Racing `get` calls on a released handle salvage or restore once, and
///   all of them observe the same `Arc`.
/// - A `release` racing a `get` happens entirely before or after it.
///
/// The restore function and hooks run under the lock and must not call
/// back into the same handle.
pub struct SyncReclaimable<T: 'static, E = Infallible> {
    inner: Mutex<Inner<T, E>>,
}

impl<T: 'static> SyncReclaimable<T> {
    pub fn with_policy(
        policy: RetainPolicy,
        initial: Option<T>,
        restore: impl FnMut() -> T + Send + 'static,
    ) -> Self {
        Self::fallible(policy, initial, infallible(restore))
    }

    pub fn no_retain(initial: Option<T>, restore: impl FnMut() -> T + Send + 'static) -> Self {
        Self::with_policy(RetainPolicy::NoRetain, initial, restore)
    }

    pub fn weak_retain(initial: Option<T>, restore: impl FnMut() -> T + Send + 'static) -> Self {
        Self::with_policy(RetainPolicy::WeakRetain, initial, restore)
    }

    pub fn soft_retain(initial: Option<T>, restore: impl FnMut() -> T + Send + 'static) -> Self {
        Self::with_policy(RetainPolicy::SoftRetain, initial, restore)
    }

    /// Soft-retaining handle pinning into a shared pool.
    pub fn soft_retain_in(
        pool: &SoftPool<T, ThreadSafe>,
        initial: Option<T>,
        restore: impl FnMut() -> T + Send + 'static,
    ) -> Self {
        Self::from_parts(
            RetainPolicy::SoftRetain,
            initial,
            Some(pool.clone()),
            Box::new(infallible(restore)),
        )
    }

    pub fn get(&self) -> Arc<T> {
        into_ok(self.try_get())
    }
}

impl<T: 'static, E> SyncReclaimable<T, E> {
    pub fn fallible(
        policy: RetainPolicy,
        initial: Option<T>,
        restore: impl FnMut() -> Result<T, E> + Send + 'static,
    ) -> Self {
        Self::from_parts(policy, initial, None, Box::new(restore))
    }

    fn from_parts(
        policy: RetainPolicy,
        initial: Option<T>,
        pool: Option<SoftPool<T, ThreadSafe>>,
        restore: RestoreFn<T, E>,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: Retention::new(policy, initial, pool),
                restore,
                on_reload: None,
                on_unload: None,
            }),
        }
    }

    pub fn try_get(&self) -> Result<Arc<T>, E> {
        let mut guard = self.inner.lock();
        let Inner {
            state,
            restore,
            on_reload,
            ..
        } = &mut *guard;

        let (value, source) = state.acquire(restore)?;
        if source != Source::Held {
            if let Some(hook) = on_reload.as_mut() {
                hook(&*value);
            }
        }
        Ok(value)
    }

    pub fn release(&self) {
        let mut guard = self.inner.lock();
        let Inner {
            state, on_unload, ..
        } = &mut *guard;

        if let Some(value) = state.present().cloned() {
            if let Some(hook) = on_unload.as_mut() {
                hook(&*value);
            }
        }
        state.release();
    }

    pub fn is_present(&self) -> bool {
        self.inner.lock().state.present().is_some()
    }

    /// Run `f` with the value only if it is present. Never salvages or restores.
    ///
    /// `f` runs after the lock is released.
    pub fn if_present(&self, f: impl FnOnce(&T)) {
        if let Some(value) = self.peek() {
            f(&*value);
        }
    }

    pub fn peek(&self) -> Option<Arc<T>> {
        self.inner.lock().state.present().cloned()
    }

    pub fn is_salvageable(&self) -> bool {
        self.inner.lock().state.is_salvageable()
    }

    pub fn policy(&self) -> RetainPolicy {
        self.inner.lock().state.policy()
    }

    pub fn stats(&self) -> LifecycleStats {
        self.inner.lock().state.stats()
    }

    pub fn soft_pool(&self) -> Option<SoftPool<T, ThreadSafe>> {
        self.inner.lock().state.pool().cloned()
    }

    pub fn set_on_reload(&self, hook: impl FnMut(&T) + Send + 'static) {
        self.inner.lock().on_reload = Some(Box::new(hook));
    }

    pub fn set_on_unload(&self, hook: impl FnMut(&T) + Send + 'static) {
        self.inner.lock().on_unload = Some(Box::new(hook));
    }
}

impl<T: fmt::Debug + 'static, E> fmt::Debug for SyncReclaimable<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.inner.lock();
        f.debug_struct("SyncReclaimable")
            .field("policy", &guard.state.policy())
            .field("value", &guard.state.present())
            .field("stats", &guard.state.stats())
            .finish_non_exhaustive()
    }
}
