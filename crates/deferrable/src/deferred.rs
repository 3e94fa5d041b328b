//! Construct-once deferred values.
//!
//! A [`Deferred`] runs its constructor on first access and keeps the result.
//! [`Deferred::restore`] forces a rebuild. The generic type covers what
//! would otherwise be per-primitive variants: `Deferred<bool>`,
//! `Deferred<i64>` and `Deferred<f64>` behave exactly like any other `T`.
//!
//! # Example
//!
//! ```
//! use deferrable::Deferred;
//!
//! let mut table = Deferred::new(|| (0..4).map(|i| i * i).collect::<Vec<u32>>());
//! assert!(!table.is_initialized());
//! assert_eq!(table.get(), &[0, 1, 4, 9]);
//! assert!(table.is_initialized());
//! ```

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

type Constructor<T, E> = Box<dyn FnMut() -> Result<T, E>>;
type Hook<T> = Box<dyn FnMut(&T)>;

/// Lift an infallible constructor into the fallible shape handles store.
pub(crate) fn infallible<T>(mut f: impl FnMut() -> T) -> impl FnMut() -> Result<T, Infallible> {
    move || Ok(f())
}

/// Unwrap a result whose error can never exist.
#[inline]
pub(crate) fn into_ok<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

/// A lazily constructed value with an explicit rebuild.
///
/// The instance is `Some` exactly when the value has been initialized, so a
/// partially constructed value is never observable. A failing constructor
/// leaves the previous state untouched.
pub struct Deferred<T, E = Infallible> {
    instance: Option<T>,
    constructor: Constructor<T, E>,
    on_initialize: Option<Hook<T>>,
}

impl<T: 'static> Deferred<T> {
    /// Create a deferred value from an infallible constructor.
    pub fn new(constructor: impl FnMut() -> T + 'static) -> Self {
        Self::fallible(infallible(constructor))
    }

    /// Get the value, constructing it on first access.
    pub fn get(&mut self) -> &T {
        into_ok(self.try_get())
    }

    /// Rebuild the value unconditionally.
    pub fn restore(&mut self) -> &T {
        into_ok(self.try_restore())
    }
}

impl<T, E> Deferred<T, E> {
    /// Create a deferred value whose constructor may fail.
    pub fn fallible(constructor: impl FnMut() -> Result<T, E> + 'static) -> Self {
        Self {
            instance: None,
            constructor: Box::new(constructor),
            on_initialize: None,
        }
    }

    /// Get the value, constructing it on first access.
    pub fn try_get(&mut self) -> Result<&T, E> {
        match self.instance {
            Some(ref value) => Ok(value),
            None => self.try_restore(),
        }
    }

    /// Run the constructor, replace the instance and fire `on_initialize`.
    ///
    /// Legal on an initialized value, where it acts as a forced refresh.
    pub fn try_restore(&mut self) -> Result<&T, E> {
        if self.instance.is_some() {
            tracing::warn!("restore called when value has already been initialized");
        }

        let value = (self.constructor)()?;
        let value = self.instance.insert(value);
        if let Some(hook) = self.on_initialize.as_mut() {
            hook(&*value);
        }
        Ok(&*value)
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.instance.is_some()
    }

    /// Run `f` with the value if it has been initialized. Never constructs.
    pub fn if_initialized(&self, f: impl FnOnce(&T)) {
        if let Some(value) = &self.instance {
            f(value);
        }
    }

    /// Set the hook fired after every construction, replacing any previous one.
    pub fn set_on_initialize(&mut self, hook: impl FnMut(&T) + 'static) {
        self.on_initialize = Some(Box::new(hook));
    }

    /// Consume the wrapper, returning the value if it was initialized.
    pub fn into_inner(self) -> Option<T> {
        self.instance
    }
}

impl<T: fmt::Debug, E> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("instance", &self.instance)
            .finish_non_exhaustive()
    }
}

type SyncConstructor<T, E> = Box<dyn FnMut() -> Result<T, E> + Send>;
type SyncHook<T> = Box<dyn FnMut(&T) + Send>;

struct SyncDeferredState<T, E> {
    instance: Option<Arc<T>>,
    constructor: SyncConstructor<T, E>,
    on_initialize: Option<SyncHook<T>>,
}

impl<T, E> SyncDeferredState<T, E> {
    fn restore(&mut self) -> Result<Arc<T>, E> {
        if self.instance.is_some() {
            tracing::warn!("restore called when value has already been initialized");
        }

        let value = Arc::new((self.constructor)()?);
        self.instance = Some(Arc::clone(&value));
        if let Some(hook) = self.on_initialize.as_mut() {
            hook(value.as_ref());
        }
        Ok(value)
    }
}

/// Thread-safe [`Deferred`], sharing its value as `Arc<T>`.
///
/// The lock is held while the constructor runs, so racing first accesses
/// construct once and all observe the same `Arc`. The constructor and hook
/// must not call back into the same value.
pub struct SyncDeferred<T, E = Infallible> {
    state: Mutex<SyncDeferredState<T, E>>,
}

impl<T: 'static> SyncDeferred<T> {
    pub fn new(constructor: impl FnMut() -> T + Send + 'static) -> Self {
        Self::fallible(infallible(constructor))
    }

    pub fn get(&self) -> Arc<T> {
        into_ok(self.try_get())
    }

    pub fn restore(&self) -> Arc<T> {
        into_ok(self.try_restore())
    }
}

impl<T, E> SyncDeferred<T, E> {
    pub fn fallible(constructor: impl FnMut() -> Result<T, E> + Send + 'static) -> Self {
        Self {
            state: Mutex::new(SyncDeferredState {
                instance: None,
                constructor: Box::new(constructor),
                on_initialize: None,
            }),
        }
    }

    pub fn try_get(&self) -> Result<Arc<T>, E> {
        let mut state = self.state.lock();
        if let Some(value) = &state.instance {
            return Ok(Arc::clone(value));
        }
        state.restore()
    }

    pub fn try_restore(&self) -> Result<Arc<T>, E> {
        self.state.lock().restore()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().instance.is_some()
    }

    /// Run `f` with the value if it has been initialized. Never constructs.
    ///
    /// `f` runs after the lock is released.
    pub fn if_initialized(&self, f: impl FnOnce(&T)) {
        let value = self.state.lock().instance.clone();
        if let Some(value) = value {
            f(value.as_ref());
        }
    }

    pub fn set_on_initialize(&self, hook: impl FnMut(&T) + Send + 'static) {
        self.state.lock().on_initialize = Some(Box::new(hook));
    }
}

impl<T: fmt::Debug, E> fmt::Debug for SyncDeferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncDeferred")
            .field("instance", &self.state.lock().instance)
            .finish_non_exhaustive()
    }
}
