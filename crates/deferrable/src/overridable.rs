//! A default value that can be temporarily overridden.

use std::borrow::Cow;
use std::fmt;

type Hook<T> = Box<dyn FnMut(&T)>;

/// A value that reads as its default until something replaces it.
///
/// ```
/// use deferrable::Overridable;
///
/// let mut gamma = Overridable::with_default(2.2f32);
/// gamma.set(1.8);
/// assert_eq!(*gamma.get(), 1.8);
/// gamma.revert();
/// assert!(gamma.is_default());
/// ```
pub struct Overridable<T> {
    default: Box<dyn Fn() -> T>,
    replaced: Option<T>,
    on_replace: Option<Hook<T>>,
}

impl<T> Overridable<T> {
    /// Default produced on demand by `default`.
    pub fn new(default: impl Fn() -> T + 'static) -> Self {
        Self {
            default: Box::new(default),
            replaced: None,
            on_replace: None,
        }
    }

    /// Default produced by cloning `value`.
    pub fn with_default(value: T) -> Self
    where
        T: Clone + 'static,
    {
        Self::new(move || value.clone())
    }

    /// The override if set, otherwise a fresh default.
    pub fn get(&self) -> Cow<'_, T>
    where
        T: Clone,
    {
        match &self.replaced {
            Some(value) => Cow::Borrowed(value),
            None => Cow::Owned((self.default)()),
        }
    }

    /// Replace the value. Fires `on_replace` with it unless it equals the
    /// current override.
    pub fn set(&mut self, value: T)
    where
        T: PartialEq,
    {
        if self.replaced.as_ref() != Some(&value) {
            if let Some(hook) = self.on_replace.as_mut() {
                hook(&value);
            }
        }
        self.replaced = Some(value);
    }

    /// Drop the override. Fires `on_replace` with the default if one was set.
    pub fn revert(&mut self) {
        if self.replaced.take().is_some() {
            if let Some(hook) = self.on_replace.as_mut() {
                hook(&(self.default)());
            }
        }
    }

    /// True if an override is set, even one equal to the default.
    #[inline]
    pub fn is_replaced(&self) -> bool {
        self.replaced.is_some()
    }

    /// True if no override is set or the override equals the default.
    pub fn is_default(&self) -> bool
    where
        T: PartialEq,
    {
        match &self.replaced {
            Some(value) => *value == (self.default)(),
            None => true,
        }
    }

    /// Run `f` with the override if one is set.
    pub fn if_replaced(&self, f: impl FnOnce(&T)) {
        if let Some(value) = &self.replaced {
            f(value);
        }
    }

    pub fn set_on_replace(&mut self, hook: impl FnMut(&T) + 'static) {
        self.on_replace = Some(Box::new(hook));
    }
}

impl<T: fmt::Debug> fmt::Debug for Overridable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overridable")
            .field("replaced", &self.replaced)
            .finish_non_exhaustive()
    }
}
