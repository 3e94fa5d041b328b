//! Retention policies and the present/released state machine.
//!
//! A handle is either *present* (it holds the value directly) or
//! *released*. On release the policy decides what survives:
//!
//! | Policy       | On release                     | Next get, unresolved | Next get, resolved |
//! |--------------|--------------------------------|----------------------|--------------------|
//! | `NoRetain`   | discard                        | restore              | n/a                |
//! | `WeakRetain` | keep a weak observation        | restore              | salvage            |
//! | `SoftRetain` | pin into a [`SoftPool`]        | restore              | salvage            |
//!
//! [`Retention`] is shared by [`Reclaimable`](crate::Reclaimable) and
//! [`SyncReclaimable`](crate::SyncReclaimable); it owns no closures, so each
//! handle flavour supplies its restore function and fires its own hooks.

use crate::policy::SharingPolicy;
use crate::soft::{SoftPool, SoftRef};

/// What a handle keeps of its value after `release`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum RetainPolicy {
    /// Drop the value immediately.
    #[default]
    NoRetain,
    /// Keep a non-owning observation, valid while someone else holds the value.
    WeakRetain,
    /// Keep an owning pin the host may reclaim under memory pressure.
    SoftRetain,
}

impl RetainPolicy {
    /// Returns true if released values may be salvaged.
    #[inline]
    pub const fn retains(self) -> bool {
        !matches!(self, RetainPolicy::NoRetain)
    }
}

/// Counters describing how a handle has materialized its value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleStats {
    /// Times the restore function ran to completion.
    pub restores: u64,
    /// Times a retained reference was promoted back to present.
    pub salvages: u64,
    /// Times a present value was released.
    pub releases: u64,
}

/// How `acquire` produced its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Source {
    Held,
    Salvaged,
    Restored,
}

/// Back-reference captured on release.
enum Retained<T: 'static, P: SharingPolicy> {
    Weak(P::WeakPtr<T>),
    Soft(SoftRef<T, P>),
}

impl<T: 'static, P: SharingPolicy> Retained<T, P> {
    /// Resolve and consume the reference. A soft pin is given up either way.
    fn resolve(self) -> Option<P::Ptr<T>> {
        match self {
            Retained::Weak(weak) => P::upgrade::<T>(&weak),
            Retained::Soft(soft) => soft.take(),
        }
    }

    fn is_alive(&self) -> bool {
        match self {
            Retained::Weak(weak) => P::upgrade::<T>(weak).is_some(),
            Retained::Soft(soft) => soft.try_get().is_some(),
        }
    }
}

/// The present/released state of one handle.
pub(crate) struct Retention<T: 'static, P: SharingPolicy> {
    direct: Option<P::Ptr<T>>,
    retained: Option<Retained<T, P>>,
    policy: RetainPolicy,
    pool: Option<SoftPool<T, P>>,
    stats: LifecycleStats,
}

impl<T: 'static, P: SharingPolicy> Retention<T, P> {
    pub(crate) fn new(policy: RetainPolicy, initial: Option<T>, pool: Option<SoftPool<T, P>>) -> Self {
        if initial.is_none() {
            tracing::debug!(%policy, "no initial value, handle will construct lazily");
        }
        Self {
            direct: initial.map(P::share),
            retained: None,
            policy,
            pool,
            stats: LifecycleStats::default(),
        }
    }

    /// Return the present value, salvaging or restoring it if needed.
    ///
    /// `restore` runs only when nothing present or retained resolves. If it
    /// fails the handle stays released and the error is returned as is.
    pub(crate) fn acquire<E>(
        &mut self,
        restore: impl FnOnce() -> Result<T, E>,
    ) -> Result<(P::Ptr<T>, Source), E> {
        if let Some(value) = &self.direct {
            return Ok((value.clone(), Source::Held));
        }

        debug_assert!(self.policy.retains() || self.retained.is_none());
        let salvaged = self.retained.take().and_then(Retained::resolve);

        let (value, source) = match salvaged {
            Some(value) => {
                tracing::trace!(policy = %self.policy, "salvaging retained value");
                self.stats.salvages += 1;
                (value, Source::Salvaged)
            }
            None => {
                tracing::trace!(policy = %self.policy, "restoring value");
                let value = P::share(restore()?);
                self.stats.restores += 1;
                (value, Source::Restored)
            }
        };

        self.direct = Some(value.clone());
        Ok((value, source))
    }

    /// Give up the present value under the retention policy.
    ///
    /// Returns the released value, or `None` if nothing was present.
    pub(crate) fn release(&mut self) -> Option<P::Ptr<T>> {
        let Some(value) = self.direct.take() else {
            tracing::trace!("release called when no value is held");
            return None;
        };

        match self.policy {
            RetainPolicy::NoRetain => {}
            RetainPolicy::WeakRetain => {
                self.retained = Some(Retained::Weak(P::downgrade::<T>(&value)));
            }
            RetainPolicy::SoftRetain => {
                let pool = self.pool.get_or_insert_with(SoftPool::new);
                self.retained = Some(Retained::Soft(pool.pin(&value)));
            }
        }

        self.stats.releases += 1;
        Some(value)
    }

    #[inline]
    pub(crate) fn present(&self) -> Option<&P::Ptr<T>> {
        self.direct.as_ref()
    }

    /// Released, and the retained reference still resolves.
    pub(crate) fn is_salvageable(&self) -> bool {
        self.direct.is_none() && self.retained.as_ref().is_some_and(Retained::is_alive)
    }

    #[inline]
    pub(crate) fn policy(&self) -> RetainPolicy {
        self.policy
    }

    #[inline]
    pub(crate) fn stats(&self) -> LifecycleStats {
        self.stats
    }

    #[inline]
    pub(crate) fn pool(&self) -> Option<&SoftPool<T, P>> {
        self.pool.as_ref()
    }
}
