//! Soft retention backed by a host-reclaimable pin pool.
//!
//! Rust has no garbage collector to clear soft references under memory
//! pressure, so the "soft" part lives in a [`SoftPool`]: the pool holds a
//! strong pin for every soft-retained value, and the host decides when to
//! let pins go. A [`SoftRef`] observes its value weakly and resolves for as
//! long as the pin, or any other strong holder, keeps the value alive.
//!
//! Invalidation is silent. A handle only learns that its soft reference is
//! gone the next time it tries to resolve it.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use deferrable::SoftPool;
//!
//! let pool: SoftPool<String> = SoftPool::new();
//! let value = Rc::new(String::from("texture"));
//! let soft = pool.pin(&value);
//! drop(value);
//!
//! // Still alive: the pool pins it.
//! assert!(soft.try_get().is_some());
//!
//! // Host signals memory pressure.
//! pool.relieve();
//! assert!(soft.try_get().is_none());
//! ```

use std::fmt;
use std::num::NonZeroUsize;

use lru::LruCache;

use crate::config::SoftPoolConfig;
use crate::error::ConfigError;
use crate::policy::{SharingPolicy, SingleThreaded, ThreadSafe};

/// Pool bookkeeping, guarded by the policy's lock.
struct PoolState<T: 'static, P: SharingPolicy> {
    pins: LruCache<u64, P::Ptr<T>>,
    capacity: Option<NonZeroUsize>,
    next_key: u64,
    evictions: u64,
    reclaimed: u64,
}

/// Snapshot of a pool's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Values currently pinned.
    pub pinned: usize,
    /// Configured bound, `None` when unbounded.
    pub capacity: Option<NonZeroUsize>,
    /// Pins dropped because the pool was full.
    pub evictions: u64,
    /// Pins dropped by `relieve` / `relieve_to`.
    pub reclaimed: u64,
}

/// A shared pool of strong pins that the host can reclaim at any time.
///
/// Cloning a pool yields another handle to the same pins, so one pool can
/// back many soft-retaining handles and be relieved from a single place.
pub struct SoftPool<T: 'static, P: SharingPolicy = SingleThreaded> {
    state: P::Ptr<P::Lock<PoolState<T, P>>>,
}

/// Thread-safe soft pool (type alias for convenience).
pub type SyncSoftPool<T> = SoftPool<T, ThreadSafe>;

impl<T: 'static, P: SharingPolicy> SoftPool<T, P> {
    /// Create an unbounded pool.
    pub fn new() -> Self {
        Self::from_config(&SoftPoolConfig::unbounded())
    }

    /// Create a pool holding at most `capacity` pins.
    pub fn bounded(capacity: usize) -> Result<Self, ConfigError> {
        SoftPoolConfig::bounded(capacity).map(|cfg| Self::from_config(&cfg))
    }

    /// Create a pool from host configuration.
    pub fn from_config(config: &SoftPoolConfig) -> Self {
        let pins = match config.capacity {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };
        Self {
            state: P::share(P::new_lock(PoolState {
                pins,
                capacity: config.capacity,
                next_key: 0,
                evictions: 0,
                reclaimed: 0,
            })),
        }
    }

    /// Pin `value` and return a soft reference to it.
    ///
    /// If the pool is bounded and full, the least recently pinned value is
    /// unpinned first.
    pub fn pin(&self, value: &P::Ptr<T>) -> SoftRef<T, P> {
        let weak = P::downgrade::<T>(value);
        let (key, evicted) = self.with_state(|state| {
            let key = state.next_key;
            state.next_key += 1;
            let evicted = state.pins.push(key, value.clone());
            if evicted.is_some() {
                state.evictions += 1;
            }
            (key, evicted)
        });
        if let Some((evicted_key, _)) = &evicted {
            tracing::trace!(key = *evicted_key, "soft pool full, evicted oldest pin");
        }
        // Evicted value drops here, outside the lock.
        drop(evicted);

        SoftRef {
            key,
            weak,
            pool: self.clone(),
        }
    }

    /// Drop every pin. This is the host's memory-pressure signal.
    ///
    /// Returns the number of pins dropped.
    pub fn relieve(&self) -> usize {
        self.relieve_to(0)
    }

    /// Drop the oldest pins until at most `keep` remain.
    ///
    /// Returns the number of pins dropped.
    pub fn relieve_to(&self, keep: usize) -> usize {
        let drained = self.with_state(|state| {
            let mut drained = Vec::new();
            while state.pins.len() > keep {
                match state.pins.pop_lru() {
                    Some((_, value)) => drained.push(value),
                    None => break,
                }
            }
            state.reclaimed += drained.len() as u64;
            drained
        });
        let count = drained.len();
        if count > 0 {
            tracing::debug!(dropped = count, keep, "soft pool relieved");
        }
        count
    }

    /// Number of values currently pinned.
    pub fn len(&self) -> usize {
        self.with_state(|state| state.pins.len())
    }

    /// Returns true if nothing is pinned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured bound, `None` when unbounded.
    pub fn capacity(&self) -> Option<NonZeroUsize> {
        self.with_state(|state| state.capacity)
    }

    pub fn stats(&self) -> PoolStats {
        self.with_state(|state| PoolStats {
            pinned: state.pins.len(),
            capacity: state.capacity,
            evictions: state.evictions,
            reclaimed: state.reclaimed,
        })
    }

    fn is_pinned(&self, key: u64) -> bool {
        self.with_state(|state| state.pins.contains(&key))
    }

    fn unpin(&self, key: u64) -> Option<P::Ptr<T>> {
        self.with_state(|state| state.pins.pop(&key))
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut PoolState<T, P>) -> R) -> R {
        P::with_lock::<PoolState<T, P>, R>(&*self.state, f)
    }
}

impl<T: 'static, P: SharingPolicy> Clone for SoftPool<T, P> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T: 'static, P: SharingPolicy> Default for SoftPool<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static, P: SharingPolicy> fmt::Debug for SoftPool<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("SoftPool")
            .field("pinned", &stats.pinned)
            .field("capacity", &stats.capacity)
            .finish()
    }
}

/// A weak observation of a value pinned in a [`SoftPool`].
///
/// Dropping the reference removes its pin.
pub struct SoftRef<T: 'static, P: SharingPolicy = SingleThreaded> {
    key: u64,
    weak: P::WeakPtr<T>,
    pool: SoftPool<T, P>,
}

impl<T: 'static, P: SharingPolicy> SoftRef<T, P> {
    /// Resolve the value without giving up the pin.
    pub fn try_get(&self) -> Option<P::Ptr<T>> {
        P::upgrade::<T>(&self.weak)
    }

    /// Resolve the value and give up the pin. The caller becomes responsible
    /// for keeping it alive.
    pub fn take(self) -> Option<P::Ptr<T>> {
        self.try_get()
    }

    /// Returns true while the pool still holds this reference's pin.
    pub fn is_pinned(&self) -> bool {
        self.pool.is_pinned(self.key)
    }

    /// The pool this reference was pinned into.
    pub fn pool(&self) -> &SoftPool<T, P> {
        &self.pool
    }
}

impl<T: 'static, P: SharingPolicy> Drop for SoftRef<T, P> {
    fn drop(&mut self) {
        let pin = self.pool.unpin(self.key);
        drop(pin);
    }
}

impl<T: 'static, P: SharingPolicy> fmt::Debug for SoftRef<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftRef").field("key", &self.key).finish()
    }
}
