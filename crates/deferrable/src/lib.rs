//! # Deferrable
//!
//! Deferred construction and reclaimable handles for expensive values.
//!
//! ## Features
//!
//! - **Deferred values**: construct on first access, force a rebuild with `restore`
//! - **Reclaimable handles**: release a value and get it back later
//! - **Three retention policies**: drop on release, keep a weak observation, or
//!   pin into a host-reclaimable soft pool
//! - **Salvage before rebuild**: a still-reachable value is reused, never reconstructed
//! - **Generic thread-safety**: `Rc` handles or `Arc` + mutex handles via `SharingPolicy`
//! - **Fallible restore**: a restore error reaches the caller unchanged and the
//!   handle stays released, ready to retry
//!
//! ## Quick Start
//!
//! ```rust
//! use deferrable::{Reclaimable, SoftPool};
//!
//! let pool: SoftPool<Vec<u8>> = SoftPool::bounded(64).unwrap();
//! let mut texture = Reclaimable::soft_retain_in(&pool, None, || vec![0u8; 4096]);
//!
//! let pixels = texture.get(); // constructed here
//! drop(pixels);
//! texture.release(); // pinned in the pool
//! assert_eq!(texture.get().len(), 4096); // salvaged, not rebuilt
//!
//! texture.release();
//! pool.relieve(); // memory pressure: pins dropped
//! texture.get(); // rebuilt
//! assert_eq!(texture.stats().restores, 2);
//! ```

mod config;
mod deferred;
mod error;
mod overridable;
mod policy;
mod reclaimable;
mod retention;
mod select;
mod soft;
mod sync;

pub use config::SoftPoolConfig;
pub use deferred::{Deferred, SyncDeferred};
pub use error::{BuildError, ConfigError};
pub use overridable::Overridable;
pub use policy::{SharingPolicy, SingleThreaded, ThreadSafe};
pub use reclaimable::{Reclaimable, ReclaimableBuilder};
pub use retention::{LifecycleStats, RetainPolicy};
pub use select::Select;
pub use soft::{PoolStats, SoftPool, SoftRef, SyncSoftPool};
pub use sync::SyncReclaimable;
