//! Error types for handle configuration and construction.
//!
//! Failures raised by a caller's restore function are never wrapped: they
//! surface verbatim as the handle's `E` parameter.

use thiserror::Error;

/// Errors for configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("soft pool capacity must be non-zero")]
    ZeroCapacity,

    #[error("unknown retain policy: {0:?} (expected none, weak or soft)")]
    UnknownPolicy(String),
}

/// Errors for building a handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("reclaimable handle requires a restore function")]
    MissingRestore,
}
