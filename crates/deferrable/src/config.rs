//! Host-facing configuration for retention.

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::retention::RetainPolicy;

/// Settings for a [`SoftPool`](crate::SoftPool).
///
/// `capacity: None` keeps every pin until the host relieves the pool.
/// With a capacity, pinning into a full pool evicts the least recently
/// pinned value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct SoftPoolConfig {
    pub capacity: Option<NonZeroUsize>,
}

impl SoftPoolConfig {
    /// Unbounded pool.
    pub const fn unbounded() -> Self {
        Self { capacity: None }
    }

    /// Pool holding at most `capacity` pins.
    pub fn bounded(capacity: usize) -> Result<Self, ConfigError> {
        let capacity = NonZeroUsize::new(capacity).ok_or(ConfigError::ZeroCapacity)?;
        Ok(Self {
            capacity: Some(capacity),
        })
    }
}

impl FromStr for RetainPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "no-retain" | "no_retain" => Ok(RetainPolicy::NoRetain),
            "weak" | "weak-retain" | "weak_retain" => Ok(RetainPolicy::WeakRetain),
            "soft" | "soft-retain" | "soft_retain" => Ok(RetainPolicy::SoftRetain),
            _ => Err(ConfigError::UnknownPolicy(s.to_string())),
        }
    }
}

impl fmt::Display for RetainPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RetainPolicy::NoRetain => "no-retain",
            RetainPolicy::WeakRetain => "weak-retain",
            RetainPolicy::SoftRetain => "soft-retain",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_policy_aliases() {
        assert_eq!("none".parse(), Ok(RetainPolicy::NoRetain));
        assert_eq!("Weak".parse(), Ok(RetainPolicy::WeakRetain));
        assert_eq!(" soft-retain ".parse(), Ok(RetainPolicy::SoftRetain));
        assert_eq!("weak_retain".parse(), Ok(RetainPolicy::WeakRetain));
    }

    #[test]
    fn test_parse_policy_rejects_unknown() {
        assert_eq!(
            "strong".parse::<RetainPolicy>(),
            Err(ConfigError::UnknownPolicy("strong".to_string()))
        );
    }

    #[test]
    fn test_display_parses_back() {
        for policy in [
            RetainPolicy::NoRetain,
            RetainPolicy::WeakRetain,
            RetainPolicy::SoftRetain,
        ] {
            assert_eq!(policy.to_string().parse(), Ok(policy));
        }
    }

    #[test]
    fn test_bounded_rejects_zero() {
        assert_eq!(SoftPoolConfig::bounded(0), Err(ConfigError::ZeroCapacity));
        assert_eq!(
            SoftPoolConfig::bounded(4).unwrap().capacity.map(NonZeroUsize::get),
            Some(4)
        );
        assert_eq!(SoftPoolConfig::default(), SoftPoolConfig::unbounded());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_config_from_json() {
        let cfg: SoftPoolConfig = serde_json::from_str(r#"{"capacity": 8}"#).unwrap();
        assert_eq!(cfg, SoftPoolConfig::bounded(8).unwrap());

        let cfg: SoftPoolConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, SoftPoolConfig::unbounded());

        assert!(serde_json::from_str::<SoftPoolConfig>(r#"{"capacity": 0}"#).is_err());

        let policy: RetainPolicy = serde_json::from_str(r#""soft-retain""#).unwrap();
        assert_eq!(policy, RetainPolicy::SoftRetain);
    }
}
