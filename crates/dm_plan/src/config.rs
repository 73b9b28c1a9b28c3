use alloc::boxed::Box;
use core::fmt;
use core::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

// -----------------------------------------------------------------------------
// InvalidationPolicy

/// When a cached plan is considered stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidationPolicy {
    /// Plans live until flushed.
    #[default]
    Manual,
    /// Plans are rebuilt when the type's source file has a new
    /// modification time.
    Mtime,
    /// Plans are rebuilt when the type's source file changes content, or
    /// when the description itself changes for types without a source.
    Hash,
}

impl InvalidationPolicy {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Mtime => "mtime",
            Self::Hash => "hash",
        }
    }
}

/// An unrecognized policy name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown invalidation policy `{0}`, expected `manual`, `mtime` or `hash`")]
pub struct UnknownPolicy(Box<str>);

impl FromStr for InvalidationPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "mtime" => Ok(Self::Mtime),
            "hash" => Ok(Self::Hash),
            _ => Err(UnknownPolicy(s.into())),
        }
    }
}

impl fmt::Display for InvalidationPolicy {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// -----------------------------------------------------------------------------
// CacheConfig

/// Settings of a [`PlanCache`](crate::PlanCache).
///
/// # Examples
///
/// ```
/// use dm_plan::{CacheConfig, InvalidationPolicy};
///
/// let config: CacheConfig = serde_json::from_str(r#"{ "policy": "mtime" }"#).unwrap();
/// assert_eq!(config.policy, InvalidationPolicy::Mtime);
///
/// let config: CacheConfig = serde_json::from_str("{}").unwrap();
/// assert_eq!(config, CacheConfig::default());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub policy: InvalidationPolicy,
}

impl CacheConfig {
    #[inline]
    pub const fn new(policy: InvalidationPolicy) -> Self {
        Self { policy }
    }
}
