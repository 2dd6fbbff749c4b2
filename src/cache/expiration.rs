//! Expiration Module
//!
//! Describes how long an item should live when it is written.

use std::time::Duration;

use crate::cache::item::current_timestamp_nanos;

/// Use the cache's default TTL.
pub const DEFAULT_EXPIRATION: Expiration = Expiration::Default;

/// Never expire.
pub const NO_EXPIRATION: Expiration = Expiration::Never;

// == Expiration ==
/// TTL requested for a write.
///
/// `After(Duration::ZERO)` is a real TTL that expires immediately and is
/// distinct from both sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Expiration {
    /// Use the cache's default TTL
    #[default]
    Default,
    /// The item never expires
    Never,
    /// The item expires this long after it is written
    After(Duration),
}

impl Expiration {
    // == Resolve ==
    /// Resolves `Default` against the cache's default TTL.
    pub(crate) fn resolve(self, default_ttl: Expiration) -> Expiration {
        match self {
            Expiration::Default => default_ttl,
            other => other,
        }
    }

    /// Normalises a value used as a cache's default TTL.
    ///
    /// `Default` and a zero duration both mean "never expire" there.
    pub(crate) fn as_default_ttl(self) -> Expiration {
        match self {
            Expiration::Default => Expiration::Never,
            Expiration::After(d) if d.is_zero() => Expiration::Never,
            other => other,
        }
    }

    // == Deadline ==
    /// Absolute expiration in Unix nanoseconds, `0` when the item never expires.
    ///
    /// `self` must already be resolved; an unresolved `Default` is treated as never.
    pub(crate) fn deadline_nanos(self) -> i64 {
        match self {
            Expiration::Default | Expiration::Never => 0,
            Expiration::After(d) => {
                let ttl = i64::try_from(d.as_nanos()).unwrap_or(i64::MAX);
                // Never land on 0, that is the "never expires" marker
                current_timestamp_nanos().saturating_add(ttl).max(1)
            }
        }
    }
}

impl From<Duration> for Expiration {
    fn from(d: Duration) -> Self {
        Expiration::After(d)
    }
}

impl From<Option<Duration>> for Expiration {
    fn from(d: Option<Duration>) -> Self {
        d.map_or(Expiration::Never, Expiration::After)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_default_uses_cache_ttl() {
        let cache_ttl = Expiration::After(Duration::from_secs(5));
        assert_eq!(Expiration::Default.resolve(cache_ttl), cache_ttl);
        assert_eq!(Expiration::Never.resolve(cache_ttl), Expiration::Never);
    }

    #[test]
    fn test_default_ttl_normalisation() {
        assert_eq!(Expiration::Default.as_default_ttl(), Expiration::Never);
        assert_eq!(
            Expiration::After(Duration::ZERO).as_default_ttl(),
            Expiration::Never
        );
        let ttl = Expiration::After(Duration::from_millis(10));
        assert_eq!(ttl.as_default_ttl(), ttl);
    }

    #[test]
    fn test_deadline_never_is_zero() {
        assert_eq!(Expiration::Never.deadline_nanos(), 0);
    }

    #[test]
    fn test_deadline_is_in_the_future() {
        let before = current_timestamp_nanos();
        let deadline = Expiration::After(Duration::from_secs(1)).deadline_nanos();
        assert!(deadline >= before + 1_000_000_000);
    }

    #[test]
    fn test_huge_duration_saturates() {
        let deadline = Expiration::After(Duration::MAX).deadline_nanos();
        assert_eq!(deadline, i64::MAX);
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(
            Expiration::from(Duration::from_secs(1)),
            Expiration::After(Duration::from_secs(1))
        );
        assert_eq!(Expiration::from(None), Expiration::Never);
        assert_eq!(DEFAULT_EXPIRATION, Expiration::default());
        assert_ne!(NO_EXPIRATION, Expiration::After(Duration::ZERO));
    }
}
