//! Configuration Module
//!
//! Handles loading cache construction parameters from environment variables.

use std::env;
use std::time::Duration;

use crate::cache::Expiration;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL applied when a caller asks for the default expiration
    pub default_ttl: Expiration,
    /// Interval between background sweeps, zero disables the janitor
    pub cleanup_interval: Duration,
    /// Whether successful lookups increment the item's hit counter
    pub track_hits: bool,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds, `-1` or `0` never expires (default: never)
    /// - `CACHE_CLEANUP_INTERVAL_MS` - Sweep frequency in milliseconds, `0` disables it (default: 0)
    /// - `CACHE_TRACK_HITS` - `true`/`1` to count hits on lookup (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_ttl: env::var("CACHE_DEFAULT_TTL_MS")
                .ok()
                .and_then(|v| v.trim().parse::<i64>().ok())
                .map(ttl_from_millis)
                .unwrap_or(defaults.default_ttl),
            cleanup_interval: env::var("CACHE_CLEANUP_INTERVAL_MS")
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.cleanup_interval),
            track_hits: env::var("CACHE_TRACK_HITS")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.track_hits),
        }
    }

    /// Sets the default TTL.
    pub fn with_default_ttl(mut self, ttl: impl Into<Expiration>) -> Self {
        self.default_ttl = ttl.into();
        self
    }

    /// Sets the janitor interval.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Enables or disables hit counting on lookups.
    pub fn with_track_hits(mut self, track_hits: bool) -> Self {
        self.track_hits = track_hits;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Expiration::Never,
            cleanup_interval: Duration::ZERO,
            track_hits: false,
        }
    }
}

fn ttl_from_millis(ms: i64) -> Expiration {
    if ms <= 0 {
        Expiration::Never
    } else {
        Expiration::After(Duration::from_millis(ms as u64))
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.default_ttl, Expiration::Never);
        assert_eq!(config.cleanup_interval, Duration::ZERO);
        assert!(!config.track_hits);
    }

    #[test]
    fn test_config_from_env() {
        // Single test touches the environment so parallel tests don't race on it
        env::remove_var("CACHE_DEFAULT_TTL_MS");
        env::remove_var("CACHE_CLEANUP_INTERVAL_MS");
        env::remove_var("CACHE_TRACK_HITS");
        assert_eq!(CacheConfig::from_env(), CacheConfig::default());

        env::set_var("CACHE_DEFAULT_TTL_MS", "1500");
        env::set_var("CACHE_CLEANUP_INTERVAL_MS", "250");
        env::set_var("CACHE_TRACK_HITS", "true");
        let config = CacheConfig::from_env();
        assert_eq!(
            config.default_ttl,
            Expiration::After(Duration::from_millis(1500))
        );
        assert_eq!(config.cleanup_interval, Duration::from_millis(250));
        assert!(config.track_hits);

        env::set_var("CACHE_DEFAULT_TTL_MS", "-1");
        env::set_var("CACHE_CLEANUP_INTERVAL_MS", "not-a-number");
        env::set_var("CACHE_TRACK_HITS", "maybe");
        let config = CacheConfig::from_env();
        assert_eq!(config.default_ttl, Expiration::Never);
        assert_eq!(config.cleanup_interval, Duration::ZERO);
        assert!(!config.track_hits);

        env::remove_var("CACHE_DEFAULT_TTL_MS");
        env::remove_var("CACHE_CLEANUP_INTERVAL_MS");
        env::remove_var("CACHE_TRACK_HITS");
    }

    #[test]
    fn test_config_builders() {
        let config = CacheConfig::default()
            .with_default_ttl(Duration::from_secs(5))
            .with_cleanup_interval(Duration::from_secs(1))
            .with_track_hits(true);
        assert_eq!(config.default_ttl, Expiration::After(Duration::from_secs(5)));
        assert_eq!(config.cleanup_interval, Duration::from_secs(1));
        assert!(config.track_hits);
    }
}
