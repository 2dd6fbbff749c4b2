//! Cache Item Module
//!
//! Defines the stored unit: a value, its hit counter and its absolute expiration.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// == Item ==
/// A single cache entry with value and metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item<V> {
    /// The stored value
    pub value: V,
    /// Number of recorded successful lookups
    pub hits: u64,
    /// Expiration timestamp (Unix nanoseconds), 0 = no expiration
    pub expiration: i64,
}

impl<V> Item<V> {
    // == Constructor ==
    /// Creates a fresh item with no hits.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `expiration` - Absolute expiration in Unix nanoseconds, 0 for never
    pub fn new(value: V, expiration: i64) -> Self {
        Self {
            value,
            hits: 0,
            expiration,
        }
    }

    // == Is Expired ==
    /// Checks if the item has expired.
    ///
    /// An item is expired once the current time is strictly past its
    /// expiration instant. Items with `expiration == 0` never expire.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_nanos())
    }

    /// Same as [`Item::is_expired`] against a caller-supplied clock reading.
    #[inline]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expiration > 0 && now > self.expiration
    }

    // == Is Hit ==
    /// Returns true if at least one lookup has been recorded.
    pub fn is_hit(&self) -> bool {
        self.hits > 0
    }

    // == Expires At ==
    /// Returns the expiration instant, or None if the item never expires.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        expiration_instant(self.expiration)
    }

    // == Time To Live ==
    /// Returns remaining TTL, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(Duration::ZERO)` if the item has expired
    /// - `Some(remaining)` if the item has a TTL that hasn't elapsed
    /// - `None` if the item never expires
    pub fn ttl_remaining(&self) -> Option<Duration> {
        if self.expiration == 0 {
            return None;
        }
        let remaining = self.expiration.saturating_sub(current_timestamp_nanos());
        Some(Duration::from_nanos(remaining.max(0) as u64))
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in nanoseconds.
pub fn current_timestamp_nanos() -> i64 {
    // Only out of range past the year 2262
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// Converts a stored expiration into an instant, None for "never".
pub(crate) fn expiration_instant(expiration: i64) -> Option<DateTime<Utc>> {
    if expiration > 0 {
        Some(Utc.timestamp_nanos(expiration))
    } else {
        None
    }
}
