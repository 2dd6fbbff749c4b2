//! Mini Cache - An embeddable in-memory key/value cache
//!
//! Provides per-item TTL with lazy expiration, a background janitor that sweeps
//! expired items, eviction callbacks, and atomic arithmetic on numeric values.
//!
//! ```
//! use std::time::Duration;
//! use mini_cache::{Cache, NO_EXPIRATION};
//!
//! let cache: Cache<String, u32> = Cache::new(Duration::from_secs(300), Duration::ZERO).unwrap();
//! cache.set("answer".to_string(), 42, NO_EXPIRATION);
//! assert_eq!(cache.get("answer"), Some(42));
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{
    Cache, EvictionCallback, Expiration, Item, Number, NumberCache, DEFAULT_EXPIRATION,
    NO_EXPIRATION,
};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
