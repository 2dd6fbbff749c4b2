//! Cache Module
//!
//! Provides the in-memory cache engine with TTL expiration, eviction
//! notification and a numeric extension.

mod expiration;
mod item;
mod number;
pub mod snapshot;
mod store;


// Re-export public types
pub use expiration::{Expiration, DEFAULT_EXPIRATION, NO_EXPIRATION};
pub use item::{current_timestamp_nanos, Item};
pub use number::{Number, NumberCache};
pub use store::{Cache, EvictionCallback};
