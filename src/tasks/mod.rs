//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside a cache.
//!
//! # Tasks
//! - Janitor: Removes expired cache items at a configured interval

mod janitor;

pub use janitor::{Janitor, Sweep};
