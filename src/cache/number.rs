//! Numeric Cache Module
//!
//! Arithmetic on cached numbers: increment, decrement and running max/min.
//! Every operation is a read-modify-write under a single write lock.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::io::Read;
use std::ops::Deref;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::cache::{Cache, Expiration, Item};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

mod sealed {
    pub trait Sealed {}
}

// == Number ==
/// Value types a [`NumberCache`] can hold.
///
/// Implemented for every primitive integer width and for `f32`/`f64`; the set
/// is closed. Integer arithmetic wraps on overflow. Float arithmetic follows
/// IEEE 754, and `max_of`/`min_of` return the non-NaN operand when one is NaN.
pub trait Number:
    sealed::Sealed + Copy + PartialOrd + Send + Sync + 'static
{
    /// `self + rhs`, wrapping for integers.
    fn add_wrapping(self, rhs: Self) -> Self;
    /// `self - rhs`, wrapping for integers.
    fn sub_wrapping(self, rhs: Self) -> Self;
    /// The larger of the two.
    fn max_of(self, other: Self) -> Self;
    /// The smaller of the two.
    fn min_of(self, other: Self) -> Self;
}

macro_rules! impl_number_int {
    ($($t:ty),* $(,)?) => {$(
        impl sealed::Sealed for $t {}

        impl Number for $t {
            #[inline]
            fn add_wrapping(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }
            #[inline]
            fn sub_wrapping(self, rhs: Self) -> Self {
                self.wrapping_sub(rhs)
            }
            #[inline]
            fn max_of(self, other: Self) -> Self {
                Ord::max(self, other)
            }
            #[inline]
            fn min_of(self, other: Self) -> Self {
                Ord::min(self, other)
            }
        }
    )*};
}

macro_rules! impl_number_float {
    ($($t:ty),* $(,)?) => {$(
        impl sealed::Sealed for $t {}

        impl Number for $t {
            #[inline]
            fn add_wrapping(self, rhs: Self) -> Self {
                self + rhs
            }
            #[inline]
            fn sub_wrapping(self, rhs: Self) -> Self {
                self - rhs
            }
            #[inline]
            fn max_of(self, other: Self) -> Self {
                self.max(other)
            }
            #[inline]
            fn min_of(self, other: Self) -> Self {
                self.min(other)
            }
        }
    )*};
}

impl_number_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
impl_number_float!(f32, f64);

// == Number Cache ==
/// A [`Cache`] of numbers with atomic arithmetic updates.
///
/// Derefs to the underlying [`Cache`], so every regular operation is available.
pub struct NumberCache<K, V> {
    cache: Cache<K, V>,
}

impl<K, V> NumberCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Number,
{
    /// Creates an empty numeric cache. See [`Cache::new`].
    pub fn new(default_ttl: impl Into<Expiration>, cleanup_interval: Duration) -> Result<Self> {
        Ok(Self {
            cache: Cache::new(default_ttl, cleanup_interval)?,
        })
    }

    /// Creates a numeric cache seeded with `items`. See [`Cache::from_items`].
    pub fn from_items(
        default_ttl: impl Into<Expiration>,
        cleanup_interval: Duration,
        items: HashMap<K, Item<V>>,
    ) -> Result<Self> {
        Ok(Self {
            cache: Cache::from_items(default_ttl, cleanup_interval, items)?,
        })
    }

    /// Creates an empty numeric cache from a [`CacheConfig`].
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        Ok(Self {
            cache: Cache::from_config(config)?,
        })
    }

    /// Creates a numeric cache from a [`CacheConfig`], seeded with `items`.
    pub fn from_config_with_items(
        config: &CacheConfig,
        items: HashMap<K, Item<V>>,
    ) -> Result<Self> {
        Ok(Self {
            cache: Cache::from_config_with_items(config, items)?,
        })
    }

    /// Rebuilds a numeric cache from a stream written by [`Cache::save`].
    pub fn from_snapshot<R: Read>(
        default_ttl: impl Into<Expiration>,
        cleanup_interval: Duration,
        reader: R,
    ) -> Result<Self>
    where
        K: DeserializeOwned,
        V: DeserializeOwned,
    {
        Ok(Self {
            cache: Cache::from_snapshot(default_ttl, cleanup_interval, reader)?,
        })
    }

    // == Increment / Decrement ==
    /// Adds `delta` to a live item in place and returns the new value.
    ///
    /// Expiration and hit count are kept. Integers wrap on overflow.
    pub fn increment<Q>(&self, key: &Q, delta: V) -> Result<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        self.cache
            .update_live(key, |item| {
                item.value = item.value.add_wrapping(delta);
                item.value
            })
            .ok_or_else(|| CacheError::not_found(&key))
    }

    /// Subtracts `delta` from a live item in place and returns the new value.
    pub fn decrement<Q>(&self, key: &Q, delta: V) -> Result<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        self.cache
            .update_live(key, |item| {
                item.value = item.value.sub_wrapping(delta);
                item.value
            })
            .ok_or_else(|| CacheError::not_found(&key))
    }

    // == Set Max / Set Min ==
    /// Keeps the larger of the stored value and `value`.
    ///
    /// An absent or expired key is inserted fresh with `ttl`; otherwise
    /// expiration and hit count are kept. Returns the stored value.
    pub fn set_max(&self, key: K, value: V, ttl: impl Into<Expiration>) -> V {
        self.cache
            .upsert_with(key, value, ttl.into(), |current, new| current.max_of(new))
    }

    /// Keeps the smaller of the stored value and `value`, inserting if absent.
    pub fn set_min(&self, key: K, value: V, ttl: impl Into<Expiration>) -> V {
        self.cache
            .upsert_with(key, value, ttl.into(), |current, new| current.min_of(new))
    }

    // == Update Max / Update Min ==
    /// Like [`NumberCache::set_max`], but fails instead of inserting.
    pub fn update_max<Q>(&self, key: &Q, value: V) -> Result<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        self.cache
            .update_live(key, |item| {
                item.value = item.value.max_of(value);
                item.value
            })
            .ok_or_else(|| CacheError::not_found(&key))
    }

    /// Like [`NumberCache::set_min`], but fails instead of inserting.
    pub fn update_min<Q>(&self, key: &Q, value: V) -> Result<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        self.cache
            .update_live(key, |item| {
                item.value = item.value.min_of(value);
                item.value
            })
            .ok_or_else(|| CacheError::not_found(&key))
    }

    /// Unwraps the underlying cache.
    pub fn into_inner(self) -> Cache<K, V> {
        self.cache
    }
}

impl<K, V> Deref for NumberCache<K, V> {
    type Target = Cache<K, V>;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}

impl<K, V> fmt::Debug for NumberCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NumberCache").field(&self.cache).finish()
    }
}
