//! Cache Store Module
//!
//! Main cache engine: a lock-protected HashMap of items with lazy expiration on
//! read, an explicit sweep, and eviction notification.

use std::borrow::Borrow;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::io::{Read, Write};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};

use crate::cache::item::{current_timestamp_nanos, expiration_instant};
use crate::cache::{snapshot, Expiration, Item};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::tasks::{Janitor, Sweep};

/// Callback fired with `(key, value, hits)` when an item is removed by a sweep
/// or an explicit delete.
pub type EvictionCallback<K, V> = Arc<dyn Fn(&K, &V, u64) + Send + Sync>;

// == Locked State ==
struct State<K, V> {
    items: HashMap<K, Item<V>>,
    on_evicted: Option<EvictionCallback<K, V>>,
}

/// Everything the janitor needs to reach, shared behind an `Arc`.
pub(crate) struct Shared<K, V> {
    state: RwLock<State<K, V>>,
    default_ttl: Expiration,
    track_hits: bool,
}

impl<K, V> Shared<K, V>
where
    K: Eq + Hash + Clone,
{
    // == Delete Expired ==
    /// Removes every expired item under a single lock hold, then fires the
    /// eviction callback for each one after the lock is released.
    fn delete_expired(&self) -> usize {
        let (removed, evicted, callback) = {
            let mut state = self.state.write();
            let now = current_timestamp_nanos();

            let expired: Vec<K> = state
                .items
                .iter()
                .filter(|(_, item)| item.is_expired_at(now))
                .map(|(key, _)| key.clone())
                .collect();

            let callback = state.on_evicted.clone();
            let mut evicted = Vec::new();
            for key in &expired {
                if let Some(entry) = state.items.remove_entry(key) {
                    if callback.is_some() {
                        evicted.push(entry);
                    }
                }
            }
            (expired.len(), evicted, callback)
        };

        if let Some(callback) = callback {
            for (key, item) in &evicted {
                callback(key, &item.value, item.hits);
            }
        }
        removed
    }
}

impl<K, V> Sweep for Shared<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Send + Sync,
{
    fn sweep(&self) -> usize {
        self.delete_expired()
    }
}

// == Cache ==
/// Thread-safe in-memory cache with per-item TTL.
///
/// Share it between threads by wrapping it in an `Arc`. Dropping the cache
/// stops its janitor.
pub struct Cache<K, V> {
    shared: Arc<Shared<K, V>>,
    janitor: Option<Janitor>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructors ==
    /// Creates an empty cache.
    ///
    /// # Arguments
    /// * `default_ttl` - TTL used for writes that ask for [`Expiration::Default`];
    ///   `Default` or a zero duration here means items never expire
    /// * `cleanup_interval` - Time between background sweeps, zero for no janitor
    pub fn new(default_ttl: impl Into<Expiration>, cleanup_interval: Duration) -> Result<Self> {
        Self::from_items(default_ttl, cleanup_interval, HashMap::new())
    }

    /// Creates a cache seeded with `items`, typically a previous [`Cache::items`] snapshot.
    pub fn from_items(
        default_ttl: impl Into<Expiration>,
        cleanup_interval: Duration,
        items: HashMap<K, Item<V>>,
    ) -> Result<Self> {
        let config = CacheConfig::default()
            .with_default_ttl(default_ttl)
            .with_cleanup_interval(cleanup_interval);
        Self::from_config_with_items(&config, items)
    }

    /// Creates an empty cache from a [`CacheConfig`].
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        Self::from_config_with_items(config, HashMap::new())
    }

    /// Creates a cache from a [`CacheConfig`], seeded with `items`.
    pub fn from_config_with_items(
        config: &CacheConfig,
        items: HashMap<K, Item<V>>,
    ) -> Result<Self> {
        let shared = Arc::new(Shared {
            state: RwLock::new(State {
                items,
                on_evicted: None,
            }),
            default_ttl: config.default_ttl.as_default_ttl(),
            track_hits: config.track_hits,
        });

        let janitor = if config.cleanup_interval.is_zero() {
            None
        } else {
            let target: Weak<dyn Sweep> = Arc::downgrade(&shared) as Weak<dyn Sweep>;
            Some(Janitor::start(target, config.cleanup_interval)?)
        };

        Ok(Self { shared, janitor })
    }

    /// Rebuilds a cache from a stream written by [`Cache::save`].
    pub fn from_snapshot<R: Read>(
        default_ttl: impl Into<Expiration>,
        cleanup_interval: Duration,
        reader: R,
    ) -> Result<Self>
    where
        K: DeserializeOwned,
        V: DeserializeOwned,
    {
        let items = snapshot::decode(reader)?;
        Self::from_items(default_ttl, cleanup_interval, items)
    }

    // == Set ==
    /// Stores a value, replacing any existing item and resetting its hit count.
    ///
    /// Overwrites never fire the eviction callback.
    pub fn set(&self, key: K, value: V, ttl: impl Into<Expiration>) {
        let expiration = self.deadline(ttl.into());
        let mut state = self.shared.state.write();
        state.items.insert(key, Item::new(value, expiration));
    }

    /// Stores a value using the default TTL.
    pub fn set_default(&self, key: K, value: V) {
        self.set(key, value, Expiration::Default);
    }

    // == Add ==
    /// Stores a value only if no live item exists for the key.
    ///
    /// An expired item that hasn't been swept yet counts as absent.
    pub fn add(&self, key: K, value: V, ttl: impl Into<Expiration>) -> Result<()>
    where
        K: fmt::Debug,
    {
        let expiration = self.deadline(ttl.into());
        let mut state = self.shared.state.write();
        if is_live(state.items.get(&key)) {
            trace!(?key, "add rejected, item already exists");
            return Err(CacheError::already_exists(&key));
        }
        state.items.insert(key, Item::new(value, expiration));
        Ok(())
    }

    // == Replace ==
    /// Stores a value only if a live item already exists for the key.
    pub fn replace(&self, key: K, value: V, ttl: impl Into<Expiration>) -> Result<()>
    where
        K: fmt::Debug,
    {
        let expiration = self.deadline(ttl.into());
        let mut state = self.shared.state.write();
        if !is_live(state.items.get(&key)) {
            trace!(?key, "replace rejected, item not found");
            return Err(CacheError::not_found(&key));
        }
        state.items.insert(key, Item::new(value, expiration));
        Ok(())
    }

    // == Get ==
    /// Returns the value if the key is present and not expired.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup(key, |item| item.value.clone())
    }

    /// Returns the value and its expiration instant (None when it never expires).
    pub fn get_with_expiration<Q>(&self, key: &Q) -> Option<(V, Option<DateTime<Utc>>)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup(key, |item| {
            (item.value.clone(), expiration_instant(item.expiration))
        })
    }

    /// Returns the value and its hit count.
    ///
    /// With hit tracking on, the count includes this lookup.
    pub fn get_with_hit<Q>(&self, key: &Q) -> Option<(V, u64)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup(key, |item| (item.value.clone(), item.hits))
    }

    /// Returns the value, its hit count and its expiration instant.
    pub fn get_with_hit_expiration<Q>(
        &self,
        key: &Q,
    ) -> Option<(V, u64, Option<DateTime<Utc>>)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup(key, |item| {
            (
                item.value.clone(),
                item.hits,
                expiration_instant(item.expiration),
            )
        })
    }

    /// Returns true if the key is present and not expired. Never counts as a hit.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        is_live(self.shared.state.read().items.get(key))
    }

    // == Delete ==
    /// Removes an item, firing the eviction callback if one is registered.
    ///
    /// Returns the removed value. Expired-but-unswept items are removed (and
    /// reported) as well.
    pub fn delete<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let (entry, callback) = {
            let mut state = self.shared.state.write();
            let entry = state.items.remove_entry(key);
            (entry, state.on_evicted.clone())
        };

        let (key, item) = entry?;
        if let Some(callback) = callback {
            callback(&key, &item.value, item.hits);
        }
        Some(item.value)
    }

    /// Removes all expired items and returns how many were removed.
    pub fn delete_expired(&self) -> usize {
        self.shared.delete_expired()
    }

    // == Snapshot ==
    /// Returns a copy of all unexpired items.
    pub fn items(&self) -> HashMap<K, Item<V>> {
        let state = self.shared.state.read();
        let now = current_timestamp_nanos();
        state
            .items
            .iter()
            .filter(|(_, item)| !item.is_expired_at(now))
            .map(|(key, item)| (key.clone(), item.clone()))
            .collect()
    }

    /// Number of stored items, including expired ones not yet swept.
    pub fn item_count(&self) -> usize {
        self.shared.state.read().items.len()
    }

    /// Number of unexpired items.
    pub fn live_count(&self) -> usize {
        let state = self.shared.state.read();
        let now = current_timestamp_nanos();
        state
            .items
            .values()
            .filter(|item| !item.is_expired_at(now))
            .count()
    }

    /// Removes every item without firing the eviction callback.
    pub fn flush(&self) {
        let dropped = {
            let mut state = self.shared.state.write();
            std::mem::take(&mut state.items)
        };
        debug!("Cache flushed, {} items dropped", dropped.len());
    }

    /// Writes all stored items, expired ones included, to `writer`.
    pub fn save<W: Write>(&self, writer: W) -> Result<()>
    where
        K: Serialize,
        V: Serialize,
    {
        let state = self.shared.state.read();
        snapshot::encode(writer, &state.items)
    }

    /// Merges items from a stream written by [`Cache::save`].
    ///
    /// Keys holding a live item are left alone; absent or expired keys are
    /// overwritten. Returns how many items were inserted.
    pub fn load<R: Read>(&self, reader: R) -> Result<usize>
    where
        K: DeserializeOwned,
        V: DeserializeOwned,
    {
        let incoming = snapshot::decode::<K, V, R>(reader)?;
        let total = incoming.len();

        let mut state = self.shared.state.write();
        let now = current_timestamp_nanos();
        let mut inserted = 0;
        for (key, item) in incoming {
            let occupied = state
                .items
                .get(&key)
                .is_some_and(|existing| !existing.is_expired_at(now));
            if !occupied {
                state.items.insert(key, item);
                inserted += 1;
            }
        }
        drop(state);

        debug!("Snapshot loaded: {} of {} items inserted", inserted, total);
        Ok(inserted)
    }

    // == Eviction Callback ==
    /// Installs the eviction callback, replacing any previous one.
    ///
    /// The callback runs after the cache lock is released, so it may call back
    /// into the cache. If it panics, the panic reaches the caller of `delete` or
    /// `delete_expired` with the items already removed and the cache still
    /// usable; the rest of that sweep's notifications are skipped. The janitor
    /// logs such a panic and keeps sweeping.
    pub fn on_evicted<F>(&self, callback: F)
    where
        F: Fn(&K, &V, u64) + Send + Sync + 'static,
    {
        self.shared.state.write().on_evicted = Some(Arc::new(callback));
    }

    /// Removes the eviction callback.
    pub fn clear_on_evicted(&self) {
        self.shared.state.write().on_evicted = None;
    }

    // == Janitor ==
    /// Stops the background janitor. Safe to call repeatedly.
    pub fn stop_janitor(&self) {
        if let Some(janitor) = &self.janitor {
            janitor.stop();
        }
    }

    /// Returns true while a janitor is sweeping this cache.
    pub fn is_janitor_running(&self) -> bool {
        self.janitor.as_ref().is_some_and(Janitor::is_running)
    }

    /// The normalised default TTL.
    pub fn default_ttl(&self) -> Expiration {
        self.shared.default_ttl
    }

    // == Internal Helpers ==
    fn deadline(&self, ttl: Expiration) -> i64 {
        ttl.resolve(self.shared.default_ttl).deadline_nanos()
    }

    /// Runs `read` against a live item, recording a hit when tracking is on.
    fn lookup<Q, R>(&self, key: &Q, read: impl FnOnce(&Item<V>) -> R) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.shared.track_hits {
            let mut state = self.shared.state.write();
            let now = current_timestamp_nanos();
            let item = state.items.get_mut(key)?;
            if item.is_expired_at(now) {
                return None;
            }
            item.hits = item.hits.saturating_add(1);
            Some(read(item))
        } else {
            let state = self.shared.state.read();
            let now = current_timestamp_nanos();
            let item = state.items.get(key)?;
            if item.is_expired_at(now) {
                return None;
            }
            Some(read(item))
        }
    }

    /// Applies `update` to a live item in place under one write lock.
    ///
    /// Returns None if the key is absent or expired.
    pub(crate) fn update_live<Q, R>(
        &self,
        key: &Q,
        update: impl FnOnce(&mut Item<V>) -> R,
    ) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut state = self.shared.state.write();
        let now = current_timestamp_nanos();
        let item = state.items.get_mut(key)?;
        if item.is_expired_at(now) {
            return None;
        }
        Some(update(item))
    }

    /// Merges `value` into a live item, or inserts it fresh with `ttl` when the
    /// key is absent or expired. Returns the value left in the cache.
    pub(crate) fn upsert_with(
        &self,
        key: K,
        value: V,
        ttl: Expiration,
        merge: impl FnOnce(&V, V) -> V,
    ) -> V {
        let expiration = self.deadline(ttl);
        let mut state = self.shared.state.write();
        let now = current_timestamp_nanos();
        match state.items.entry(key) {
            Entry::Occupied(mut entry) if !entry.get().is_expired_at(now) => {
                let item = entry.get_mut();
                item.value = merge(&item.value, value);
                item.value.clone()
            }
            Entry::Occupied(mut entry) => {
                entry.insert(Item::new(value.clone(), expiration));
                value
            }
            Entry::Vacant(entry) => {
                entry.insert(Item::new(value.clone(), expiration));
                value
            }
        }
    }
}

impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("items", &self.shared.state.read().items.len())
            .field("default_ttl", &self.shared.default_ttl)
            .field("track_hits", &self.shared.track_hits)
            .field("janitor", &self.janitor)
            .finish()
    }
}

fn is_live<V>(item: Option<&Item<V>>) -> bool {
    item.is_some_and(|item| !item.is_expired())
}
