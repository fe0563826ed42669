//! Cache Store Module
//!
//! Main cache engine: a lock-guarded HashMap of entries with lazy TTL
//! expiration and an optional eviction callback.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error};

use crate::cache::{Entry, Expiration};
use crate::error::{CacheError, Result};

/// Callback invoked with the key and value of every evicted entry.
pub type EvictionCallback<T> = Arc<dyn Fn(&str, T) + Send + Sync>;

/// Payload of a panic raised by an eviction callback.
pub(crate) type CallbackPanic = Box<dyn Any + Send + 'static>;

struct Inner<T> {
    entries: HashMap<String, Entry<T>>,
    on_evicted: Option<EvictionCallback<T>>,
}

// == Cache Store ==
/// Concurrent key-value storage with per-entry expiration.
///
/// Every operation takes `&self`; a single reader/writer lock serializes
/// writers against each other and against readers. Expired entries stay in
/// the map (invisible to lookups) until [`Store::delete_expired`] or
/// [`Store::delete`] removes them.
pub struct Store<T> {
    /// TTL applied for [`Expiration::Default`], None = never expire
    default_ttl: Option<Duration>,
    inner: RwLock<Inner<T>>,
}

impl<T> Store<T> {
    // == Constructor ==
    /// Creates an empty store.
    ///
    /// # Arguments
    /// * `default_ttl` - TTL for writes using the default expiration; zero means never expire
    pub fn new(default_ttl: Duration) -> Self {
        Self::from_entries(default_ttl, HashMap::new())
    }

    /// Creates a store that takes ownership of a previously captured entry map.
    pub fn from_entries(default_ttl: Duration, entries: HashMap<String, Entry<T>>) -> Self {
        Self {
            default_ttl: (!default_ttl.is_zero()).then_some(default_ttl),
            inner: RwLock::new(Inner {
                entries,
                on_evicted: None,
            }),
        }
    }

    /// Returns the TTL used for default-expiration writes, None if they never expire.
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    // Writers never leave the map half-updated, so a poisoned lock still
    // guards a consistent map.
    fn read(&self) -> RwLockReadGuard<'_, Inner<T>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner<T>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` over the whole entry map while holding the read lock.
    pub(crate) fn with_entries<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&HashMap<String, Entry<T>>) -> R,
    {
        f(&self.read().entries)
    }

    /// Runs `f` on the live entry for `key` while holding the write lock.
    pub(crate) fn with_live_entry<R, F>(&self, key: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut Entry<T>) -> Result<R>,
    {
        let mut inner = self.write();
        let entry = inner
            .entries
            .get_mut(key)
            .filter(|entry| !entry.is_expired())
            .ok_or_else(|| CacheError::NotFound(key.to_string()))?;
        f(entry)
    }

    fn new_entry(&self, value: T, expiration: Expiration) -> Entry<T> {
        let ttl = match expiration {
            Expiration::Never => None,
            Expiration::After(ttl) if !ttl.is_zero() => Some(ttl),
            Expiration::Default | Expiration::After(_) => self.default_ttl,
        };
        Entry::new(value, ttl)
    }

    // == Set ==
    /// Stores a value, replacing any existing entry.
    ///
    /// Overwriting is not an eviction: the eviction callback is not invoked
    /// for the replaced value.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `expiration` - Default TTL, no expiration, or an explicit TTL
    pub fn set(&self, key: impl Into<String>, value: T, expiration: Expiration) {
        let entry = self.new_entry(value, expiration);
        self.write().entries.insert(key.into(), entry);
    }

    /// Stores a value with the default TTL.
    pub fn set_default(&self, key: impl Into<String>, value: T) {
        self.set(key, value, Expiration::Default);
    }

    // == Add ==
    /// Stores a value only if no live entry exists for the key.
    ///
    /// An expired entry still in the map is overwritten.
    pub fn add(&self, key: impl Into<String>, value: T, expiration: Expiration) -> Result<()> {
        let key = key.into();
        let mut inner = self.write();
        if inner.entries.get(&key).is_some_and(|entry| !entry.is_expired()) {
            return Err(CacheError::AlreadyExists(key));
        }
        let entry = self.new_entry(value, expiration);
        inner.entries.insert(key, entry);
        Ok(())
    }

    // == Replace ==
    /// Stores a value only if a live entry already exists for the key.
    pub fn replace(&self, key: impl Into<String>, value: T, expiration: Expiration) -> Result<()> {
        let key = key.into();
        let mut inner = self.write();
        if !inner.entries.get(&key).is_some_and(|entry| !entry.is_expired()) {
            return Err(CacheError::NotFound(key));
        }
        let entry = self.new_entry(value, expiration);
        inner.entries.insert(key, entry);
        Ok(())
    }

    // == Delete ==
    /// Removes an entry whether or not it has expired.
    ///
    /// Returns true if an entry was present. The eviction callback, if any,
    /// runs after the lock is released, so it may call back into the store.
    pub fn delete(&self, key: &str) -> bool {
        let (removed, callback) = {
            let mut inner = self.write();
            let removed = inner.entries.remove(key);
            (removed, inner.on_evicted.clone())
        };

        let Some(entry) = removed else {
            return false;
        };
        if let Some(callback) = callback {
            if let Some(payload) = notify_evicted(&callback, vec![(key.to_string(), entry.value)]) {
                panic::resume_unwind(payload);
            }
        }
        true
    }

    // == Delete Expired ==
    /// Removes every expired entry and returns how many were removed.
    ///
    /// The eviction callback fires once per removed entry, in no particular
    /// order, after the lock is released. A panicking callback does not stop
    /// the remaining notifications; the first panic is re-raised once all of
    /// them have been delivered.
    pub fn delete_expired(&self) -> usize {
        let (removed, panicked) = self.sweep();
        if let Some(payload) = panicked {
            panic::resume_unwind(payload);
        }
        removed
    }

    /// Removes expired entries, returning the count and the first callback
    /// panic instead of re-raising it.
    pub(crate) fn sweep(&self) -> (usize, Option<CallbackPanic>) {
        let now = Utc::now();
        let (evicted, callback) = {
            let mut inner = self.write();
            let expired_keys: Vec<String> = inner
                .entries
                .iter()
                .filter(|(_, entry)| entry.is_expired_at(now))
                .map(|(key, _)| key.clone())
                .collect();

            let mut evicted = Vec::with_capacity(expired_keys.len());
            for key in expired_keys {
                if let Some(entry) = inner.entries.remove(&key) {
                    evicted.push((key, entry.value));
                }
            }
            (evicted, inner.on_evicted.clone())
        };

        let removed = evicted.len();
        let panicked = match callback {
            Some(callback) => notify_evicted(&callback, evicted),
            None => None,
        };
        (removed, panicked)
    }

    // == Item Count ==
    /// Returns the number of entries in the map.
    ///
    /// This may include expired entries that have not been swept yet.
    pub fn item_count(&self) -> usize {
        self.read().entries.len()
    }

    // == Flush ==
    /// Removes every entry without invoking the eviction callback.
    pub fn flush(&self) {
        let dropped = std::mem::take(&mut self.write().entries);
        debug!(entries = dropped.len(), "Cache flushed");
    }

    // == Eviction Callback ==
    /// Installs the callback invoked for entries removed by delete or sweep.
    ///
    /// Replaces any previously installed callback. It is not invoked for
    /// overwrites or [`Store::flush`].
    pub fn on_evicted<F>(&self, callback: F)
    where
        F: Fn(&str, T) + Send + Sync + 'static,
    {
        self.write().on_evicted = Some(Arc::new(callback));
    }

    /// Removes the eviction callback.
    pub fn clear_on_evicted(&self) {
        self.write().on_evicted = None;
    }

    // == Load Items ==
    /// Merges entries into the store.
    ///
    /// An incoming entry is skipped when the store already holds a live
    /// entry for its key; otherwise it overwrites. Returns the number of
    /// incoming entries applied.
    pub fn load_items(&self, items: HashMap<String, Entry<T>>) -> usize {
        let now = Utc::now();
        let mut inner = self.write();
        let mut applied = 0;
        for (key, entry) in items {
            let keep_existing = inner
                .entries
                .get(&key)
                .is_some_and(|existing| !existing.is_expired_at(now));
            if !keep_existing {
                inner.entries.insert(key, entry);
                applied += 1;
            }
        }
        applied
    }
}

impl<T: Clone> Store<T> {
    // == Get ==
    /// Returns the value for a key if present and not expired.
    ///
    /// An expired entry is left in place for the sweeper.
    pub fn get(&self, key: &str) -> Option<T> {
        self.read()
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone())
    }

    /// Returns the value and its expiration instant (None = never expires).
    pub fn get_with_expiration(&self, key: &str) -> Option<(T, Option<DateTime<Utc>>)> {
        self.read()
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| (entry.value.clone(), entry.expires_at))
    }

    // == Items ==
    /// Returns a copy of every live entry.
    pub fn items(&self) -> HashMap<String, Entry<T>> {
        let now = Utc::now();
        self.read()
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    // == Mutate ==
    /// Replaces a live entry's value with `f(current)` under one lock
    /// acquisition, keeping its expiration. Returns the new value.
    ///
    /// `f` runs while the write lock is held and must not call back into
    /// the store; doing so deadlocks.
    pub fn mutate<F>(&self, key: &str, f: F) -> Result<T>
    where
        F: FnOnce(&T) -> T,
    {
        self.with_live_entry(key, |entry| {
            let next = f(&entry.value);
            entry.set_value(next.clone());
            Ok(next)
        })
    }
}

impl<T> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.read();
        f.debug_struct("Store")
            .field("default_ttl", &self.default_ttl)
            .field("entries", &inner.entries.len())
            .field("on_evicted", &inner.on_evicted.is_some())
            .finish()
    }
}

/// Delivers evictions one by one, isolating each callback invocation.
fn notify_evicted<T>(
    callback: &EvictionCallback<T>,
    evicted: Vec<(String, T)>,
) -> Option<CallbackPanic> {
    let mut first_panic = None;
    for (key, value) in evicted {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(key.as_str(), value))) {
            error!(key = %key, "Eviction callback panicked");
            first_panic.get_or_insert(payload);
        }
    }
    first_panic
}
