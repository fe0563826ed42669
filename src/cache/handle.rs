//! Cache Handle Module
//!
//! The owning handle callers hold: a shared [`Store`] plus the optional
//! background sweeper whose lifetime is tied to the handle.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Entry, Store};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::tasks::{Sweeper, SweeperState};

// == Cache ==
/// An expiring key-value cache.
///
/// Dereferences to [`Store`] for every cache operation. When the handle is
/// dropped the sweeper is signalled to stop; the sweeper only ever holds a
/// weak reference to the store, so it cannot keep the entries alive.
#[derive(Debug)]
pub struct Cache<T> {
    store: Arc<Store<T>>,
    sweeper: Option<Sweeper>,
}

impl<T> Cache<T>
where
    T: Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates an empty cache.
    ///
    /// # Arguments
    /// * `default_ttl` - TTL for default-expiration writes; zero means never expire
    /// * `cleanup_interval` - Time between background sweeps; zero disables the sweeper
    ///
    /// # Errors
    /// `NoRuntime` if a sweeper is requested outside of a Tokio runtime.
    pub fn new(default_ttl: Duration, cleanup_interval: Duration) -> Result<Self> {
        Self::from_items(default_ttl, cleanup_interval, HashMap::new())
    }

    /// Creates a cache from a previously captured entry map, e.g. the output
    /// of [`Store::items`].
    pub fn from_items(
        default_ttl: Duration,
        cleanup_interval: Duration,
        items: HashMap<String, Entry<T>>,
    ) -> Result<Self> {
        let store = Arc::new(Store::from_entries(default_ttl, items));
        let sweeper = if cleanup_interval.is_zero() {
            None
        } else {
            Some(Sweeper::start(Arc::downgrade(&store), cleanup_interval)?)
        };

        Ok(Self { store, sweeper })
    }

    /// Creates an empty cache from a [`CacheConfig`].
    pub fn with_config(config: &CacheConfig) -> Result<Self> {
        Self::new(config.default_ttl(), config.cleanup_interval())
    }
}

impl<T> Cache<T> {
    /// Returns the underlying store.
    pub fn store(&self) -> &Store<T> {
        &self.store
    }

    // == Sweeper Lifecycle ==
    /// Reports `Idle` when the cache was built without a sweeper.
    pub fn sweeper_state(&self) -> SweeperState {
        self.sweeper
            .as_ref()
            .map_or(SweeperState::Idle, Sweeper::state)
    }

    /// Stops the background sweeper. Expired entries then stay in place
    /// until deleted or removed with [`Store::delete_expired`].
    pub fn stop_sweeper(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.stop();
        }
    }
}

impl<T> Deref for Cache<T> {
    type Target = Store<T>;

    fn deref(&self) -> &Store<T> {
        &self.store
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Expiration;
    use crate::error::CacheError;

    #[test]
    fn test_cache_without_sweeper_needs_no_runtime() {
        let cache = Cache::new(Duration::from_secs(60), Duration::ZERO).unwrap();
        cache.set_default("key1", 1);

        assert_eq!(cache.get("key1"), Some(1));
        assert_eq!(cache.sweeper_state(), SweeperState::Idle);
    }

    #[test]
    fn test_cache_with_sweeper_outside_runtime_fails() {
        let result: Result<Cache<u8>> = Cache::new(Duration::ZERO, Duration::from_millis(50));
        assert!(matches!(result, Err(CacheError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_cache_sweeper_lifecycle() {
        let cache: Cache<u8> = Cache::new(Duration::ZERO, Duration::from_millis(50)).unwrap();
        assert_eq!(cache.sweeper_state(), SweeperState::Running);

        cache.stop_sweeper();
        assert_eq!(cache.sweeper_state(), SweeperState::Stopped);

        // Stopping twice is harmless
        cache.stop_sweeper();
        assert_eq!(cache.sweeper_state(), SweeperState::Stopped);
    }

    #[tokio::test]
    async fn test_dropping_cache_releases_store() {
        let cache: Cache<u8> = Cache::new(Duration::ZERO, Duration::from_millis(10)).unwrap();
        cache.set("key1", 1, Expiration::Never);
        let weak = Arc::downgrade(&cache.store);

        drop(cache);
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(weak.upgrade().is_none(), "Sweeper must not keep the store alive");
    }

    #[test]
    fn test_cache_from_items() {
        let source = Cache::new(Duration::ZERO, Duration::ZERO).unwrap();
        source.set("a", "one".to_string(), Expiration::Never);
        source.set("b", "two".to_string(), Duration::from_secs(60).into());

        let restored = Cache::from_items(Duration::ZERO, Duration::ZERO, source.items()).unwrap();

        assert_eq!(restored.get("a").as_deref(), Some("one"));
        assert_eq!(restored.get_with_expiration("b"), source.get_with_expiration("b"));
    }

    #[test]
    fn test_cache_with_config() {
        let config = CacheConfig::new(Duration::from_secs(5), Duration::ZERO);
        let cache: Cache<u8> = Cache::with_config(&config).unwrap();

        assert_eq!(cache.default_ttl(), Some(Duration::from_secs(5)));
        assert_eq!(cache.store().item_count(), 0);
    }
}
