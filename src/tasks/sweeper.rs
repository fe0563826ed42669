//! Expiry Sweeper Task
//!
//! Background task that periodically removes expired cache entries.
//!
//! The task only holds a [`Weak`] reference to the store, so it never keeps
//! the cache alive. It ends when its [`Sweeper`] handle is stopped or
//! dropped, or when the store has been dropped by the time of the next tick.

use std::any::Any;
use std::sync::Weak;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::Store;
use crate::error::{CacheError, Result};

// == Sweeper State ==
/// Lifecycle of a cache's background sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweeperState {
    /// No sweeper was started (cleanup interval of zero)
    Idle,
    /// Ticking
    Running,
    /// Stopped for good
    Stopped,
}

// == Sweeper ==
/// Handle to a running sweeper task.
///
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct Sweeper {
    interval: Duration,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Sweeper {
    /// Spawns a sweeper on the current Tokio runtime.
    ///
    /// # Arguments
    /// * `store` - Weak reference to the store to sweep
    /// * `interval` - Time between sweeps; the first sweep happens one interval after start
    ///
    /// # Errors
    /// `ZeroInterval` if `interval` is zero, `NoRuntime` if called outside of
    /// a Tokio runtime.
    pub fn start<T>(store: Weak<Store<T>>, interval: Duration) -> Result<Self>
    where
        T: Send + Sync + 'static,
    {
        if interval.is_zero() {
            return Err(CacheError::ZeroInterval);
        }
        let runtime = Handle::try_current().map_err(|_| CacheError::NoRuntime)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = runtime.spawn(sweep_loop(store, interval, shutdown_rx));

        info!(
            interval_ms = interval.as_millis() as u64,
            "Background expiry sweeper started"
        );

        Ok(Self {
            interval,
            shutdown_tx,
            task,
        })
    }

    /// Time between sweeps.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Signals the task to stop. The task exits at its next wake-up.
    pub fn stop(&self) {
        if !self.shutdown_tx.send_replace(true) {
            info!("Background expiry sweeper stopped");
        }
    }

    /// Reports `Stopped` once stop was requested or the task has exited.
    pub fn state(&self) -> SweeperState {
        if *self.shutdown_tx.borrow() || self.task.is_finished() {
            SweeperState::Stopped
        } else {
            SweeperState::Running
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main sweeper loop.
async fn sweep_loop<T>(
    store: Weak<Store<T>>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let Some(store) = store.upgrade() else {
            debug!("Cache dropped, expiry sweeper exiting");
            return;
        };
        let (removed, panicked) = store.sweep();
        drop(store);

        if let Some(payload) = panicked {
            warn!(
                reason = panic_message(payload.as_ref()),
                "Eviction callback panicked during sweep"
            );
        }

        if removed > 0 {
            info!(removed, "Expiry sweep removed expired entries");
        } else {
            debug!("Expiry sweep: no expired entries found");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Expiration;
    use std::sync::Arc;

    const TICK: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_sweeper_removes_expired_entries() {
        let store = Arc::new(Store::new(Duration::ZERO));
        store.set("expire_soon", 1, Duration::from_millis(20).into());
        store.set("long_lived", 2, Expiration::Never);

        let sweeper = Sweeper::start(Arc::downgrade(&store), TICK).unwrap();
        assert_eq!(sweeper.state(), SweeperState::Running);

        tokio::time::sleep(TICK * 3).await;

        assert_eq!(store.item_count(), 1);
        assert_eq!(store.get("long_lived"), Some(2));
    }

    #[tokio::test]
    async fn test_sweeper_can_be_stopped() {
        let store: Arc<Store<u8>> = Arc::new(Store::new(Duration::ZERO));
        let sweeper = Sweeper::start(Arc::downgrade(&store), TICK).unwrap();

        sweeper.stop();
        assert_eq!(sweeper.state(), SweeperState::Stopped);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(sweeper.task.is_finished(), "Task should exit after stop");
    }

    #[tokio::test]
    async fn test_stopped_sweeper_no_longer_sweeps() {
        let store = Arc::new(Store::new(Duration::ZERO));
        store.set("expire_soon", 1, Duration::from_millis(10).into());

        let sweeper = Sweeper::start(Arc::downgrade(&store), TICK).unwrap();
        sweeper.stop();

        tokio::time::sleep(TICK * 3).await;
        assert_eq!(store.item_count(), 1);
    }

    #[tokio::test]
    async fn test_sweeper_exits_when_store_dropped() {
        let store: Arc<Store<u8>> = Arc::new(Store::new(Duration::ZERO));
        let sweeper = Sweeper::start(Arc::downgrade(&store), TICK).unwrap();

        drop(store);
        tokio::time::sleep(TICK * 3).await;

        assert!(sweeper.task.is_finished());
        assert_eq!(sweeper.state(), SweeperState::Stopped);
    }

    #[tokio::test]
    async fn test_sweeper_survives_panicking_callback() {
        let store = Arc::new(Store::new(Duration::ZERO));
        store.on_evicted(|_key: &str, _value: u8| panic!("callback failure"));
        store.set("first", 1, Duration::from_millis(10).into());

        let sweeper = Sweeper::start(Arc::downgrade(&store), TICK).unwrap();
        tokio::time::sleep(TICK * 2).await;
        assert_eq!(store.item_count(), 0);

        store.set("second", 2, Duration::from_millis(10).into());
        tokio::time::sleep(TICK * 3).await;

        assert_eq!(store.item_count(), 0);
        assert_eq!(sweeper.state(), SweeperState::Running);
    }

    #[tokio::test]
    async fn test_zero_interval_is_rejected() {
        let store: Arc<Store<u8>> = Arc::new(Store::new(Duration::ZERO));
        let result = Sweeper::start(Arc::downgrade(&store), Duration::ZERO);
        assert!(matches!(result, Err(CacheError::ZeroInterval)));
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let store: Arc<Store<u8>> = Arc::new(Store::new(Duration::ZERO));
        let result = Sweeper::start(Arc::downgrade(&store), TICK);
        assert!(matches!(result, Err(CacheError::NoRuntime)));
    }
}
