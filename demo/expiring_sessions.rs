//! Expiring Sessions Demo
//!
//! Keeps short-lived session counters in a cache and lets the background
//! sweeper reclaim them. Run with `RUST_LOG=expiring_cache=debug` to watch
//! the sweeps.

use std::time::Duration;

use expiring_cache::{Cache, CacheConfig, Expiration};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "expiring_cache=debug,expiring_sessions=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CacheConfig::new(Duration::from_millis(300), Duration::from_millis(100));
    let sessions: Cache<u32> = Cache::with_config(&config)?;

    sessions.on_evicted(|session: &str, requests: u32| {
        info!(session, requests, "Session expired");
    });

    sessions.set_default("alice", 0);
    sessions.set_default("bob", 0);
    sessions.set("admin", 0, Expiration::Never);

    for _ in 0..3 {
        sessions.increment_u32("alice", 1)?;
    }
    sessions.increment("bob", 2)?;
    info!(sessions = sessions.item_count(), "Sessions active");

    tokio::time::sleep(Duration::from_millis(500)).await;
    info!(
        sessions = sessions.item_count(),
        admin = ?sessions.get("admin"),
        "After expiry"
    );

    let snapshot_path = std::env::temp_dir().join("expiring_sessions.json");
    sessions.save_file(&snapshot_path)?;
    info!(path = %snapshot_path.display(), "Snapshot written");

    Ok(())
}
