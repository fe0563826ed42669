//! Expiring Cache - an in-process key-value store
//!
//! Provides per-entry TTL expiration, typed numeric counters and an optional
//! background sweeper that reclaims expired entries.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{Cache, Entry, Expiration, Number, Store};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use tasks::SweeperState;
