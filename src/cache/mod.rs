//! Cache Module
//!
//! Provides an in-memory key-value store with per-entry TTL expiration,
//! numeric counters and snapshotting.

mod entry;
mod handle;
mod numeric;
mod snapshot;
mod store;


// Re-export public types
pub use entry::{Entry, Expiration};
pub use handle::Cache;
pub use numeric::{Number, Primitive};
pub use store::{EvictionCallback, Store};
