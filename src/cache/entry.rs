//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// == Expiration ==
/// Expiration requested for a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiration {
    /// Use the cache's default TTL
    #[default]
    Default,
    /// Keep the entry until it is deleted or the cache is flushed
    Never,
    /// Expire this long after the write. A zero duration falls back to the default.
    After(Duration),
}

impl From<Duration> for Expiration {
    fn from(ttl: Duration) -> Self {
        Expiration::After(ttl)
    }
}

// == Cache Entry ==
/// A stored value and the instant after which it is logically absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry<T> {
    /// The stored value
    pub value: T,
    /// Expiration instant, None = no expiration
    pub expires_at: Option<DateTime<Utc>>,
}

impl<T> Entry<T> {
    // == Constructor ==
    /// Creates a new entry expiring `ttl` from now.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `ttl` - Optional TTL; `None` never expires
    ///
    /// A TTL too large to represent as a calendar instant is treated as no expiration.
    pub fn new(value: T, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.and_then(|ttl| {
            let ttl = chrono::Duration::from_std(ttl).ok()?;
            Utc::now().checked_add_signed(ttl)
        });

        Self { value, expires_at }
    }

    /// Creates an entry with an explicit expiration instant.
    pub fn with_expiry(value: T, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { value, expires_at }
    }

    // == Is Expired ==
    /// Checks if the entry has expired as of now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Checks if the entry has expired as of `now`.
    ///
    /// The boundary is exclusive: an entry is still valid at exactly its
    /// expiration instant and expired strictly after it.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires) => now > expires,
            None => false,
        }
    }

    // == Set Value ==
    /// Replaces the payload while keeping the expiration instant.
    pub fn set_value(&mut self, value: T) {
        self.value = value;
    }

    // == Time To Live ==
    /// Returns the remaining TTL, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(Duration::ZERO)` if the entry has expired
    /// - `Some(remaining)` if the entry has TTL and hasn't expired
    /// - `None` if the entry never expires
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at.map(|expires| {
            (expires - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO)
        })
    }
}
