//! Resolved value cache entries

use chrono::{DateTime, Duration, Utc};

use crate::reference::CanonicalKey;

/// A resolved value and when it was fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Canonical reference key.
    pub key: CanonicalKey,
    /// Resolved value.
    pub value: String,
    /// Fetch time.
    pub fetched_at: DateTime<Utc>,
    /// Lifetime; `None` keeps the entry for the whole run.
    pub ttl: Option<Duration>,
}

impl CacheEntry {
    /// Creates an entry.
    #[must_use]
    pub const fn new(
        key: CanonicalKey,
        value: String,
        fetched_at: DateTime<Utc>,
        ttl: Option<Duration>,
    ) -> Self {
        Self {
            key,
            value,
            fetched_at,
            ttl,
        }
    }

    /// Whether the entry has outlived its TTL at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.ttl.is_some_and(|ttl| now >= self.fetched_at + ttl)
    }
}
