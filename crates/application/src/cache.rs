//! Single-flight resolution cache.
//!
//! At most one resolver call runs per canonical key. Concurrent requests for a
//! key that is already being resolved wait on the same shared future and get
//! the same value or the same error. Failures are never cached.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Duration;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use kustforge_domain::{CacheEntry, CanonicalKey, ResolveError};
use parking_lot::Mutex;
use tracing::debug;

use crate::ports::Clock;

type Resolution = Shared<BoxFuture<'static, Result<String, ResolveError>>>;

enum Slot {
    Ready(CacheEntry),
    Pending(Resolution),
}

/// Counters since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Served from a stored entry.
    pub hits: u64,
    /// Started a new resolution.
    pub misses: u64,
    /// Joined a resolution already in flight.
    pub coalesced: u64,
}

/// Resolved values keyed by [`CanonicalKey`].
pub struct ResolutionCache {
    slots: Mutex<HashMap<CanonicalKey, Slot>>,
    clock: Arc<dyn Clock>,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
}

impl ResolutionCache {
    /// Creates a cache whose entries live for the whole run.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            clock,
            ttl: None,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    /// Expires entries `ttl` after they were fetched.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns the cached value for `key`, or runs `resolve` to produce it.
    ///
    /// `resolve` is only called when no fresh entry exists and no other
    /// caller is already resolving the key.
    ///
    /// # Errors
    ///
    /// Returns the resolution error; it is shared with every caller that was
    /// waiting on the same key.
    pub async fn get_or_resolve<F, Fut>(
        &self,
        key: &CanonicalKey,
        resolve: F,
    ) -> Result<String, ResolveError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, ResolveError>> + Send + 'static,
    {
        let resolution = {
            let mut slots = self.slots.lock();
            let in_flight = match slots.get(key) {
                Some(Slot::Ready(entry)) if !entry.is_expired(self.clock.now()) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key, "resolution cache hit");
                    return Ok(entry.value.clone());
                }
                Some(Slot::Pending(resolution)) => Some(resolution.clone()),
                _ => None,
            };

            if let Some(resolution) = in_flight {
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "joining in-flight resolution");
                resolution
            } else {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "resolution cache miss");
                let resolution = resolve().boxed().shared();
                slots.insert(key.clone(), Slot::Pending(resolution.clone()));
                resolution
            }
        };

        let result = resolution.clone().await;
        self.settle(key, &resolution, &result);
        result
    }

    // Every waiter settles; only the first one still seeing its own pending
    // future changes anything.
    fn settle(
        &self,
        key: &CanonicalKey,
        resolution: &Resolution,
        result: &Result<String, ResolveError>,
    ) {
        let mut slots = self.slots.lock();
        let ours = matches!(
            slots.get(key),
            Some(Slot::Pending(pending)) if pending.ptr_eq(resolution)
        );
        if !ours {
            return;
        }
        match result {
            Ok(value) => {
                let entry = CacheEntry::new(key.clone(), value.clone(), self.clock.now(), self.ttl);
                slots.insert(key.clone(), Slot::Ready(entry));
            }
            Err(_) => {
                slots.remove(key);
            }
        }
    }

    /// Number of stored values, expired ones included until next access.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hit, miss and coalesced-wait counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;

    use futures::future::join_all;
    use kustforge_domain::Service;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ports::ManualClock;

    fn key(name: &str) -> CanonicalKey {
        CanonicalKey {
            role_alias: None,
            service: Service::Rds,
            selectors: BTreeMap::from([("name".to_string(), name.to_string())]),
            attribute: "endpoint".to_string(),
        }
    }

    fn counting(
        calls: &Arc<AtomicUsize>,
        result: Result<&'static str, ResolveError>,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<String, ResolveError>> {
        let calls = Arc::clone(calls);
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                result.map(String::from)
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_concurrent_requests_coalesce() {
        let cache = ResolutionCache::new(Arc::new(ManualClock::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let k = key("mydb");

        let results = join_all((0..5).map(|_| {
            cache.get_or_resolve(&k, counting(&calls, Ok("mydb.abc.rds.amazonaws.com")))
        }))
        .await;

        assert!(results.iter().all(|r| r.as_deref() == Ok("mydb.abc.rds.amazonaws.com")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 0,
                misses: 1,
                coalesced: 4
            }
        );
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_sequential_requests_hit() {
        let cache = ResolutionCache::new(Arc::new(ManualClock::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let k = key("mydb");

        cache.get_or_resolve(&k, counting(&calls, Ok("a"))).await.unwrap();
        let second = cache.get_or_resolve(&k, counting(&calls, Ok("b"))).await.unwrap();

        assert_eq!(second, "a");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_failures_are_shared_but_not_cached() {
        let cache = ResolutionCache::new(Arc::new(ManualClock::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let k = key("ghost");
        let not_found = ResolveError::ResourceNotFound {
            service: Service::Rds,
            selector: "name=ghost".to_string(),
        };

        let results = join_all(
            (0..3).map(|_| cache.get_or_resolve(&k, counting(&calls, Err(not_found.clone())))),
        )
        .await;
        assert!(results.iter().all(|r| r.as_ref().unwrap_err() == &not_found));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());

        let retried = cache.get_or_resolve(&k, counting(&calls, Ok("found"))).await;
        assert_eq!(retried.unwrap(), "found");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let clock = Arc::new(ManualClock::new());
        let cache = ResolutionCache::new(clock.clone()).with_ttl(Some(Duration::seconds(60)));
        let calls = Arc::new(AtomicUsize::new(0));
        let k = key("mydb");

        cache.get_or_resolve(&k, counting(&calls, Ok("v1"))).await.unwrap();
        clock.advance(Duration::seconds(59));
        let cached = cache.get_or_resolve(&k, counting(&calls, Ok("v2"))).await.unwrap();
        assert_eq!(cached, "v1");

        clock.advance(Duration::seconds(1));
        let refreshed = cache.get_or_resolve(&k, counting(&calls, Ok("v2"))).await.unwrap();
        assert_eq!(refreshed, "v2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
