//! Resolution engine
//!
//! Wires the session manager, resolver registry, resolution cache and retry
//! policy together. Distinct canonical keys resolve in parallel on a bounded
//! worker pool; repeated keys collapse onto one call through the cache.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use kustforge_domain::{CanonicalKey, Reference, ResolveError};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::cache::ResolutionCache;
use crate::resolvers::ResolverRegistry;
use crate::retry::RetryPolicy;
use crate::session::SessionManager;

/// Default number of concurrent remote lookups.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Engine tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Worker pool size.
    pub max_concurrency: usize,
    /// Retry budget for throttled calls.
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            retry: RetryPolicy::default(),
        }
    }
}

/// Resolves references to values.
pub struct ResolutionEngine {
    sessions: Arc<SessionManager>,
    registry: Arc<ResolverRegistry>,
    cache: Arc<ResolutionCache>,
    retry: RetryPolicy,
    permits: Arc<Semaphore>,
}

impl ResolutionEngine {
    /// Creates an engine. The session manager and cache are shared, so one
    /// run can resolve several template sets against the same state.
    #[must_use]
    pub fn new(
        sessions: Arc<SessionManager>,
        registry: Arc<ResolverRegistry>,
        cache: Arc<ResolutionCache>,
        config: EngineConfig,
    ) -> Self {
        Self {
            sessions,
            registry,
            cache,
            retry: config.retry,
            permits: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
        }
    }

    /// The resolution cache.
    #[must_use]
    pub const fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    /// The session manager.
    #[must_use]
    pub const fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Resolves one reference through the cache.
    ///
    /// # Errors
    ///
    /// Returns the resolution failure, after retries for throttling.
    pub async fn resolve(&self, reference: &Reference) -> Result<String, ResolveError> {
        let key = reference.canonical_key();
        let sessions = Arc::clone(&self.sessions);
        let registry = Arc::clone(&self.registry);
        let permits = Arc::clone(&self.permits);
        let retry = self.retry.clone();
        let reference = reference.clone();

        self.cache
            .get_or_resolve(&key, move || async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| ResolveError::Unavailable {
                        service: reference.service.token().to_string(),
                        cause: "worker pool closed".to_string(),
                    })?;

                let (sessions, registry, reference) = (&sessions, &registry, &reference);
                retry
                    .run(reference.service.token(), |attempt| async move {
                        debug!(reference = %reference.canonical_key(), attempt, "resolving");
                        attempt_once(sessions, registry, reference).await
                    })
                    .await
            })
            .await
    }

    /// Resolves every distinct key among `references`.
    ///
    /// All keys are attempted even when some fail, so a caller sees every
    /// broken reference in one pass.
    pub async fn resolve_all(
        &self,
        references: &[Reference],
    ) -> HashMap<CanonicalKey, Result<String, ResolveError>> {
        let mut unique: HashMap<CanonicalKey, &Reference> = HashMap::new();
        for reference in references {
            unique.entry(reference.canonical_key()).or_insert(reference);
        }
        info!(
            references = references.len(),
            unique = unique.len(),
            "resolving references"
        );

        let lookups = unique.into_iter().map(|(key, reference)| async move {
            let result = self.resolve(reference).await;
            (key, result)
        });
        join_all(lookups).await.into_iter().collect()
    }
}

async fn attempt_once(
    sessions: &SessionManager,
    registry: &ResolverRegistry,
    reference: &Reference,
) -> Result<String, ResolveError> {
    registry.check(reference)?;
    let alias = reference.role_alias.as_deref();
    let session = sessions.get_session(alias).await?;
    match registry.resolve(reference, &session).await {
        Err(err @ ResolveError::Authorization { .. }) => {
            // The next lookup for this alias starts from a fresh exchange.
            sessions.invalidate(alias);
            Err(err)
        }
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::collections::BTreeMap;

    use kustforge_domain::{AliasTable, ErrorKind};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::placeholder::parse_references;
    use crate::ports::ClientError;
    use crate::testing::{FixtureClient, StaticProvider, UtcClock, db_instance, load_balancer};

    const DENIED_ROLE: &str = "arn:aws:iam::333333333333:role/locked";

    struct Harness {
        engine: ResolutionEngine,
        client: Arc<FixtureClient>,
        provider: Arc<StaticProvider>,
    }

    fn harness(client: FixtureClient, provider: StaticProvider, max_concurrency: usize) -> Harness {
        let aliases = AliasTable::new(
            BTreeMap::from([
                (
                    "staging".to_string(),
                    "arn:aws:iam::111111111111:role/deploy".to_string(),
                ),
                ("locked".to_string(), DENIED_ROLE.to_string()),
            ]),
            BTreeMap::new(),
            BTreeMap::new(),
        )
        .unwrap();
        let client = Arc::new(client);
        let provider = Arc::new(provider);
        let clock = Arc::new(UtcClock);
        let sessions = Arc::new(SessionManager::new(
            Arc::new(aliases),
            provider.clone(),
            clock.clone(),
        ));
        let engine = ResolutionEngine::new(
            sessions,
            Arc::new(ResolverRegistry::with_defaults(client.clone())),
            Arc::new(ResolutionCache::new(clock)),
            EngineConfig {
                max_concurrency,
                retry: RetryPolicy::default(),
            },
        );
        Harness {
            engine,
            client,
            provider,
        }
    }

    #[tokio::test]
    async fn test_repeated_key_resolves_once() {
        let h = harness(
            FixtureClient::default().with_resource(db_instance("mydb", "mydb.abc.rds.amazonaws.com")),
            StaticProvider::default(),
            DEFAULT_MAX_CONCURRENCY,
        );
        let references = parse_references(
            "a: {{ aws:rds:name=mydb,attr=endpoint }}\nb: {{aws:rds: name=mydb ,attr=endpoint}}\n",
        )
        .unwrap();

        let results = h.engine.resolve_all(&references).await;
        assert_eq!(results.len(), 1);
        assert_eq!(h.client.calls(), 1);

        // Same key from another template, later in the run.
        let again = h.engine.resolve(&references[1]).await.unwrap();
        assert_eq!(again, "mydb.abc.rds.amazonaws.com");
        assert_eq!(h.client.calls(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_attribute_fails_before_authenticating() {
        let h = harness(
            FixtureClient::default().with_resource(load_balancer("web")),
            StaticProvider::default(),
            DEFAULT_MAX_CONCURRENCY,
        );
        let references =
            parse_references("{{ aws:role=staging:alb:name=web,attr=color }}").unwrap();

        let err = h.engine.resolve(&references[0]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedAttribute);
        assert_eq!(h.provider.exchanges(), 0);
        assert_eq!(h.client.calls(), 0);
        assert_eq!(h.engine.sessions().exchange_count(), 0);
        assert_eq!(h.engine.cache().stats().misses, 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_with_single_worker() {
        let h = harness(
            FixtureClient::default()
                .with_resource(db_instance("mydb", "mydb.abc.rds.amazonaws.com"))
                .with_resource(load_balancer("web")),
            StaticProvider::default(),
            1,
        );
        let references = parse_references(
            "{{ aws:rds:name=mydb,attr=port }} {{ aws:alb:name=web,attr=dns }} {{ aws:rds:name=mydb,attr=arn }}",
        )
        .unwrap();

        let results = h.engine.resolve_all(&references).await;
        assert_eq!(results.len(), 3);
        assert!(results.values().all(Result::is_ok));
        assert_eq!(h.client.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_twice_then_succeeds() {
        let h = harness(
            FixtureClient::default()
                .with_resource(db_instance("mydb", "mydb.abc.rds.amazonaws.com"))
                .fail_next([
                    ClientError::Throttled("Rate exceeded".into()),
                    ClientError::Throttled("Rate exceeded".into()),
                ]),
            StaticProvider::default(),
            DEFAULT_MAX_CONCURRENCY,
        );
        let references = parse_references("{{ aws:rds:name=mydb,attr=endpoint }}").unwrap();

        let value = h.engine.resolve(&references[0]).await.unwrap();
        assert_eq!(value, "mydb.abc.rds.amazonaws.com");
        assert_eq!(h.client.calls(), 3);
    }

    #[tokio::test]
    async fn test_authorization_failure_is_not_retried_and_invalidates_session() {
        let h = harness(
            FixtureClient::default()
                .with_resource(db_instance("mydb", "mydb.abc.rds.amazonaws.com"))
                .fail_next([ClientError::AccessDenied("rds:DescribeDBInstances".into())]),
            StaticProvider::default(),
            DEFAULT_MAX_CONCURRENCY,
        );
        let references =
            parse_references("{{ aws:role=staging:rds:name=mydb,attr=endpoint }}").unwrap();

        let err = h.engine.resolve(&references[0]).await.unwrap_err();
        assert_eq!(
            err,
            ResolveError::Authorization {
                target: "arn:aws:iam::111111111111:role/deploy".to_string(),
                cause: "rds:DescribeDBInstances".to_string(),
            }
        );
        assert_eq!(h.client.calls(), 1);
        let exchanges = h.provider.exchanges();

        // Not cached as a failure, and the role session is re-established.
        let value = h.engine.resolve(&references[0]).await.unwrap();
        assert_eq!(value, "mydb.abc.rds.amazonaws.com");
        assert_eq!(h.provider.exchanges(), exchanges + 1);
    }

    #[tokio::test]
    async fn test_alias_failures_do_not_affect_other_aliases() {
        let h = harness(
            FixtureClient::default().with_resource(db_instance("mydb", "mydb.abc.rds.amazonaws.com")),
            StaticProvider::denying(DENIED_ROLE),
            DEFAULT_MAX_CONCURRENCY,
        );
        let references = parse_references(
            "{{ aws:role=locked:rds:name=mydb,attr=endpoint }}\n\
             {{ aws:role=locked:rds:name=mydb,attr=port }}\n\
             {{ aws:role=staging:rds:name=mydb,attr=port }}\n\
             {{ aws:role=unknown:rds:name=mydb,attr=port }}\n",
        )
        .unwrap();

        let results = h.engine.resolve_all(&references).await;
        let kind = |i: usize| {
            results[&references[i].canonical_key()]
                .as_ref()
                .err()
                .map(ResolveError::kind)
        };

        assert_eq!(kind(0), Some(ErrorKind::Authorization));
        assert_eq!(kind(1), Some(ErrorKind::Authorization));
        assert_eq!(kind(2), None);
        assert_eq!(kind(3), Some(ErrorKind::AliasNotFound));
    }
}
