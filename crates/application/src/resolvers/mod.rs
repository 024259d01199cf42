//! Per-service resolvers
//!
//! A [`Resolver`] turns selectors plus an attribute into a value for one
//! service. The [`ResolverRegistry`] is a fixed table keyed by
//! [`Service`]; adding a resource type means registering one more resolver.

mod acm;
mod alb;
mod ecr;
mod elasticache;
mod rds;
mod secrets;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use kustforge_domain::reference::describe_selectors;
use kustforge_domain::{Reference, ResolveError, Service, Session};

use crate::ports::{ClientError, ResourceClient};

pub use acm::AcmResolver;
pub use alb::AlbResolver;
pub use ecr::EcrResolver;
pub use elasticache::ElastiCacheResolver;
pub use rds::RdsResolver;
pub use secrets::SecretsResolver;

/// Selectors as written in the placeholder.
pub type Selectors = IndexMap<String, String>;

/// Fetches one attribute of one remote resource.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Service this resolver handles.
    fn service(&self) -> Service;

    /// Attribute names this resolver understands.
    fn attributes(&self) -> &'static [&'static str];

    /// Resolves `attribute` of the resource identified by `selectors`.
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` if nothing matches, `AmbiguousSelector` if several
    /// resources match, `UnsupportedAttribute` for unknown attributes, and
    /// the mapped remote failure otherwise.
    async fn resolve(
        &self,
        selectors: &Selectors,
        attribute: &str,
        session: &Session,
    ) -> Result<String, ResolveError>;
}

/// Fixed dispatch table from service to resolver.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    resolvers: BTreeMap<Service, Arc<dyn Resolver>>,
}

impl ResolverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with one resolver per supported service, all backed by
    /// `client`.
    #[must_use]
    pub fn with_defaults(client: Arc<dyn ResourceClient>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(RdsResolver::new(Arc::clone(&client))));
        registry.register(Arc::new(ElastiCacheResolver::new(Arc::clone(&client))));
        registry.register(Arc::new(AlbResolver::new(Arc::clone(&client))));
        registry.register(Arc::new(EcrResolver::new(Arc::clone(&client))));
        registry.register(Arc::new(SecretsResolver::new(Arc::clone(&client))));
        registry.register(Arc::new(AcmResolver::new(client)));
        registry
    }

    /// Registers a resolver, replacing any previous one for its service.
    pub fn register(&mut self, resolver: Arc<dyn Resolver>) -> Option<Arc<dyn Resolver>> {
        self.resolvers.insert(resolver.service(), resolver)
    }

    /// Looks up the resolver for a service.
    #[must_use]
    pub fn get(&self, service: Service) -> Option<&Arc<dyn Resolver>> {
        self.resolvers.get(&service)
    }

    fn resolver_for(&self, reference: &Reference) -> Result<&Arc<dyn Resolver>, ResolveError> {
        self.get(reference.service)
            .ok_or_else(|| ResolveError::Unavailable {
                service: reference.service.token().to_string(),
                cause: "no resolver registered".to_string(),
            })
    }

    /// Checks that a resolver exists for the reference and offers its
    /// attribute, without touching the network.
    ///
    /// # Errors
    ///
    /// `UnsupportedAttribute` for an attribute the resolver does not list,
    /// `Unavailable` if no resolver is registered.
    pub fn check(&self, reference: &Reference) -> Result<(), ResolveError> {
        let resolver = self.resolver_for(reference)?;
        check_attribute(reference.service, resolver.attributes(), &reference.attribute)
    }

    /// Dispatches a reference to its service's resolver.
    ///
    /// # Errors
    ///
    /// Propagates the resolver's error, or `Unavailable` if no resolver is
    /// registered for the service.
    pub async fn resolve(
        &self,
        reference: &Reference,
        session: &Session,
    ) -> Result<String, ResolveError> {
        self.resolver_for(reference)?
            .resolve(&reference.selectors, &reference.attribute, session)
            .await
    }
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.resolvers.keys()).finish()
    }
}

/// Reads a selector the parser guarantees, failing as not found otherwise.
pub(crate) fn required_selector<'a>(
    service: Service,
    selectors: &'a Selectors,
    key: &str,
) -> Result<&'a str, ResolveError> {
    selectors
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| ResolveError::ResourceNotFound {
            service,
            selector: format!("missing '{key}' in {}", describe_selectors(selectors)),
        })
}

/// Fails unless `attribute` is one of `supported`.
pub(crate) fn check_attribute(
    service: Service,
    supported: &[&str],
    attribute: &str,
) -> Result<(), ResolveError> {
    if supported.contains(&attribute) {
        Ok(())
    } else {
        Err(unsupported(service, attribute))
    }
}

pub(crate) fn unsupported(service: Service, attribute: &str) -> ResolveError {
    ResolveError::UnsupportedAttribute {
        service,
        attribute: attribute.to_string(),
    }
}

/// Exactly one match, or the matching selector error.
pub(crate) fn single<T>(
    service: Service,
    selectors: &Selectors,
    mut matches: Vec<T>,
) -> Result<T, ResolveError> {
    match matches.len() {
        0 => Err(ResolveError::ResourceNotFound {
            service,
            selector: describe_selectors(selectors),
        }),
        1 => Ok(matches.remove(0)),
        count => Err(ResolveError::AmbiguousSelector {
            service,
            selector: describe_selectors(selectors),
            count,
        }),
    }
}

/// Translates an SDK failure into the resolution taxonomy.
pub(crate) fn client_error(
    service: Service,
    selectors: &Selectors,
    session: &Session,
    err: ClientError,
) -> ResolveError {
    match err {
        ClientError::NotFound(_) => ResolveError::ResourceNotFound {
            service,
            selector: describe_selectors(selectors),
        },
        ClientError::AccessDenied(cause) => ResolveError::Authorization {
            target: session
                .identity
                .role_arn()
                .map_or_else(|| session.identity.principal(), String::from),
            cause,
        },
        ClientError::InvalidCredentials(cause) => ResolveError::Authentication {
            principal: session.identity.principal(),
            cause,
        },
        ClientError::Throttled(cause) => ResolveError::Throttling {
            service: service.token().to_string(),
            attempts: 1,
            cause,
        },
        ClientError::Timeout(cause) | ClientError::Other(cause) => ResolveError::Unavailable {
            service: service.token().to_string(),
            cause,
        },
    }
}
