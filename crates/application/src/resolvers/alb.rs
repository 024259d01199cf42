//! Application load balancers

use std::sync::Arc;

use async_trait::async_trait;
use kustforge_domain::{ResolveError, Service, Session};
use tracing::debug;

use super::{Resolver, Selectors, check_attribute, client_error, required_selector, single};
use crate::ports::{DescribeRequest, ResourceClient, ResourceDescription};

const ATTRIBUTES: &[&str] = &["dns", "arn", "zoneId", "zone_id"];

/// Resolves `alb:name=<load-balancer-name>`.
pub struct AlbResolver {
    client: Arc<dyn ResourceClient>,
}

impl AlbResolver {
    /// Creates the resolver.
    #[must_use]
    pub fn new(client: Arc<dyn ResourceClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Resolver for AlbResolver {
    fn service(&self) -> Service {
        Service::Alb
    }

    fn attributes(&self) -> &'static [&'static str] {
        ATTRIBUTES
    }

    async fn resolve(
        &self,
        selectors: &Selectors,
        attribute: &str,
        session: &Session,
    ) -> Result<String, ResolveError> {
        check_attribute(Service::Alb, ATTRIBUTES, attribute)?;
        let name = required_selector(Service::Alb, selectors, "name")?;

        debug!(name, attribute, "describing load balancer");
        let request = DescribeRequest::LoadBalancer {
            name: name.to_string(),
        };
        let found = self
            .client
            .describe(session, &request)
            .await
            .map_err(|err| client_error(Service::Alb, selectors, session, err))?;

        let balancers = found
            .into_iter()
            .filter_map(|resource| match resource {
                ResourceDescription::LoadBalancer(lb) => Some(lb),
                _ => None,
            })
            .collect();
        let lb = single(Service::Alb, selectors, balancers)?;

        Ok(match attribute {
            "dns" => lb.dns_name,
            "arn" => lb.arn,
            _ => lb.canonical_hosted_zone_id,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::testing::{FixtureClient, load_balancer, selectors, session};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_dns_and_zone_aliases() {
        let resolver =
            AlbResolver::new(Arc::new(FixtureClient::default().with_resource(load_balancer("web"))));
        let sel = selectors(&[("name", "web")]);

        assert_eq!(
            resolver.resolve(&sel, "dns", &session()).await.unwrap(),
            "web-123.us-east-1.elb.amazonaws.com"
        );
        assert_eq!(
            resolver.resolve(&sel, "zoneId", &session()).await.unwrap(),
            resolver.resolve(&sel, "zone_id", &session()).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_endpoint_is_not_an_alb_attribute() {
        let resolver = AlbResolver::new(Arc::new(FixtureClient::default()));
        let err = resolver
            .resolve(&selectors(&[("name", "web")]), "endpoint", &session())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), kustforge_domain::ErrorKind::UnsupportedAttribute);
    }
}
