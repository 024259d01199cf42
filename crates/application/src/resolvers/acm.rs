//! ACM certificates

use std::sync::Arc;

use async_trait::async_trait;
use kustforge_domain::{ResolveError, Service, Session};

use super::{Resolver, Selectors, check_attribute, client_error, required_selector, single};
use crate::ports::{DescribeRequest, ResourceClient, ResourceDescription};

const ATTRIBUTES: &[&str] = &["arn"];

/// Resolves `acm:domain=<domain-name>`.
pub struct AcmResolver {
    client: Arc<dyn ResourceClient>,
}

impl AcmResolver {
    /// Creates the resolver.
    #[must_use]
    pub fn new(client: Arc<dyn ResourceClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Resolver for AcmResolver {
    fn service(&self) -> Service {
        Service::Acm
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
        check_attribute(Service::Acm, ATTRIBUTES, attribute)?;
        let domain = required_selector(Service::Acm, selectors, "domain")?;

        let request = DescribeRequest::Certificate {
            domain: domain.to_string(),
        };
        let found = self
            .client
            .describe(session, &request)
            .await
            .map_err(|err| client_error(Service::Acm, selectors, session, err))?;

        let certificates = found
            .into_iter()
            .filter_map(|resource| match resource {
                ResourceDescription::Certificate(cert) => Some(cert),
                _ => None,
            })
            .collect();
        Ok(single(Service::Acm, selectors, certificates)?.arn)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::testing::{FixtureClient, certificate, selectors, session};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_certificate_arn() {
        let resolver = AcmResolver::new(Arc::new(
            FixtureClient::default().with_resource(certificate("*.example.com", "abc-123")),
        ));
        assert_eq!(
            resolver
                .resolve(&selectors(&[("domain", "*.example.com")]), "arn", &session())
                .await
                .unwrap(),
            "arn:aws:acm:us-east-1:123456789012:certificate/abc-123"
        );
    }

    #[tokio::test]
    async fn test_two_certificates_for_one_domain() {
        let resolver = AcmResolver::new(Arc::new(
            FixtureClient::default()
                .with_resource(certificate("api.example.com", "old"))
                .with_resource(certificate("api.example.com", "new")),
        ));
        let err = resolver
            .resolve(&selectors(&[("domain", "api.example.com")]), "arn", &session())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), kustforge_domain::ErrorKind::AmbiguousSelector);
    }
}
