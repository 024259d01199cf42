//! ECR repositories

use std::sync::Arc;

use async_trait::async_trait;
use kustforge_domain::{ResolveError, Service, Session};
use tracing::debug;

use super::{Resolver, Selectors, check_attribute, client_error, required_selector, single};
use crate::ports::{DescribeRequest, ResourceClient, ResourceDescription};

const ATTRIBUTES: &[&str] = &["url", "arn", "name", "authToken", "auth"];

/// Resolves `ecr:name=<repository>`.
///
/// `authToken` is registry-wide: it is fetched for the session's account and
/// does not look at the repository.
pub struct EcrResolver {
    client: Arc<dyn ResourceClient>,
}

impl EcrResolver {
    /// Creates the resolver.
    #[must_use]
    pub fn new(client: Arc<dyn ResourceClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Resolver for EcrResolver {
    fn service(&self) -> Service {
        Service::Ecr
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
        check_attribute(Service::Ecr, ATTRIBUTES, attribute)?;

        if matches!(attribute, "authToken" | "auth") {
            debug!("requesting registry authorization token");
            return self
                .client
                .registry_authorization_token(session)
                .await
                .map_err(|err| client_error(Service::Ecr, selectors, session, err));
        }

        let name = required_selector(Service::Ecr, selectors, "name")?;
        debug!(name, attribute, "describing repository");
        let request = DescribeRequest::Repository {
            name: name.to_string(),
        };
        let found = self
            .client
            .describe(session, &request)
            .await
            .map_err(|err| client_error(Service::Ecr, selectors, session, err))?;

        let repositories = found
            .into_iter()
            .filter_map(|resource| match resource {
                ResourceDescription::Repository(repo) => Some(repo),
                _ => None,
            })
            .collect();
        let repo = single(Service::Ecr, selectors, repositories)?;

        Ok(match attribute {
            "url" => repo.uri,
            "arn" => repo.arn,
            _ => repo.name,
        })
    }
}
