//! RDS instances

use std::sync::Arc;

use async_trait::async_trait;
use kustforge_domain::{ResolveError, Service, Session};
use tracing::debug;

use super::{Resolver, Selectors, check_attribute, client_error, required_selector, single};
use crate::ports::{DescribeRequest, ResourceClient, ResourceDescription};

const ATTRIBUTES: &[&str] = &["endpoint", "port", "arn"];

/// Resolves `rds:name=<instance-id>`.
pub struct RdsResolver {
    client: Arc<dyn ResourceClient>,
}

impl RdsResolver {
    /// Creates the resolver.
    #[must_use]
    pub fn new(client: Arc<dyn ResourceClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Resolver for RdsResolver {
    fn service(&self) -> Service {
        Service::Rds
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
        check_attribute(Service::Rds, ATTRIBUTES, attribute)?;
        let identifier = required_selector(Service::Rds, selectors, "name")?;

        debug!(identifier, attribute, "describing db instance");
        let request = DescribeRequest::DbInstance {
            identifier: identifier.to_string(),
        };
        let found = self
            .client
            .describe(session, &request)
            .await
            .map_err(|err| client_error(Service::Rds, selectors, session, err))?;

        let instances = found
            .into_iter()
            .filter_map(|resource| match resource {
                ResourceDescription::DbInstance(db) => Some(db),
                _ => None,
            })
            .collect();
        let db = single(Service::Rds, selectors, instances)?;

        Ok(match attribute {
            "endpoint" => db.endpoint.address,
            "port" => db.endpoint.port.to_string(),
            _ => db.arn,
        })
    }
}
