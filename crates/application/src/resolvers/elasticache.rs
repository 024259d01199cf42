//! ElastiCache clusters

use std::sync::Arc;

use async_trait::async_trait;
use kustforge_domain::reference::describe_selectors;
use kustforge_domain::{ResolveError, Service, Session};
use tracing::debug;

use super::{Resolver, Selectors, check_attribute, client_error, required_selector, single};
use crate::ports::{DescribeRequest, ResourceClient, ResourceDescription};

const ATTRIBUTES: &[&str] = &["endpoint", "port", "arn"];

/// Resolves `elasticache:cluster=<cluster-id>`.
///
/// `endpoint` and `port` come from the configuration endpoint when the
/// cluster has one, otherwise from its first node.
pub struct ElastiCacheResolver {
    client: Arc<dyn ResourceClient>,
}

impl ElastiCacheResolver {
    /// Creates the resolver.
    #[must_use]
    pub fn new(client: Arc<dyn ResourceClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Resolver for ElastiCacheResolver {
    fn service(&self) -> Service {
        Service::ElastiCache
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
        check_attribute(Service::ElastiCache, ATTRIBUTES, attribute)?;
        let cluster_id = required_selector(Service::ElastiCache, selectors, "cluster")?;

        debug!(cluster_id, attribute, "describing cache cluster");
        let request = DescribeRequest::CacheCluster {
            cluster_id: cluster_id.to_string(),
        };
        let found = self
            .client
            .describe(session, &request)
            .await
            .map_err(|err| client_error(Service::ElastiCache, selectors, session, err))?;

        let clusters = found
            .into_iter()
            .filter_map(|resource| match resource {
                ResourceDescription::CacheCluster(cluster) => Some(cluster),
                _ => None,
            })
            .collect();
        let cluster = single(Service::ElastiCache, selectors, clusters)?;

        if attribute == "arn" {
            return Ok(cluster.arn);
        }

        let endpoint = cluster
            .configuration_endpoint
            .or_else(|| cluster.nodes.into_iter().next())
            .ok_or_else(|| ResolveError::ResourceNotFound {
                service: Service::ElastiCache,
                selector: format!("{} (no cache nodes)", describe_selectors(selectors)),
            })?;

        Ok(match attribute {
            "endpoint" => endpoint.address,
            _ => endpoint.port.to_string(),
        })
    }
}
