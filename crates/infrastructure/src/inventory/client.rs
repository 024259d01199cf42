//! Inventory-backed resource client.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use kustforge_application::ports::{
    ClientError, DescribeRequest, ResourceClient, ResourceDescription, SecretValue,
};
use kustforge_domain::Session;
use tracing::debug;

use super::{Inventory, InventorySecret};

/// [`ResourceClient`] answering from an [`Inventory`].
#[derive(Debug, Clone)]
pub struct InventoryClient {
    inventory: Arc<Inventory>,
}

impl InventoryClient {
    /// Creates a client over `inventory`.
    #[must_use]
    pub const fn new(inventory: Arc<Inventory>) -> Self {
        Self { inventory }
    }
}

#[async_trait]
impl ResourceClient for InventoryClient {
    async fn describe(
        &self,
        session: &Session,
        request: &DescribeRequest,
    ) -> Result<Vec<ResourceDescription>, ClientError> {
        let inv = &self.inventory;
        let matches: Vec<ResourceDescription> = match request {
            DescribeRequest::DbInstance { identifier } => inv
                .rds
                .iter()
                .filter(|db| &db.identifier == identifier)
                .cloned()
                .map(ResourceDescription::DbInstance)
                .collect(),
            DescribeRequest::CacheCluster { cluster_id } => inv
                .elasticache
                .iter()
                .filter(|cluster| &cluster.cluster_id == cluster_id)
                .cloned()
                .map(ResourceDescription::CacheCluster)
                .collect(),
            DescribeRequest::LoadBalancer { name } => inv
                .alb
                .iter()
                .filter(|lb| &lb.name == name)
                .cloned()
                .map(ResourceDescription::LoadBalancer)
                .collect(),
            DescribeRequest::Repository { name } => inv
                .ecr
                .iter()
                .filter(|repo| &repo.name == name)
                .cloned()
                .map(ResourceDescription::Repository)
                .collect(),
            DescribeRequest::Certificate { domain } => inv
                .acm
                .iter()
                .filter(|cert| cert.domain.eq_ignore_ascii_case(domain))
                .cloned()
                .map(ResourceDescription::Certificate)
                .collect(),
        };

        debug!(
            service = %request.service(),
            identity = %session.identity,
            matches = matches.len(),
            "inventory describe"
        );
        Ok(matches)
    }

    async fn get_secret(&self, session: &Session, name: &str) -> Result<SecretValue, ClientError> {
        debug!(identity = %session.identity, "inventory secret read");
        match self.inventory.secrets.get(name) {
            Some(InventorySecret::Text(text)) => Ok(SecretValue::Text(text.clone())),
            Some(InventorySecret::Binary { binary }) => STANDARD
                .decode(binary.as_bytes())
                .map(SecretValue::Binary)
                .map_err(|e| ClientError::Other(format!("secret '{name}' is not valid base64: {e}"))),
            None => Err(ClientError::NotFound(format!(
                "Secrets Manager can't find the specified secret '{name}'"
            ))),
        }
    }

    async fn registry_authorization_token(&self, _session: &Session) -> Result<String, ClientError> {
        self.inventory
            .registry_token
            .clone()
            .ok_or_else(|| ClientError::NotFound("no registry authorization token".to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use chrono::Utc;
    use kustforge_domain::{Credentials, Identity};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::inventory::tests::sample;

    fn session() -> Session {
        Session::new(
            Credentials::new("AKIA", "secret", None),
            Utc::now(),
            Identity::Default,
        )
    }

    fn client() -> InventoryClient {
        InventoryClient::new(Arc::new(sample()))
    }

    #[tokio::test]
    async fn test_describe_by_identifier() {
        let found = client()
            .describe(
                &session(),
                &DescribeRequest::DbInstance {
                    identifier: "mydb".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        let ResourceDescription::DbInstance(db) = &found[0] else {
            panic!("expected a db instance, got {found:?}");
        };
        assert_eq!(db.endpoint.port, 5432);
    }

    #[tokio::test]
    async fn test_describe_returns_every_match() {
        let found = client()
            .describe(
                &session(),
                &DescribeRequest::Certificate {
                    domain: "DUP.example.com".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 2);

        let none = client()
            .describe(
                &session(),
                &DescribeRequest::LoadBalancer {
                    name: "ghost".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_secrets() {
        let client = client();
        assert_eq!(
            client.get_secret(&session(), "plain").await.unwrap(),
            SecretValue::Text("just-text".to_string())
        );
        assert_eq!(
            client.get_secret(&session(), "app/cert").await.unwrap(),
            SecretValue::Binary(vec![0, 159, 146, 150])
        );
        assert!(matches!(
            client.get_secret(&session(), "missing").await,
            Err(ClientError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_registry_token() {
        assert_eq!(
            client().registry_authorization_token(&session()).await.unwrap(),
            "QVdTOnRva2Vu"
        );
        let empty = InventoryClient::new(Arc::new(Inventory::default()));
        assert!(matches!(
            empty.registry_authorization_token(&session()).await,
            Err(ClientError::NotFound(_))
        ));
    }
}
