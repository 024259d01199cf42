//! Offline resource inventory
//!
//! A YAML document describing the resources, secrets and credentials an
//! account would return. It backs both the [`ResourceClient`] and the
//! [`CredentialProvider`] ports, so templates can be rendered without network
//! access and integration tests run against a fixed world.
//!
//! ```yaml
//! credentials:
//!   default: { access_key_id: AKIAEXAMPLE, secret_access_key: secret }
//!   profiles:
//!     dev-sso: { access_key_id: AKIADEV, secret_access_key: secret }
//!   denied_roles: [arn:aws:iam::333333333333:role/locked]
//! rds:
//!   - identifier: mydb
//!     endpoint: { address: mydb.abc.us-east-1.rds.amazonaws.com, port: 5432 }
//!     arn: arn:aws:rds:us-east-1:111111111111:db:mydb
//! secrets:
//!   app/db: '{"username":"app","password":"hunter2"}'
//!   app/cert: { binary: AJ+Slg== }
//! registry_token: QVdTOnRva2Vu
//! ```
//!
//! [`ResourceClient`]: kustforge_application::ports::ResourceClient
//! [`CredentialProvider`]: kustforge_application::ports::CredentialProvider

mod client;
mod credentials;

use std::collections::BTreeMap;
use std::path::Path;

use kustforge_application::ports::{
    CacheCluster, Certificate, DbInstance, FileSystem, LoadBalancer, Repository,
};
use kustforge_domain::Credentials;
use serde::Deserialize;
use tracing::info;

use crate::config::ConfigError;
use crate::serialization::from_yaml;

pub use client::InventoryClient;
pub use credentials::InventoryCredentialProvider;

/// Long-term key pair as written in the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StaticCredentials {
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Session token, for pre-issued temporary credentials.
    #[serde(default)]
    pub session_token: Option<String>,
}

impl StaticCredentials {
    fn to_credentials(&self) -> Credentials {
        Credentials::new(
            self.access_key_id.clone(),
            self.secret_access_key.clone(),
            self.session_token.clone(),
        )
    }
}

/// Credential sources.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CredentialInventory {
    /// Ambient credentials. Absent means there are none.
    pub default: Option<StaticCredentials>,
    /// Named profiles.
    pub profiles: BTreeMap<String, StaticCredentials>,
    /// Roles whose trust policy rejects every caller.
    pub denied_roles: Vec<String>,
    /// Lifetime of assumed-role credentials, one hour when unset.
    pub role_session_secs: Option<u32>,
}

/// A stored secret.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum InventorySecret {
    /// `SecretString`.
    Text(String),
    /// `SecretBinary`, base64 encoded in the file.
    Binary {
        /// Base64 payload.
        binary: String,
    },
}

/// Everything the offline adapters can return.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Inventory {
    /// Credential sources.
    pub credentials: CredentialInventory,
    /// RDS instances.
    pub rds: Vec<DbInstance>,
    /// ElastiCache clusters.
    pub elasticache: Vec<CacheCluster>,
    /// Load balancers.
    pub alb: Vec<LoadBalancer>,
    /// ECR repositories.
    pub ecr: Vec<Repository>,
    /// ACM certificates.
    pub acm: Vec<Certificate>,
    /// Secrets by name.
    pub secrets: BTreeMap<String, InventorySecret>,
    /// Registry authorization token handed out for ECR.
    pub registry_token: Option<String>,
}

impl Inventory {
    /// Parses an inventory from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML does not describe an inventory.
    pub fn from_yaml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        from_yaml(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Loads the inventory at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load<F: FileSystem>(fs: &F, path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs.read_file(path).await.map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let inventory = Self::from_yaml_str(&String::from_utf8_lossy(&bytes), path)?;
        info!(
            path = %path.display(),
            resources = inventory.resource_count(),
            secrets = inventory.secrets.len(),
            "inventory loaded"
        );
        Ok(inventory)
    }

    /// Number of described resources, secrets excluded.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.rds.len() + self.elasticache.len() + self.alb.len() + self.ecr.len() + self.acm.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
pub(crate) mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    pub(crate) const SAMPLE: &str = r#"
credentials:
  default: { access_key_id: AKIADEFAULT, secret_access_key: s3cr3t }
  profiles:
    dev-sso: { access_key_id: AKIADEV, secret_access_key: s3cr3t, session_token: tok }
  denied_roles: [ "arn:aws:iam::333333333333:role/locked" ]
  role_session_secs: 900
rds:
  - identifier: mydb
    endpoint: { address: mydb.abc.us-east-1.rds.amazonaws.com, port: 5432 }
    arn: arn:aws:rds:us-east-1:111111111111:db:mydb
elasticache:
  - cluster_id: sessions
    arn: arn:aws:elasticache:us-east-1:111111111111:cluster:sessions
    nodes:
      - { address: sessions-0001.cache.amazonaws.com, port: 6379 }
alb:
  - name: web
    dns_name: web-123.us-east-1.elb.amazonaws.com
    arn: arn:aws:elasticloadbalancing:us-east-1:111111111111:loadbalancer/app/web/abc
    canonical_hosted_zone_id: Z35SXDOTRQ7X7K
ecr:
  - name: api
    uri: 111111111111.dkr.ecr.us-east-1.amazonaws.com/api
    arn: arn:aws:ecr:us-east-1:111111111111:repository/api
acm:
  - domain: example.com
    arn: arn:aws:acm:us-east-1:111111111111:certificate/one
  - domain: dup.example.com
    arn: arn:aws:acm:us-east-1:111111111111:certificate/two
  - domain: dup.example.com
    arn: arn:aws:acm:us-east-1:111111111111:certificate/three
secrets:
  app/db: '{"username":"app","password":"hunter2","port":5432}'
  plain: just-text
  app/cert: { binary: "AJ+Slg==" }
registry_token: QVdTOnRva2Vu
"#;

    pub(crate) fn sample() -> Inventory {
        Inventory::from_yaml_str(SAMPLE, Path::new("inventory.yaml")).unwrap()
    }

    #[test]
    fn test_sample_parses() {
        let inventory = sample();
        assert_eq!(inventory.resource_count(), 7);
        assert_eq!(
            inventory.secrets.get("app/cert"),
            Some(&InventorySecret::Binary {
                binary: "AJ+Slg==".to_string()
            })
        );
        assert_eq!(inventory.credentials.role_session_secs, Some(900));
        assert_eq!(inventory.elasticache[0].configuration_endpoint, None);
    }

    #[test]
    fn test_unknown_section_is_rejected() {
        let err = Inventory::from_yaml_str("lambda: []\n", Path::new("inventory.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
