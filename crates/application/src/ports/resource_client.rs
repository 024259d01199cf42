//! Resource client port
//!
//! The capability boundary to the cloud SDK. The engine only needs to
//! describe resources and read secrets; how requests are signed and
//! transported is the adapter's business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use kustforge_domain::{Service, Session};

/// Errors surfaced by the SDK boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The remote side reports that the resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller is not allowed to perform the operation.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Credentials are missing, malformed or expired.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Rate limited.
    #[error("throttled: {0}")]
    Throttled(String),

    /// The call did not complete in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

/// What to describe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DescribeRequest {
    /// RDS instance by identifier.
    DbInstance {
        /// DB instance identifier.
        identifier: String,
    },
    /// ElastiCache cluster by id.
    CacheCluster {
        /// Cache cluster id.
        cluster_id: String,
    },
    /// Load balancer by name.
    LoadBalancer {
        /// Load balancer name.
        name: String,
    },
    /// ECR repository by name.
    Repository {
        /// Repository name.
        name: String,
    },
    /// ACM certificates for a domain.
    Certificate {
        /// Domain name on the certificate.
        domain: String,
    },
}

impl DescribeRequest {
    /// Service the request targets.
    #[must_use]
    pub const fn service(&self) -> Service {
        match self {
            Self::DbInstance { .. } => Service::Rds,
            Self::CacheCluster { .. } => Service::ElastiCache,
            Self::LoadBalancer { .. } => Service::Alb,
            Self::Repository { .. } => Service::Ecr,
            Self::Certificate { .. } => Service::Acm,
        }
    }
}

/// Host and port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// DNS name.
    pub address: String,
    /// TCP port.
    pub port: u16,
}

/// RDS instance description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbInstance {
    /// Instance identifier.
    pub identifier: String,
    /// Connection endpoint.
    pub endpoint: Endpoint,
    /// Instance ARN.
    pub arn: String,
}

/// ElastiCache cluster description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheCluster {
    /// Cluster id.
    pub cluster_id: String,
    /// Cluster ARN.
    pub arn: String,
    /// Configuration endpoint for cluster-mode deployments.
    #[serde(default)]
    pub configuration_endpoint: Option<Endpoint>,
    /// Per-node endpoints.
    #[serde(default)]
    pub nodes: Vec<Endpoint>,
}

/// Load balancer description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancer {
    /// Load balancer name.
    pub name: String,
    /// Public DNS name.
    pub dns_name: String,
    /// Load balancer ARN.
    pub arn: String,
    /// Route 53 hosted zone of the DNS name.
    pub canonical_hosted_zone_id: String,
}

/// ECR repository description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Repository name.
    pub name: String,
    /// Repository URI for image references.
    pub uri: String,
    /// Repository ARN.
    pub arn: String,
}

/// ACM certificate summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Primary domain name.
    pub domain: String,
    /// Certificate ARN.
    pub arn: String,
}

/// One described resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceDescription {
    /// An RDS instance.
    DbInstance(DbInstance),
    /// An ElastiCache cluster.
    CacheCluster(CacheCluster),
    /// A load balancer.
    LoadBalancer(LoadBalancer),
    /// An ECR repository.
    Repository(Repository),
    /// An ACM certificate.
    Certificate(Certificate),
}

/// Payload of a secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretValue {
    /// `SecretString`.
    Text(String),
    /// `SecretBinary`.
    Binary(Vec<u8>),
}

/// Port for reading remote resources.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Describes every resource matching the request.
    ///
    /// An empty list means nothing matched; it is up to the caller to decide
    /// what more than one match means.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote call fails.
    async fn describe(
        &self,
        session: &Session,
        request: &DescribeRequest,
    ) -> Result<Vec<ResourceDescription>, ClientError>;

    /// Reads the current version of a secret.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret does not exist or cannot be read.
    async fn get_secret(&self, session: &Session, name: &str) -> Result<SecretValue, ClientError>;

    /// Returns the base64 registry authorization token for the session's
    /// account.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be obtained.
    async fn registry_authorization_token(&self, session: &Session) -> Result<String, ClientError>;
}
