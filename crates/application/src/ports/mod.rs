//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the resolution engine and the outside
//! world: the cloud SDK, credential sources, snapshot persistence, the file
//! system and the clock. Adapters in the infrastructure layer implement them.

mod clock;
mod credential_provider;
mod file_system;
mod resource_client;
mod snapshot_store;

pub use clock::Clock;
pub use credential_provider::{CredentialProvider, IssuedCredentials};
pub use file_system::{FileSystem, FileSystemError};
pub use resource_client::{
    CacheCluster, Certificate, ClientError, DbInstance, DescribeRequest, Endpoint, LoadBalancer,
    Repository, ResourceClient, ResourceDescription, SecretValue,
};
pub use snapshot_store::{SnapshotError, SnapshotStore};

#[cfg(test)]
pub(crate) use clock::testing::ManualClock;
