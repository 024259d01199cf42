//! Inventory-backed credential provider.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use kustforge_application::ports::{ClientError, Clock, CredentialProvider, IssuedCredentials};
use kustforge_domain::{Credentials, Session};
use tracing::debug;
use uuid::Uuid;

use super::CredentialInventory;

const DEFAULT_ROLE_SESSION_SECS: u32 = 3600;

/// [`CredentialProvider`] answering from the inventory's credential section.
///
/// Long-term keys carry no expiry. Assumed roles get freshly minted
/// temporary credentials unless the role is listed as denied.
pub struct InventoryCredentialProvider {
    credentials: CredentialInventory,
    clock: Arc<dyn Clock>,
}

impl InventoryCredentialProvider {
    /// Creates a provider over `credentials`.
    #[must_use]
    pub fn new(credentials: CredentialInventory, clock: Arc<dyn Clock>) -> Self {
        Self { credentials, clock }
    }

    fn role_session(&self) -> Duration {
        let secs = self
            .credentials
            .role_session_secs
            .unwrap_or(DEFAULT_ROLE_SESSION_SECS);
        Duration::seconds(i64::from(secs))
    }
}

fn temporary_credentials() -> Credentials {
    let key = Uuid::now_v7().simple().to_string().to_ascii_uppercase();
    Credentials::new(
        format!("ASIA{}", &key[key.len() - 16..]),
        Uuid::now_v7().simple().to_string(),
        Some(Uuid::now_v7().simple().to_string()),
    )
}

#[async_trait]
impl CredentialProvider for InventoryCredentialProvider {
    async fn default_credentials(&self) -> Result<IssuedCredentials, ClientError> {
        let keys = self.credentials.default.as_ref().ok_or_else(|| {
            ClientError::InvalidCredentials("no default credentials configured".to_string())
        })?;
        Ok(IssuedCredentials {
            credentials: keys.to_credentials(),
            expires_at: None,
        })
    }

    async fn profile_credentials(&self, profile: &str) -> Result<IssuedCredentials, ClientError> {
        let keys = self.credentials.profiles.get(profile).ok_or_else(|| {
            ClientError::InvalidCredentials(format!("the config profile ({profile}) could not be found"))
        })?;
        Ok(IssuedCredentials {
            credentials: keys.to_credentials(),
            expires_at: None,
        })
    }

    async fn assume_role(
        &self,
        role_arn: &str,
        base: &Session,
    ) -> Result<IssuedCredentials, ClientError> {
        if self.credentials.denied_roles.iter().any(|denied| denied == role_arn) {
            return Err(ClientError::AccessDenied(format!(
                "{} is not authorized to perform: sts:AssumeRole on resource: {role_arn}",
                base.identity.principal()
            )));
        }

        let expires_at = self.clock.now() + self.role_session();
        debug!(role = role_arn, from = %base.identity, %expires_at, "role assumed");
        Ok(IssuedCredentials {
            credentials: temporary_credentials(),
            expires_at: Some(expires_at),
        })
    }
}
