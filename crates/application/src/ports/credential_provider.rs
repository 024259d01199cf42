//! Credential source port

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use kustforge_domain::{Credentials, Session};

use super::ClientError;

/// Credentials handed out by one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCredentials {
    /// The credentials.
    pub credentials: Credentials,
    /// Expiry reported by the exchange, if it reported one.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Port for obtaining credentials.
///
/// Each call is one remote (or local) authentication exchange. Caching is the
/// session manager's job, not the provider's.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Default profile or ambient credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if no base credentials are available.
    async fn default_credentials(&self) -> Result<IssuedCredentials, ClientError>;

    /// Credentials of a named profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile does not exist or cannot sign in.
    async fn profile_credentials(&self, profile: &str) -> Result<IssuedCredentials, ClientError>;

    /// Temporary credentials for `role_arn`, requested with `base`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AccessDenied`] if the trust policy or the
    /// caller's permissions reject the assumption.
    async fn assume_role(
        &self,
        role_arn: &str,
        base: &Session,
    ) -> Result<IssuedCredentials, ClientError>;
}
