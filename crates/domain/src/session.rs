//! Authenticated sessions
//!
//! A [`Session`] is a time-bounded credential set for one account, role or
//! profile. Sessions are owned by the session manager; resolvers only borrow
//! them for the duration of a lookup.

use std::fmt;

use chrono::{DateTime, Duration, Utc};

/// Temporary (or long-lived) access credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Session token for temporary credentials.
    pub session_token: Option<String>,
}

impl Credentials {
    /// Creates a credential set.
    #[must_use]
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Who a session acts as.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Default profile or ambient credentials.
    Default,
    /// A named profile.
    Profile {
        /// Profile name.
        profile: String,
    },
    /// A role assumed from the base session.
    AssumedRole {
        /// Account owning the role, when known.
        account_id: Option<String>,
        /// The assumed role.
        role_arn: String,
    },
}

impl Identity {
    /// Account id, profile name or `default`.
    #[must_use]
    pub fn principal(&self) -> String {
        match self {
            Self::Default => "default".to_string(),
            Self::Profile { profile } => profile.clone(),
            Self::AssumedRole {
                account_id,
                role_arn,
            } => account_id.clone().unwrap_or_else(|| role_arn.clone()),
        }
    }

    /// Role ARN for assumed roles.
    #[must_use]
    pub fn role_arn(&self) -> Option<&str> {
        match self {
            Self::AssumedRole { role_arn, .. } => Some(role_arn),
            _ => None,
        }
    }

    /// Cache key for sessions of this identity.
    #[must_use]
    pub fn session_key(&self) -> SessionKey {
        SessionKey {
            principal: self.principal(),
            role_arn: self.role_arn().map(String::from),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default credentials"),
            Self::Profile { profile } => write!(f, "profile {profile}"),
            Self::AssumedRole { role_arn, .. } => write!(f, "role {role_arn}"),
        }
    }
}

/// `(account-or-profile, role-or-none)` pair identifying a cached session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey {
    /// Account id, profile name or `default`.
    pub principal: String,
    /// Assumed role, if any.
    pub role_arn: Option<String>,
}

/// An authenticated, time-bounded credential set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Credentials to sign requests with.
    pub credentials: Credentials,
    /// Authoritative expiry reported by the credential exchange.
    pub expires_at: DateTime<Utc>,
    /// Who this session acts as.
    pub identity: Identity,
}

impl Session {
    /// Creates a session.
    #[must_use]
    pub const fn new(credentials: Credentials, expires_at: DateTime<Utc>, identity: Identity) -> Self {
        Self {
            credentials,
            expires_at,
            identity,
        }
    }

    /// True while `now < expires_at - skew`.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        now < self.expires_at - skew
    }

    /// Seconds until expiry, negative once expired.
    #[must_use]
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds()
    }
}
