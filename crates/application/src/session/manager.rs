//! Per-alias session cache.
//!
//! Sessions are keyed by `(account-or-profile, role-or-none)`. Each key has its
//! own async lock, so only one authentication exchange per alias is in flight
//! while different aliases authenticate concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Duration;
use kustforge_domain::{AliasTable, AliasTarget, Identity, ResolveError, Session, SessionKey};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::ports::{ClientError, Clock, CredentialProvider, IssuedCredentials};

/// Default safety margin before expiry.
pub const DEFAULT_REFRESH_SKEW_SECS: i64 = 300;

/// Lifetime assumed when an exchange does not report an expiry.
pub const DEFAULT_SESSION_LIFETIME_SECS: i64 = 3600;

const STS: &str = "sts";

#[derive(Debug, Default)]
enum SessionSlot {
    #[default]
    Empty,
    Ready(Session),
    /// Authentication or authorization failure, kept until invalidated so
    /// every pending lookup for the alias fails the same way.
    Failed(ResolveError),
}

type SharedSlot = Arc<tokio::sync::Mutex<SessionSlot>>;

/// Hands out authenticated sessions for role aliases.
pub struct SessionManager {
    aliases: Arc<AliasTable>,
    provider: Arc<dyn CredentialProvider>,
    clock: Arc<dyn Clock>,
    refresh_skew: Duration,
    slots: Mutex<HashMap<SessionKey, SharedSlot>>,
    exchanges: AtomicUsize,
}

impl SessionManager {
    /// Creates a session manager with the default 5 minute refresh skew.
    #[must_use]
    pub fn new(
        aliases: Arc<AliasTable>,
        provider: Arc<dyn CredentialProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            aliases,
            provider,
            clock,
            refresh_skew: Duration::seconds(DEFAULT_REFRESH_SKEW_SECS),
            slots: Mutex::new(HashMap::new()),
            exchanges: AtomicUsize::new(0),
        }
    }

    /// Sets the margin before expiry at which sessions are renewed.
    #[must_use]
    pub const fn with_refresh_skew(mut self, refresh_skew: Duration) -> Self {
        self.refresh_skew = refresh_skew;
        self
    }

    /// Returns the identity an alias maps to.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::AliasNotFound`] if the alias is not configured.
    pub fn identity_for(&self, alias: Option<&str>) -> Result<Identity, ResolveError> {
        let Some(alias) = alias else {
            return Ok(Identity::Default);
        };
        match self.aliases.lookup(alias) {
            Some(AliasTarget::Role {
                role_arn,
                account_id,
            }) => Ok(Identity::AssumedRole {
                account_id,
                role_arn,
            }),
            Some(AliasTarget::Profile { profile }) => Ok(Identity::Profile { profile }),
            None => Err(ResolveError::AliasNotFound {
                alias: alias.to_string(),
            }),
        }
    }

    /// Returns a session for `alias`, or the base session when `None`.
    ///
    /// A cached session is returned while `now < expires_at - skew`;
    /// otherwise the caller waits for a fresh exchange.
    ///
    /// # Errors
    ///
    /// Returns `AliasNotFound`, `Authentication` or `Authorization` errors, or
    /// `Throttling`/`Unavailable` if the credential source could not be
    /// reached.
    pub async fn get_session(&self, alias: Option<&str>) -> Result<Session, ResolveError> {
        let identity = self.identity_for(alias)?;
        // Single hop: roles are always assumed from the base session.
        let base = match identity {
            Identity::AssumedRole { .. } => Some(self.session_for(Identity::Default, None).await?),
            _ => None,
        };
        self.session_for(identity, base.as_ref()).await
    }

    async fn session_for(
        &self,
        identity: Identity,
        base: Option<&Session>,
    ) -> Result<Session, ResolveError> {
        let key = identity.session_key();
        let slot = self.slot(&key);
        let mut guard = slot.lock().await;

        match &*guard {
            SessionSlot::Ready(session) if session.is_fresh(self.clock.now(), self.refresh_skew) => {
                debug!(identity = %identity, "session cache hit");
                return Ok(session.clone());
            }
            SessionSlot::Failed(err) => return Err(err.clone()),
            SessionSlot::Ready(_) => debug!(identity = %identity, "session near expiry, renewing"),
            SessionSlot::Empty => {}
        }

        match self.authenticate(&identity, base).await {
            Ok(session) => {
                *guard = SessionSlot::Ready(session.clone());
                Ok(session)
            }
            Err(err) => {
                warn!(identity = %identity, error = %err, "authentication failed");
                if matches!(
                    err,
                    ResolveError::Authentication { .. } | ResolveError::Authorization { .. }
                ) {
                    *guard = SessionSlot::Failed(err.clone());
                }
                Err(err)
            }
        }
    }

    async fn authenticate(
        &self,
        identity: &Identity,
        base: Option<&Session>,
    ) -> Result<Session, ResolveError> {
        let issued = match identity {
            Identity::Default => {
                self.exchanges.fetch_add(1, Ordering::SeqCst);
                self.provider
                    .default_credentials()
                    .await
                    .map_err(|err| authentication_error(identity, err))?
            }
            Identity::Profile { profile } => {
                self.exchanges.fetch_add(1, Ordering::SeqCst);
                self.provider
                    .profile_credentials(profile)
                    .await
                    .map_err(|err| authentication_error(identity, err))?
            }
            Identity::AssumedRole { role_arn, .. } => {
                let base = base.ok_or_else(|| ResolveError::Authentication {
                    principal: role_arn.clone(),
                    cause: "no base session to assume the role from".to_string(),
                })?;
                self.exchanges.fetch_add(1, Ordering::SeqCst);
                self.provider
                    .assume_role(role_arn, base)
                    .await
                    .map_err(|err| assume_role_error(role_arn, err))?
            }
        };

        let session = self.session_from(issued, identity.clone());
        let now = self.clock.now();
        if !session.is_fresh(now, self.refresh_skew) {
            return Err(ResolveError::Authentication {
                principal: identity.principal(),
                cause: format!(
                    "credentials expire in {}s, inside the {}s refresh window",
                    session.seconds_until_expiry(now),
                    self.refresh_skew.num_seconds()
                ),
            });
        }
        info!(
            identity = %identity,
            expires_in_secs = session.seconds_until_expiry(self.clock.now()),
            "authenticated"
        );
        Ok(session)
    }

    fn session_from(&self, issued: IssuedCredentials, identity: Identity) -> Session {
        let expires_at = issued.expires_at.unwrap_or_else(|| {
            self.clock.now() + Duration::seconds(DEFAULT_SESSION_LIFETIME_SECS)
        });
        Session::new(issued.credentials, expires_at, identity)
    }

    fn slot(&self, key: &SessionKey) -> SharedSlot {
        let mut slots = self.slots.lock();
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    /// Drops the cached session (or remembered failure) for `alias`.
    pub fn invalidate(&self, alias: Option<&str>) {
        if let Ok(identity) = self.identity_for(alias) {
            let key = identity.session_key();
            if self.slots.lock().remove(&key).is_some() {
                debug!(identity = %identity, "session invalidated");
            }
        }
    }

    /// Number of credential exchanges performed so far.
    #[must_use]
    pub fn exchange_count(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }
}

fn authentication_error(identity: &Identity, err: ClientError) -> ResolveError {
    match err {
        ClientError::Throttled(cause) => ResolveError::Throttling {
            service: STS.to_string(),
            attempts: 1,
            cause,
        },
        ClientError::Timeout(cause) => ResolveError::Unavailable {
            service: STS.to_string(),
            cause,
        },
        other => ResolveError::Authentication {
            principal: identity.principal(),
            cause: other.to_string(),
        },
    }
}

fn assume_role_error(role_arn: &str, err: ClientError) -> ResolveError {
    match err {
        ClientError::AccessDenied(cause) => ResolveError::Authorization {
            target: role_arn.to_string(),
            cause,
        },
        ClientError::Throttled(cause) => ResolveError::Throttling {
            service: STS.to_string(),
            attempts: 1,
            cause,
        },
        ClientError::Timeout(cause) => ResolveError::Unavailable {
            service: STS.to_string(),
            cause,
        },
        other => ResolveError::Authentication {
            principal: role_arn.to_string(),
            cause: other.to_string(),
        },
    }
}
