//! Secrets Manager secrets

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use kustforge_domain::{ResolveError, Service, Session};
use tracing::debug;

use super::{Resolver, Selectors, check_attribute, client_error, required_selector};
use crate::ports::{ResourceClient, SecretValue};

const ATTRIBUTES: &[&str] = &["value"];

/// Resolves `secret:name=<secret>[,key=<json-field>]`.
///
/// Without `key` the whole secret string is returned; binary secrets are
/// returned base64 encoded. With `key` the secret must be a JSON object and
/// the named top-level field is returned, strings unquoted.
pub struct SecretsResolver {
    client: Arc<dyn ResourceClient>,
}

impl SecretsResolver {
    /// Creates the resolver.
    #[must_use]
    pub fn new(client: Arc<dyn ResourceClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Resolver for SecretsResolver {
    fn service(&self) -> Service {
        Service::SecretsManager
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
        check_attribute(Service::SecretsManager, ATTRIBUTES, attribute)?;
        let name = required_selector(Service::SecretsManager, selectors, "name")?;

        // Never log the value.
        debug!(name, "reading secret");
        let secret = self
            .client
            .get_secret(session, name)
            .await
            .map_err(|err| client_error(Service::SecretsManager, selectors, session, err))?;

        let Some(key) = selectors.get("key") else {
            return Ok(match secret {
                SecretValue::Text(text) => text,
                SecretValue::Binary(bytes) => STANDARD.encode(bytes),
            });
        };

        let not_found = |reason: &str| ResolveError::ResourceNotFound {
            service: Service::SecretsManager,
            selector: format!("name={name},key={key} ({reason})"),
        };

        let SecretValue::Text(text) = secret else {
            return Err(not_found("binary secret has no keys"));
        };
        let document: serde_json::Value =
            serde_json::from_str(&text).map_err(|_| not_found("secret is not JSON"))?;
        let field = document
            .as_object()
            .and_then(|object| object.get(key))
            .ok_or_else(|| not_found("no such key"))?;

        Ok(match field {
            serde_json::Value::String(value) => value.clone(),
            other => other.to_string(),
        })
    }
}
