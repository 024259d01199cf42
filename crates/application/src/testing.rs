//! In-memory ports for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use kustforge_domain::{Credentials, Identity, Session, Snapshot, TemplateId};
use parking_lot::Mutex;

use crate::ports::{
    CacheCluster, Certificate, ClientError, CredentialProvider, DbInstance, DescribeRequest,
    Endpoint, IssuedCredentials, LoadBalancer, Repository, ResourceClient, ResourceDescription,
    SecretValue, SnapshotError, SnapshotStore,
};

/// Serves fixed resources and counts every call. Scripted failures are
/// returned, in order, before any real answer.
#[derive(Default)]
pub struct FixtureClient {
    resources: Vec<ResourceDescription>,
    secrets: HashMap<String, SecretValue>,
    token: String,
    failures: Mutex<VecDeque<ClientError>>,
    calls: AtomicUsize,
}

impl FixtureClient {
    pub fn with_resource(mut self, resource: ResourceDescription) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_secret(mut self, name: &str, value: SecretValue) -> Self {
        self.secrets.insert(name.to_string(), value);
        self
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = token.to_string();
        self
    }

    pub fn fail_next(self, errors: impl IntoIterator<Item = ClientError>) -> Self {
        self.failures.lock().extend(errors);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn begin(&self) -> Result<(), ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.failures.lock().pop_front().map_or(Ok(()), Err)
    }
}

fn matches(request: &DescribeRequest, resource: &ResourceDescription) -> bool {
    match (request, resource) {
        (DescribeRequest::DbInstance { identifier }, ResourceDescription::DbInstance(db)) => {
            &db.identifier == identifier
        }
        (DescribeRequest::CacheCluster { cluster_id }, ResourceDescription::CacheCluster(c)) => {
            &c.cluster_id == cluster_id
        }
        (DescribeRequest::LoadBalancer { name }, ResourceDescription::LoadBalancer(lb)) => {
            &lb.name == name
        }
        (DescribeRequest::Repository { name }, ResourceDescription::Repository(repo)) => {
            &repo.name == name
        }
        (DescribeRequest::Certificate { domain }, ResourceDescription::Certificate(cert)) => {
            &cert.domain == domain
        }
        _ => false,
    }
}

#[async_trait]
impl ResourceClient for FixtureClient {
    async fn describe(
        &self,
        _session: &Session,
        request: &DescribeRequest,
    ) -> Result<Vec<ResourceDescription>, ClientError> {
        self.begin()?;
        tokio::task::yield_now().await;
        Ok(self
            .resources
            .iter()
            .filter(|resource| matches(request, resource))
            .cloned()
            .collect())
    }

    async fn get_secret(&self, _session: &Session, name: &str) -> Result<SecretValue, ClientError> {
        self.begin()?;
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("secret {name}")))
    }

    async fn registry_authorization_token(&self, _session: &Session) -> Result<String, ClientError> {
        self.begin()?;
        Ok(self.token.clone())
    }
}

/// Issues one-hour credentials for everything except `denied` role ARNs.
#[derive(Default)]
pub struct StaticProvider {
    denied: Vec<String>,
    exchanges: AtomicUsize,
}

impl StaticProvider {
    pub fn denying(role_arn: &str) -> Self {
        Self {
            denied: vec![role_arn.to_string()],
            exchanges: AtomicUsize::new(0),
        }
    }

    pub fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    fn issue(&self, key: &str) -> IssuedCredentials {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        IssuedCredentials {
            credentials: Credentials::new(key, "secret", Some("token".to_string())),
            expires_at: Some(Utc::now() + Duration::hours(1)),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticProvider {
    async fn default_credentials(&self) -> Result<IssuedCredentials, ClientError> {
        Ok(self.issue("AKIADEFAULT"))
    }

    async fn profile_credentials(&self, profile: &str) -> Result<IssuedCredentials, ClientError> {
        Ok(self.issue(&format!("AKIA{profile}")))
    }

    async fn assume_role(
        &self,
        role_arn: &str,
        _base: &Session,
    ) -> Result<IssuedCredentials, ClientError> {
        if self.denied.iter().any(|denied| denied == role_arn) {
            self.exchanges.fetch_add(1, Ordering::SeqCst);
            return Err(ClientError::AccessDenied(format!(
                "not authorized to assume {role_arn}"
            )));
        }
        Ok(self.issue("ASIAROLE"))
    }
}

/// Wall clock.
pub struct UtcClock;

impl crate::ports::Clock for UtcClock {
    fn now(&self) -> chrono::DateTime<Utc> {
        Utc::now()
    }
}

pub fn session() -> Session {
    Session::new(
        Credentials::new("AKIATEST", "secret", None),
        Utc::now() + Duration::hours(1),
        Identity::Default,
    )
}

pub fn db_instance(identifier: &str, address: &str) -> ResourceDescription {
    ResourceDescription::DbInstance(DbInstance {
        identifier: identifier.to_string(),
        endpoint: Endpoint {
            address: address.to_string(),
            port: 5432,
        },
        arn: format!("arn:aws:rds:us-east-1:123456789012:db:{identifier}"),
    })
}

pub fn cache_cluster(cluster_id: &str, configuration: Option<&str>, nodes: &[&str]) -> ResourceDescription {
    ResourceDescription::CacheCluster(CacheCluster {
        cluster_id: cluster_id.to_string(),
        arn: format!("arn:aws:elasticache:us-east-1:123456789012:cluster:{cluster_id}"),
        configuration_endpoint: configuration.map(|address| Endpoint {
            address: address.to_string(),
            port: 11211,
        }),
        nodes: nodes
            .iter()
            .map(|address| Endpoint {
                address: (*address).to_string(),
                port: 6379,
            })
            .collect(),
    })
}

pub fn load_balancer(name: &str) -> ResourceDescription {
    ResourceDescription::LoadBalancer(LoadBalancer {
        name: name.to_string(),
        dns_name: format!("{name}-123.us-east-1.elb.amazonaws.com"),
        arn: format!(
            "arn:aws:elasticloadbalancing:us-east-1:123456789012:loadbalancer/app/{name}/abc"
        ),
        canonical_hosted_zone_id: "Z35SXDOTRQ7X7K".to_string(),
    })
}

pub fn repository(name: &str) -> ResourceDescription {
    ResourceDescription::Repository(Repository {
        name: name.to_string(),
        uri: format!("123456789012.dkr.ecr.us-east-1.amazonaws.com/{name}"),
        arn: format!("arn:aws:ecr:us-east-1:123456789012:repository/{name}"),
    })
}

pub fn certificate(domain: &str, id: &str) -> ResourceDescription {
    ResourceDescription::Certificate(Certificate {
        domain: domain.to_string(),
        arn: format!("arn:aws:acm:us-east-1:123456789012:certificate/{id}"),
    })
}

pub fn selectors(pairs: &[(&str, &str)]) -> crate::resolvers::Selectors {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// Snapshot history per template, newest last.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    history: Mutex<HashMap<TemplateId, Vec<Snapshot>>>,
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn current(&self, template: &TemplateId) -> Result<Option<Snapshot>, SnapshotError> {
        Ok(self
            .history
            .lock()
            .get(template)
            .and_then(|history| history.last().cloned()))
    }

    async fn history(&self, template: &TemplateId) -> Result<Vec<Snapshot>, SnapshotError> {
        Ok(self.history.lock().get(template).cloned().unwrap_or_default())
    }

    async fn commit(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        self.history
            .lock()
            .entry(snapshot.template.clone())
            .or_default()
            .push(snapshot.clone());
        Ok(())
    }

    async fn rollback(&self, template: &TemplateId) -> Result<Snapshot, SnapshotError> {
        let mut all = self.history.lock();
        let history = all.entry(template.clone()).or_default();
        if history.len() < 2 {
            return Err(SnapshotError::NoSnapshot(template.clone()));
        }
        history.pop();
        history
            .last()
            .cloned()
            .ok_or_else(|| SnapshotError::NoSnapshot(template.clone()))
    }

    async fn prune(&self, template: &TemplateId, keep: usize) -> Result<usize, SnapshotError> {
        let mut all = self.history.lock();
        let history = all.entry(template.clone()).or_default();
        let dropped = history.len().saturating_sub(keep);
        history.drain(..dropped);
        Ok(dropped)
    }
}

/// Engine over `client` with no aliases and default tuning.
pub fn engine(client: std::sync::Arc<FixtureClient>) -> std::sync::Arc<crate::ResolutionEngine> {
    use std::sync::Arc;

    let clock: Arc<UtcClock> = Arc::new(UtcClock);
    let sessions = crate::SessionManager::new(
        Arc::new(kustforge_domain::AliasTable::default()),
        Arc::new(StaticProvider::default()),
        clock.clone(),
    );
    Arc::new(crate::ResolutionEngine::new(
        Arc::new(sessions),
        Arc::new(crate::ResolverRegistry::with_defaults(client)),
        Arc::new(crate::ResolutionCache::new(clock)),
        crate::EngineConfig::default(),
    ))
}
