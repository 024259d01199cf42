//! Parsed placeholder references
//!
//! A [`Reference`] describes one `{{ aws:... }}` occurrence in a template:
//! which service to ask, how to select the resource, which attribute to read,
//! and where in the source text the placeholder sits.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Remote service a reference is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    /// Relational Database Service instances.
    Rds,
    /// ElastiCache clusters.
    ElastiCache,
    /// Application load balancers.
    Alb,
    /// Elastic Container Registry repositories.
    Ecr,
    /// Secrets Manager secrets.
    SecretsManager,
    /// Certificate Manager certificates.
    Acm,
}

impl Service {
    /// Every supported service, in registration order.
    pub const ALL: [Self; 6] = [
        Self::Rds,
        Self::ElastiCache,
        Self::Alb,
        Self::Ecr,
        Self::SecretsManager,
        Self::Acm,
    ];

    /// Token used for this service inside placeholders.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Rds => "rds",
            Self::ElastiCache => "elasticache",
            Self::Alb => "alb",
            Self::Ecr => "ecr",
            Self::SecretsManager => "secret",
            Self::Acm => "acm",
        }
    }

    /// Looks up a service by its placeholder token.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|service| service.token() == token)
    }

    /// Selector keys that must be present.
    #[must_use]
    pub const fn required_selectors(self) -> &'static [&'static str] {
        match self {
            Self::Rds | Self::Alb | Self::Ecr | Self::SecretsManager => &["name"],
            Self::ElastiCache => &["cluster"],
            Self::Acm => &["domain"],
        }
    }

    /// Selector keys that may be present.
    #[must_use]
    pub const fn optional_selectors(self) -> &'static [&'static str] {
        match self {
            Self::SecretsManager => &["key"],
            _ => &[],
        }
    }

    /// Returns true if `key` is a known selector for this service.
    #[must_use]
    pub fn accepts_selector(self, key: &str) -> bool {
        self.required_selectors().contains(&key) || self.optional_selectors().contains(&key)
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A parsed placeholder.
///
/// References are immutable value objects created by one parse pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Optional role alias from a `role=ALIAS:` clause.
    pub role_alias: Option<String>,

    /// Service to query.
    pub service: Service,

    /// Selectors in the order they were written.
    pub selectors: IndexMap<String, String>,

    /// Attribute to extract.
    pub attribute: String,

    /// The placeholder exactly as written, delimiters and whitespace included.
    pub raw_text: String,

    /// Byte range of `raw_text` in the template.
    pub span: Range<usize>,
}

impl Reference {
    /// Returns a selector value by key.
    #[must_use]
    pub fn selector(&self, key: &str) -> Option<&str> {
        self.selectors.get(key).map(String::as_str)
    }

    /// Returns the order-independent identity of this reference.
    #[must_use]
    pub fn canonical_key(&self) -> CanonicalKey {
        CanonicalKey {
            role_alias: self.role_alias.clone(),
            service: self.service,
            selectors: self
                .selectors
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            attribute: self.attribute.clone(),
        }
    }
}

/// Renders selectors as `k1=v1,k2=v2` in key order.
#[must_use]
pub fn describe_selectors<'a>(selectors: impl IntoIterator<Item = (&'a String, &'a String)>) -> String {
    let sorted: BTreeMap<&String, &String> = selectors.into_iter().collect();
    sorted
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Identity of a reference for deduplication.
///
/// Two references with the same alias, service, selectors (in any order) and
/// attribute share a key and are resolved once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey {
    /// Role alias, if any.
    pub role_alias: Option<String>,
    /// Service.
    pub service: Service,
    /// Selectors sorted by key.
    pub selectors: BTreeMap<String, String>,
    /// Attribute.
    pub attribute: String,
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}:{}#{}",
            self.role_alias.as_deref().unwrap_or("default"),
            self.service,
            describe_selectors(&self.selectors),
            self.attribute
        )
    }
}
