//! Alias table for cross-account access
//!
//! Maps the short aliases used in `role=ALIAS:` clauses to what they stand
//! for: an IAM role to assume, an account to build a role ARN in, or a named
//! local profile. The table is loaded once per run and only read afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Alias configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasTable {
    /// alias -> role ARN
    #[serde(default)]
    role_mappings: BTreeMap<String, String>,

    /// alias -> account id
    #[serde(default)]
    account_mappings: BTreeMap<String, String>,

    /// alias -> profile name
    #[serde(default)]
    profile_mappings: BTreeMap<String, String>,
}

/// What an alias resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasTarget {
    /// Assume a role from the base session.
    Role {
        /// Role to assume.
        role_arn: String,
        /// Account owning the role, when known.
        account_id: Option<String>,
    },
    /// Open a session under a named profile, without role assumption.
    Profile {
        /// Profile name.
        profile: String,
    },
}

impl AliasTable {
    /// Builds and validates an alias table.
    ///
    /// # Errors
    ///
    /// Returns an error if an alias name is invalid or an alias is mapped to
    /// both a role and a profile.
    pub fn new(
        role_mappings: BTreeMap<String, String>,
        account_mappings: BTreeMap<String, String>,
        profile_mappings: BTreeMap<String, String>,
    ) -> DomainResult<Self> {
        let table = Self {
            role_mappings,
            account_mappings,
            profile_mappings,
        };
        table.validate()?;
        Ok(table)
    }

    /// Checks the table invariants.
    ///
    /// A table built through `Deserialize` skips [`AliasTable::new`], so
    /// loaders must call this.
    ///
    /// # Errors
    ///
    /// See [`AliasTable::new`].
    pub fn validate(&self) -> DomainResult<()> {
        let aliases = self
            .role_mappings
            .keys()
            .chain(self.account_mappings.keys())
            .chain(self.profile_mappings.keys());
        for alias in aliases {
            if !is_valid_alias(alias) {
                return Err(DomainError::InvalidAlias(alias.clone()));
            }
        }

        if let Some(alias) = self
            .role_mappings
            .keys()
            .find(|alias| self.profile_mappings.contains_key(*alias))
        {
            return Err(DomainError::AmbiguousAlias(alias.clone()));
        }

        // A role alias may repeat its account, but not name a different one.
        if let Some(alias) = self.role_mappings.iter().find_map(|(alias, role_arn)| {
            let account = self.account_mappings.get(alias)?;
            let from_arn = account_from_role_arn(role_arn)?;
            (from_arn != account.as_str()).then_some(alias)
        }) {
            return Err(DomainError::AmbiguousAlias(alias.clone()));
        }

        Ok(())
    }

    /// Resolves an alias.
    ///
    /// Profiles win over account-derived roles; explicit role mappings win
    /// over both. An alias only present in `account_mappings` becomes
    /// `arn:aws:iam::<account>:role/<alias>`.
    #[must_use]
    pub fn lookup(&self, alias: &str) -> Option<AliasTarget> {
        if let Some(role_arn) = self.role_mappings.get(alias) {
            let account_id = self
                .account_mappings
                .get(alias)
                .cloned()
                .or_else(|| account_from_role_arn(role_arn).map(String::from));
            return Some(AliasTarget::Role {
                role_arn: role_arn.clone(),
                account_id,
            });
        }

        if let Some(profile) = self.profile_mappings.get(alias) {
            return Some(AliasTarget::Profile {
                profile: profile.clone(),
            });
        }

        self.account_mappings
            .get(alias)
            .map(|account_id| AliasTarget::Role {
                role_arn: format!("arn:aws:iam::{account_id}:role/{alias}"),
                account_id: Some(account_id.clone()),
            })
    }

    /// Role mappings.
    #[must_use]
    pub const fn role_mappings(&self) -> &BTreeMap<String, String> {
        &self.role_mappings
    }

    /// Account mappings.
    #[must_use]
    pub const fn account_mappings(&self) -> &BTreeMap<String, String> {
        &self.account_mappings
    }

    /// Profile mappings.
    #[must_use]
    pub const fn profile_mappings(&self) -> &BTreeMap<String, String> {
        &self.profile_mappings
    }

    /// Number of distinct aliases.
    #[must_use]
    pub fn len(&self) -> usize {
        let mut names: Vec<&String> = self
            .role_mappings
            .keys()
            .chain(self.account_mappings.keys())
            .chain(self.profile_mappings.keys())
            .collect();
        names.sort();
        names.dedup();
        names.len()
    }

    /// Returns true if no alias is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.role_mappings.is_empty()
            && self.account_mappings.is_empty()
            && self.profile_mappings.is_empty()
    }
}

/// Extracts the account id from `arn:aws:iam::<account>:role/<name>`.
#[must_use]
pub fn account_from_role_arn(role_arn: &str) -> Option<&str> {
    let account = role_arn.split(':').nth(4)?;
    (!account.is_empty()).then_some(account)
}

/// Valid aliases: letters, digits, `_`, `-` and `.`.
#[must_use]
pub fn is_valid_alias(alias: &str) -> bool {
    !alias.is_empty()
        && alias
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
