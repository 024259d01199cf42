//! Alias table loading.
//!
//! ```yaml
//! role_mappings:
//!   staging: arn:aws:iam::111111111111:role/deploy
//! account_mappings:
//!   ReadOnly: "444455556666"
//! profile_mappings:
//!   dev: dev-sso
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use kustforge_application::ports::FileSystem;
use kustforge_domain::AliasTable;
use regex::Regex;
use serde::Deserialize;
use tracing::info;

use super::ConfigError;
use crate::serialization::from_yaml;

/// Shape of an IAM role ARN, in any partition.
pub const ROLE_ARN_PATTERN: &str = r"^arn:aws[a-z-]*:iam::\d{12}:role/[\w+=,.@/-]+$";

const ACCOUNT_ID_PATTERN: &str = r"^\d{12}$";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct AliasFile {
    role_mappings: BTreeMap<String, String>,
    account_mappings: BTreeMap<String, String>,
    profile_mappings: BTreeMap<String, String>,
}

/// Parses and validates an alias table.
///
/// # Errors
///
/// Returns an error for malformed YAML, role mappings that are not IAM role
/// ARNs, account mappings that are not account ids, invalid alias names, or
/// an alias with conflicting mappings.
pub fn parse_alias_table(text: &str, origin: &Path) -> Result<AliasTable, ConfigError> {
    let file: AliasFile = from_yaml(text).map_err(|source| ConfigError::Parse {
        path: origin.to_path_buf(),
        source,
    })?;

    let role_arn = Regex::new(ROLE_ARN_PATTERN).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    if let Some((alias, arn)) = file
        .role_mappings
        .iter()
        .find(|(_, arn)| !role_arn.is_match(arn))
    {
        return Err(ConfigError::InvalidRoleArn {
            alias: alias.clone(),
            arn: arn.clone(),
        });
    }

    let account_id =
        Regex::new(ACCOUNT_ID_PATTERN).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    if let Some((alias, account)) = file
        .account_mappings
        .iter()
        .find(|(_, account)| !account_id.is_match(account))
    {
        return Err(ConfigError::InvalidAccountId {
            alias: alias.clone(),
            account: account.clone(),
        });
    }

    Ok(AliasTable::new(
        file.role_mappings,
        file.account_mappings,
        file.profile_mappings,
    )?)
}

/// Loads the alias table at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails validation.
pub async fn load_alias_table<F: FileSystem>(fs: &F, path: &Path) -> Result<AliasTable, ConfigError> {
    let bytes = fs.read_file(path).await.map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let table = parse_alias_table(&String::from_utf8_lossy(&bytes), path)?;
    info!(path = %path.display(), aliases = table.len(), "alias table loaded");
    Ok(table)
}
