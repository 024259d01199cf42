//! Configuration errors.

use std::path::PathBuf;

use kustforge_application::ports::FileSystemError;
use kustforge_domain::DomainError;

use crate::serialization::SerializationError;

/// Errors raised while loading settings, alias tables or inventories.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: FileSystemError,
    },

    /// The file is not valid YAML for the expected shape.
    #[error("cannot parse {path}: {source}")]
    Parse {
        /// File that was being parsed.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: SerializationError,
    },

    /// An environment variable holds an unusable value.
    #[error("invalid value for {name}: '{value}'")]
    InvalidEnv {
        /// Variable name.
        name: String,
        /// Offending value.
        value: String,
    },

    /// A role mapping is not an IAM role ARN.
    #[error("alias '{alias}' maps to '{arn}', which is not an IAM role ARN")]
    InvalidRoleArn {
        /// Alias being mapped.
        alias: String,
        /// Offending ARN.
        arn: String,
    },

    /// An account mapping is not a 12 digit account id.
    #[error("alias '{alias}' maps to '{account}', which is not an account id")]
    InvalidAccountId {
        /// Alias being mapped.
        alias: String,
        /// Offending account id.
        account: String,
    },

    /// A setting is out of range.
    #[error("invalid setting: {0}")]
    Invalid(String),

    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] DomainError),
}
