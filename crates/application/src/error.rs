//! Application error types

use kustforge_domain::{DomainError, ErrorKind};
use thiserror::Error;

use crate::ports::{FileSystemError, SnapshotError};

/// Application-level errors.
///
/// Per-reference resolution failures are not errors at this level; they are
/// collected into a [`kustforge_domain::RunOutcome::Failure`]. These variants
/// cover what stops a run from producing an outcome at all.
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// A domain invariant was violated.
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    /// A snapshot operation failed.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Reading or writing a file failed.
    #[error("file system error: {0}")]
    FileSystem(#[from] FileSystemError),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApplicationError {
    /// Classification, for errors that belong to the reported taxonomy.
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Snapshot(err) => err.kind(),
            _ => None,
        }
    }
}

/// Result type alias for application operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
