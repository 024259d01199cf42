//! Snapshot store port
//!
//! Persists applied output per template as an ordered history, newest last.

use async_trait::async_trait;

use kustforge_domain::{ErrorKind, Snapshot, TemplateId};

/// Errors that can occur during snapshot operations.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Rollback was requested but there is no earlier snapshot.
    #[error("no snapshot to roll back to for {0}")]
    NoSnapshot(TemplateId),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SnapshotError {
    /// Classification, for errors that belong to the reported taxonomy.
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::NoSnapshot(_) => Some(ErrorKind::NoSnapshot),
            _ => None,
        }
    }
}

/// Repository trait for applied snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// The most recently applied snapshot, if any.
    async fn current(&self, template: &TemplateId) -> Result<Option<Snapshot>, SnapshotError>;

    /// Output already on disk for a template that has no history yet, such
    /// as a hand-written manifest. Used as the diff baseline.
    async fn existing_output(&self, _template: &TemplateId) -> Result<Option<Vec<u8>>, SnapshotError> {
        Ok(None)
    }

    /// All retained snapshots, oldest first.
    async fn history(&self, template: &TemplateId) -> Result<Vec<Snapshot>, SnapshotError>;

    /// Makes `snapshot` the current one.
    ///
    /// Either the new snapshot fully replaces the current one or nothing
    /// changes. The previous snapshot is retained for rollback; on a first
    /// commit, existing output is retained as the baseline.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be persisted.
    async fn commit(&self, snapshot: &Snapshot) -> Result<(), SnapshotError>;

    /// Drops the current snapshot and returns the one below it, which
    /// becomes current.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::NoSnapshot`] when fewer than two snapshots
    /// exist.
    async fn rollback(&self, template: &TemplateId) -> Result<Snapshot, SnapshotError>;

    /// Keeps only the newest `keep` snapshots. Returns how many were dropped.
    async fn prune(&self, template: &TemplateId, keep: usize) -> Result<usize, SnapshotError>;
}
