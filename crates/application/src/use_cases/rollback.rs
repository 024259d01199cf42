//! Rollback use case.

use std::sync::Arc;

use kustforge_domain::{RunState, Snapshot, TemplateId};
use tracing::info;

use crate::error::ApplicationResult;
use crate::ports::SnapshotStore;

/// Result of a rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackTemplateOutput {
    /// The snapshot that is current again.
    pub restored: Snapshot,
    /// Final state of the run.
    pub state: RunState,
}

/// Use case for restoring the snapshot applied before the current one.
pub struct RollbackTemplate<S: SnapshotStore> {
    snapshots: Arc<S>,
}

impl<S: SnapshotStore> RollbackTemplate<S> {
    /// Creates a new `RollbackTemplate` use case.
    #[must_use]
    pub const fn new(snapshots: Arc<S>) -> Self {
        Self { snapshots }
    }

    /// Rolls `template` back by one apply.
    ///
    /// # Errors
    ///
    /// Returns a `NoSnapshot` error when there is no earlier snapshot, or a
    /// storage error.
    pub async fn execute(&self, template: &TemplateId) -> ApplicationResult<RollbackTemplateOutput> {
        let restored = self.snapshots.rollback(template).await?;
        let state = RunState::Applied.transition(RunState::RolledBack)?;
        info!(template = %template, snapshot = %restored.id, "rolled back");
        Ok(RollbackTemplateOutput { restored, state })
    }
}
