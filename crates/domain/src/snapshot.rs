//! Applied output snapshots

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::template::TemplateId;

/// The rendered output of one successful apply.
///
/// Snapshots are never merged: each apply supersedes the previous one, which
/// is kept as the rollback baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Unique, time-ordered identifier.
    pub id: Uuid,
    /// Template the snapshot belongs to.
    pub template: TemplateId,
    /// Exact bytes that were applied.
    pub content: Vec<u8>,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
}

impl Snapshot {
    /// Takes a snapshot of `content` at `taken_at`.
    #[must_use]
    pub fn new(template: TemplateId, content: impl Into<Vec<u8>>, taken_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            template,
            content: content.into(),
            taken_at,
        }
    }

    /// Content as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}
