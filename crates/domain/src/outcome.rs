//! Results reported upward from a run

use std::fmt;
use std::ops::Range;

use crate::diff::TextDiff;
use crate::error::{ErrorKind, ResolveError};
use crate::template::TemplateId;

/// One broken reference, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceFailure {
    /// Template containing the reference.
    pub template: TemplateId,
    /// Placeholder text exactly as written.
    pub raw_text: String,
    /// Byte range of the placeholder.
    pub span: Range<usize>,
    /// What went wrong.
    pub error: ResolveError,
}

impl ReferenceFailure {
    /// Classification of the failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

impl fmt::Display for ReferenceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: [{}] {} ({})",
            self.template,
            self.span.start,
            self.kind(),
            self.raw_text,
            self.error
        )
    }
}

/// A fully rendered template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedOutput {
    /// Template identity.
    pub template: TemplateId,
    /// Rendered text.
    pub content: String,
    /// Diff against the snapshot that was current before this run.
    pub diff: TextDiff,
}

/// Diff of one template against its last applied snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDiff {
    /// Template identity.
    pub template: TemplateId,
    /// Line changes.
    pub diff: TextDiff,
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every template rendered and applied.
    Success(Vec<RenderedOutput>),
    /// Every template rendered; diffs only, nothing written.
    DiffOnly(Vec<TemplateDiff>),
    /// At least one reference failed; nothing rendered or written.
    Failure(Vec<ReferenceFailure>),
}

impl RunOutcome {
    /// True for [`RunOutcome::Failure`].
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// The failures, if any.
    #[must_use]
    pub fn failures(&self) -> &[ReferenceFailure] {
        match self {
            Self::Failure(failures) => failures,
            _ => &[],
        }
    }
}
