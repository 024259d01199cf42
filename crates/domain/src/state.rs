//! Per-template run state machine.
//!
//! ```text
//! Parsed -> Resolving -> Rendered -> DiffOnly
//!                                 -> Applied -> RolledBack
//! ```
//!
//! A run whose resolution fails stays in `Resolving` and never reaches
//! `Rendered`, so previously applied state is left untouched.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Where a template is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// References extracted.
    #[default]
    Parsed,
    /// Remote lookups in progress.
    Resolving,
    /// Every reference substituted.
    Rendered,
    /// Diff computed, nothing written.
    DiffOnly,
    /// New snapshot committed.
    Applied,
    /// Previous snapshot restored.
    RolledBack,
}

impl RunState {
    /// Whether `next` directly follows `self`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Parsed, Self::Resolving)
                | (Self::Resolving, Self::Rendered)
                | (Self::Rendered, Self::DiffOnly | Self::Applied)
                | (Self::Applied, Self::RolledBack)
        )
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transition is not part of the state machine.
    pub fn transition(self, next: Self) -> DomainResult<Self> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    /// No further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::DiffOnly | Self::RolledBack)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Parsed => "parsed",
            Self::Resolving => "resolving",
            Self::Rendered => "rendered",
            Self::DiffOnly => "diff_only",
            Self::Applied => "applied",
            Self::RolledBack => "rolled_back",
        };
        f.write_str(name)
    }
}
