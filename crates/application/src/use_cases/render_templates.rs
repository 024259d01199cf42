//! Render templates use case.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use kustforge_domain::{
    Reference, ReferenceFailure, RenderedOutput, RunOutcome, RunState, Snapshot, Template,
    TemplateDiff, diff, render,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::ResolutionEngine;
use crate::error::ApplicationResult;
use crate::placeholder::parse_references;
use crate::ports::{Clock, SnapshotStore};

/// What to do with rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMode {
    /// Compute diffs only.
    #[default]
    DiffOnly,
    /// Commit rendered output as the new snapshot.
    Apply,
}

impl fmt::Display for ApplyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DiffOnly => f.write_str("diff"),
            Self::Apply => f.write_str("apply"),
        }
    }
}

/// Input for a render run.
#[derive(Debug, Clone)]
pub struct RenderTemplatesInput {
    /// Templates to render, in report order.
    pub templates: Vec<Template>,
    /// Diff only, or apply.
    pub mode: ApplyMode,
}

struct Parsed {
    template: Template,
    references: Vec<Reference>,
    state: RunState,
}

/// Use case for resolving, rendering, diffing and applying templates.
///
/// A run either renders every template or none: if any reference in any
/// template fails, the outcome lists every failure and nothing is written.
pub struct RenderTemplates<S: SnapshotStore> {
    engine: Arc<ResolutionEngine>,
    snapshots: Arc<S>,
    clock: Arc<dyn Clock>,
    history_limit: Option<usize>,
}

impl<S: SnapshotStore> RenderTemplates<S> {
    /// Creates a new `RenderTemplates` use case.
    #[must_use]
    pub fn new(engine: Arc<ResolutionEngine>, snapshots: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            engine,
            snapshots,
            clock,
            history_limit: None,
        }
    }

    /// Keeps at most `limit` snapshots per template after each apply.
    #[must_use]
    pub const fn with_history_limit(mut self, limit: Option<usize>) -> Self {
        self.history_limit = limit;
        self
    }

    /// Runs the templates through parse, resolve, render and then diff or
    /// apply.
    ///
    /// # Errors
    ///
    /// Reference failures are part of the outcome, not errors. Errors are
    /// returned for snapshot storage failures and broken invariants.
    pub async fn execute(&self, input: RenderTemplatesInput) -> ApplicationResult<RunOutcome> {
        let mut failures = Vec::new();
        let mut parsed = Vec::with_capacity(input.templates.len());

        for template in input.templates {
            match parse_references(&template.text) {
                Ok(references) => parsed.push(Parsed {
                    template,
                    references,
                    state: RunState::Parsed,
                }),
                Err(err) => {
                    warn!(template = %template.id, error = %err, "template syntax error");
                    failures.push(ReferenceFailure {
                        template: template.id.clone(),
                        raw_text: template.text.get(err.span.clone()).unwrap_or_default().to_string(),
                        span: err.span.clone(),
                        error: err.into(),
                    });
                }
            }
        }

        let all: Vec<Reference> = parsed
            .iter()
            .flat_map(|p| p.references.iter().cloned())
            .collect();
        for p in &mut parsed {
            p.state = p.state.transition(RunState::Resolving)?;
        }
        let results = self.engine.resolve_all(&all).await;

        let mut values = HashMap::with_capacity(results.len());
        for p in &parsed {
            for reference in &p.references {
                let key = reference.canonical_key();
                match results.get(&key) {
                    Some(Ok(value)) => {
                        values.insert(key, value.clone());
                    }
                    Some(Err(err)) => failures.push(ReferenceFailure {
                        template: p.template.id.clone(),
                        raw_text: reference.raw_text.clone(),
                        span: reference.span.clone(),
                        error: err.clone(),
                    }),
                    None => failures.push(ReferenceFailure {
                        template: p.template.id.clone(),
                        raw_text: reference.raw_text.clone(),
                        span: reference.span.clone(),
                        error: kustforge_domain::ResolveError::Unavailable {
                            service: reference.service.token().to_string(),
                            cause: "reference was not resolved".to_string(),
                        },
                    }),
                }
            }
        }

        if !failures.is_empty() {
            warn!(failures = failures.len(), "resolution failed, nothing rendered");
            return Ok(RunOutcome::Failure(failures));
        }

        let mut diffs = Vec::new();
        let mut outputs = Vec::new();
        for mut p in parsed {
            let content = render(&p.template.text, &p.references, &values)?;
            p.state = p.state.transition(RunState::Rendered)?;

            let previous = match self.snapshots.current(&p.template.id).await? {
                Some(snapshot) => Some(snapshot),
                None => self
                    .snapshots
                    .existing_output(&p.template.id)
                    .await?
                    .map(|bytes| Snapshot::new(p.template.id.clone(), bytes, self.clock.now())),
            };
            let changes = diff(previous.as_ref(), &content);

            match input.mode {
                ApplyMode::DiffOnly => {
                    p.state = p.state.transition(RunState::DiffOnly)?;
                    info!(template = %p.template.id, changes = %changes.summary(), state = %p.state, "diff");
                    diffs.push(TemplateDiff {
                        template: p.template.id,
                        diff: changes,
                    });
                }
                ApplyMode::Apply => {
                    let snapshot = Snapshot::new(p.template.id.clone(), content.as_bytes(), self.clock.now());
                    self.snapshots.commit(&snapshot).await?;
                    if let Some(keep) = self.history_limit {
                        self.snapshots.prune(&p.template.id, keep.max(2)).await?;
                    }
                    p.state = p.state.transition(RunState::Applied)?;
                    info!(template = %p.template.id, changes = %changes.summary(), state = %p.state, "applied");
                    outputs.push(RenderedOutput {
                        template: p.template.id,
                        content,
                        diff: changes,
                    });
                }
            }
        }

        Ok(match input.mode {
            ApplyMode::DiffOnly => RunOutcome::DiffOnly(diffs),
            ApplyMode::Apply => RunOutcome::Success(outputs),
        })
    }
}
