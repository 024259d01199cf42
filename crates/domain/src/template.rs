//! Templates and their identities

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Stable identity of a template's output, used to key snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(String);

impl TemplateId {
    /// Creates an identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier derived from an output path, with forward slashes.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        Self(path.to_string_lossy().replace('\\', "/"))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TemplateId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A template loaded into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// Identity of the rendered output.
    pub id: TemplateId,
    /// Where the template was read from.
    pub source_path: PathBuf,
    /// Where the rendered output goes.
    pub output_path: PathBuf,
    /// Raw template text.
    pub text: String,
}

impl Template {
    /// Creates a template whose identity is its output path.
    #[must_use]
    pub fn new(source_path: PathBuf, output_path: PathBuf, text: impl Into<String>) -> Self {
        Self {
            id: TemplateId::from_path(&output_path),
            source_path,
            output_path,
            text: text.into(),
        }
    }

    /// Creates an in-memory template, mostly for tests and piping.
    #[must_use]
    pub fn inline(id: impl Into<String>, text: impl Into<String>) -> Self {
        let id = TemplateId::new(id);
        let path = PathBuf::from(id.as_str());
        Self {
            id,
            source_path: path.clone(),
            output_path: path,
            text: text.into(),
        }
    }
}
