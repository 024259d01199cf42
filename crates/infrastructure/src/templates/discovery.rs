//! Finds `*.yaml.template` files and pairs each with its output path.
//!
//! `deploy/app.yaml.template` renders to `deploy/app.yaml`, and the
//! dot-prefixed `deploy/.app.yaml.template` renders to the same place.
//! Paths are kept relative to the root so template ids are stable across
//! checkouts.

use std::path::{Path, PathBuf};

use kustforge_application::ports::{FileSystem, FileSystemError};
use kustforge_domain::Template;
use tracing::debug;

const TEMPLATE_SUFFIX: &str = ".template";
const TEMPLATE_EXTENSIONS: [&str; 2] = [".yaml.template", ".yml.template"];

/// Errors while collecting templates.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// The file system failed.
    #[error(transparent)]
    FileSystem(#[from] FileSystemError),

    /// A template is not UTF-8 text.
    #[error("template {0} is not valid UTF-8")]
    NotUtf8(PathBuf),

    /// An explicitly listed file does not follow the template naming rule.
    #[error("{0} is not a template (expected *.yaml.template or *.yml.template)")]
    NotATemplate(PathBuf),
}

/// Output file name for a template file name, or `None` if the name is not a
/// template name.
#[must_use]
pub fn output_name(file_name: &str) -> Option<String> {
    if !TEMPLATE_EXTENSIONS
        .iter()
        .any(|ext| file_name.len() > ext.len() && file_name.ends_with(ext))
    {
        return None;
    }
    let stem = file_name.strip_suffix(TEMPLATE_SUFFIX)?;
    let stem = stem.strip_prefix('.').unwrap_or(stem);
    (!stem.starts_with('.') && !stem.is_empty()).then(|| stem.to_string())
}

fn output_path(relative_source: &Path) -> Option<PathBuf> {
    let name = output_name(relative_source.file_name()?.to_str()?)?;
    Some(relative_source.with_file_name(name))
}

async fn read_template<F: FileSystem>(
    fs: &F,
    root: &Path,
    relative_source: PathBuf,
) -> Result<Template, TemplateError> {
    let output = output_path(&relative_source)
        .ok_or_else(|| TemplateError::NotATemplate(relative_source.clone()))?;
    let bytes = fs.read_file(&root.join(&relative_source)).await?;
    let text = String::from_utf8(bytes).map_err(|_| TemplateError::NotUtf8(relative_source.clone()))?;
    Ok(Template::new(relative_source, output, text))
}

/// Recursively collects templates under `root`, sorted by path.
///
/// Directories in `skip` (relative to `root`, or absolute) are not entered.
///
/// # Errors
///
/// Returns an error if a directory or template cannot be read.
pub async fn discover_templates<F: FileSystem>(
    fs: &F,
    root: &Path,
    skip: &[PathBuf],
) -> Result<Vec<Template>, TemplateError> {
    let skipped: Vec<PathBuf> = skip
        .iter()
        .map(|dir| if dir.is_absolute() { dir.clone() } else { root.join(dir) })
        .collect();

    let mut pending = vec![root.to_path_buf()];
    let mut sources = Vec::new();
    while let Some(dir) = pending.pop() {
        for entry in fs.read_dir(&dir).await? {
            if fs.is_dir(&entry).await {
                if skipped.iter().any(|s| s == &entry) || entry.ends_with(".git") {
                    debug!(dir = %entry.display(), "skipping directory");
                } else {
                    pending.push(entry);
                }
                continue;
            }
            let is_template = entry
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(output_name)
                .is_some();
            if is_template && let Ok(relative) = entry.strip_prefix(root) {
                sources.push(relative.to_path_buf());
            }
        }
    }
    sources.sort();

    let mut templates = Vec::with_capacity(sources.len());
    for source in sources {
        templates.push(read_template(fs, root, source).await?);
    }
    debug!(root = %root.display(), count = templates.len(), "templates discovered");
    Ok(templates)
}

/// Loads explicitly listed templates, given relative to `root`.
///
/// # Errors
///
/// Returns an error if a listed file is not a template or cannot be read.
pub async fn load_templates<F: FileSystem>(
    fs: &F,
    root: &Path,
    sources: &[PathBuf],
) -> Result<Vec<Template>, TemplateError> {
    let mut templates = Vec::with_capacity(sources.len());
    for source in sources {
        templates.push(read_template(fs, root, source.clone()).await?);
    }
    Ok(templates)
}
