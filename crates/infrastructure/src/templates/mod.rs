//! Template discovery and loading.

mod discovery;

pub use discovery::{TemplateError, discover_templates, load_templates, output_name};
