//! Application use cases (run orchestration).

mod render_templates;
mod rollback;

pub use render_templates::{ApplyMode, RenderTemplates, RenderTemplatesInput};
pub use rollback::{RollbackTemplate, RollbackTemplateOutput};
