//! Render adapter.
//!
//! Connects a job to the external rendering capability:
//!
//! - [`types`] - `RenderKind` (extension-to-kind mapping), `Template`, `RenderOutput`
//! - [`template`] - `TemplateStore` and the directory-backed store
//! - [`command`] - `CommandRenderer`, an engine that runs an external program
//!
//! The engine itself is opaque; only the [`RenderEngine`] contract matters
//! here. One render attempt is made per job.

pub mod command;
pub mod template;
pub mod types;

pub use command::CommandRenderer;
pub use template::{DirectoryTemplateStore, TemplateStore};
pub use types::{RenderKind, RenderOutput, Template};

use crate::binder::BoundInput;
use crate::error::ReportError;
use log::debug;

/// Capability that turns a template plus bound input into bytes
pub trait RenderEngine: Send + Sync {
    fn render(&self, template: &Template, input: &BoundInput, kind: &RenderKind) -> Result<RenderOutput, ReportError>;
}

/// Resolve `template_name` and render `input` once.
pub fn render_report(
    store: &dyn TemplateStore,
    engine: &dyn RenderEngine,
    template_name: &str,
    input: &BoundInput,
    kind: &RenderKind,
) -> Result<RenderOutput, ReportError> {
    let template = store.resolve(template_name)?;
    debug!("rendering '{}' as {}", template.name, kind);

    let output = engine.render(&template, input, kind)?;
    debug!("render produced {} bytes ({}), {} warning(s)", output.bytes.len(), output.mime_type, output.warnings.len());
    Ok(output)
}
