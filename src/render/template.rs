//! Template lookup.

use super::types::Template;
use crate::error::ReportError;
use log::debug;
use std::path::{Component, Path, PathBuf};

/// Resolves a logical template name to a renderable design
pub trait TemplateStore: Send + Sync {
    fn resolve(&self, name: &str) -> Result<Template, ReportError>;
}

/// Templates stored as `<root>/<name>.<extension>`
#[derive(Debug, Clone)]
pub struct DirectoryTemplateStore {
    root: PathBuf,
    extension: String,
}

impl DirectoryTemplateStore {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self { root: root.into(), extension: extension.into() }
    }
}

impl TemplateStore for DirectoryTemplateStore {
    fn resolve(&self, name: &str) -> Result<Template, ReportError> {
        if name.is_empty() || !is_plain_relative(Path::new(name)) {
            return Err(ReportError::RenderFailure(format!("invalid template name '{}'", name)));
        }

        let file_name = if self.extension.is_empty() { name.to_string() } else { format!("{}.{}", name, self.extension) };
        let path = self.root.join(file_name);
        debug!("resolving template '{}' to {:?}", name, path);

        if !path.is_file() {
            return Err(ReportError::RenderFailure(format!(
                "template '{}' not found at {}",
                name,
                path.display()
            )));
        }

        Ok(Template { name: name.to_string(), path })
    }
}

/// Only normal components: no root, no `..`, no drive prefix
fn is_plain_relative(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_)))
}
