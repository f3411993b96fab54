//! Render kinds, templates and render output.

use std::fmt;
use std::path::PathBuf;

/// Logical output format requested from the render engine.
///
/// The only alias is `xls`, which selects the spreadsheet renderer named
/// `Excel`; every other extension is handed through unchanged and the engine
/// decides whether it supports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderKind(String);

impl RenderKind {
    pub fn from_extension(extension: &str) -> Self {
        match extension {
            "xls" => RenderKind("Excel".to_string()),
            other => RenderKind(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Mime type to report when the engine does not supply one
    pub fn default_mime_type(&self) -> &'static str {
        match self.0.as_str() {
            "pdf" | "PDF" => "application/pdf",
            "Excel" => "application/vnd.ms-excel",
            "EXCELOPENXML" | "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "csv" | "CSV" => "text/csv",
            _ => "application/octet-stream",
        }
    }

    /// File extension to report when the engine does not supply one
    pub fn default_extension(&self) -> String {
        match self.0.as_str() {
            "Excel" => "xls".to_string(),
            "EXCELOPENXML" => "xlsx".to_string(),
            other => other.to_lowercase(),
        }
    }
}

impl fmt::Display for RenderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved report design
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    pub path: PathBuf,
}

/// Bytes produced by a render engine plus what it says about them
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub encoding: Option<String>,
    pub extension: String,
    /// Engine diagnostics that did not stop the render
    pub warnings: Vec<String>,
}

impl RenderOutput {
    /// Output with metadata defaulted from the render kind
    pub fn for_kind(kind: &RenderKind, bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: kind.default_mime_type().to_string(),
            encoding: None,
            extension: kind.default_extension(),
            warnings: Vec::new(),
        }
    }
}
