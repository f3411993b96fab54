//! Core data structures for report jobs
//!
//! This module defines the job description handed to the orchestrator,
//! the datasets and parameters it binds, and the result it returns.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// A single dataset row: column name to cell value
pub type Row = Map<String, Value>;

/// Identity of one report artifact across invocations
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub output_dir: PathBuf,
    pub base_name: String,
}

impl JobKey {
    pub fn new(output_dir: impl Into<PathBuf>, base_name: impl Into<String>) -> Self {
        Self { output_dir: output_dir.into(), base_name: base_name.into() }
    }

    /// Full artifact path for the given extension (`dir/base.ext`)
    pub fn artifact_path(&self, extension: &str) -> PathBuf {
        self.output_dir.join(format!("{}.{}", self.base_name, extension))
    }

    pub fn display(&self) -> String {
        format!("{}", self.output_dir.join(&self.base_name).display())
    }
}

/// A named table of rows, bound to the template by name
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Dataset {
    pub name: String,
    pub rows: Vec<Row>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self { name: name.into(), rows }
    }

    /// Load rows from a JSON file containing an array of objects
    pub fn from_json_file(name: &str, path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        let rows: Vec<Row> = serde_json::from_str(&content)
            .map_err(|e| format!("{} is not a JSON array of objects: {}", path.display(), e))?;
        Ok(Self::new(name, rows))
    }

    /// Set `column` to `value` in every row.
    ///
    /// An empty dataset gets a single row holding just this column, which is
    /// how a one-off value (such as an encoded QR image) is usually shipped.
    pub fn set_column(&mut self, column: &str, value: Value) {
        if self.rows.is_empty() {
            self.rows.push(Row::new());
        }
        for row in &mut self.rows {
            row.insert(column.to_string(), value.clone());
        }
    }
}

/// A name/value pair passed straight to the render engine
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// Everything needed to produce one artifact
#[derive(Debug, Clone)]
pub struct ReportJob {
    pub key: JobKey,
    /// Requested file extension, without the dot ("pdf", "xls", ...)
    pub extension: String,
    /// Logical template name resolved through the template store
    pub template: String,
    pub datasets: Vec<Dataset>,
    pub parameters: Vec<Parameter>,
}

impl ReportJob {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        base_name: impl Into<String>,
        extension: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            key: JobKey::new(output_dir, base_name),
            extension: extension.into(),
            template: template.into(),
            datasets: Vec::new(),
            parameters: Vec::new(),
        }
    }

    pub fn with_dataset(mut self, dataset: Dataset) -> Self {
        self.datasets.push(dataset);
        self
    }

    pub fn with_parameter(mut self, name: &str, value: &str) -> Self {
        self.parameters.push(Parameter::new(name, value));
        self
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.key.artifact_path(&self.extension)
    }
}

/// Successful outcome of a report job
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct GeneratedReport {
    pub path: PathBuf,
    pub mime_type: String,
    pub encoding: Option<String>,
    /// Extension reported by the renderer (may differ from the requested one)
    pub extension: String,
    pub bytes_written: u64,
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_artifact_path_joins_base_and_extension() {
        let key = JobKey::new("/reports/", "Invoice42");
        assert_eq!(key.artifact_path("pdf"), PathBuf::from("/reports/Invoice42.pdf"));
    }

    #[test]
    fn test_set_column_on_every_row() {
        let rows: Vec<Row> = serde_json::from_value(json!([{"sku": "A"}, {"sku": "B"}])).unwrap();
        let mut ds = Dataset::new("Items", rows);
        ds.set_column("Qr", json!("aGVsbG8="));
        assert_eq!(ds.rows.len(), 2);
        assert!(ds.rows.iter().all(|r| r["Qr"] == json!("aGVsbG8=")));
    }

    #[test]
    fn test_set_column_on_empty_dataset_creates_row() {
        let mut ds = Dataset::new("Codes", vec![]);
        ds.set_column("Base64Encoding", json!("abc"));
        assert_eq!(ds.rows.len(), 1);
        assert_eq!(ds.rows[0]["Base64Encoding"], json!("abc"));
    }

    #[test]
    fn test_dataset_from_json_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("items.json");
        std::fs::write(&path, r#"[{"sku": "A", "qty": 1}, {"sku": "B", "qty": 2}]"#).unwrap();

        let ds = Dataset::from_json_file("Items", &path).unwrap();
        assert_eq!(ds.name, "Items");
        assert_eq!(ds.rows.len(), 2);
        assert_eq!(ds.rows[1]["qty"], json!(2));
    }

    #[test]
    fn test_dataset_from_json_file_rejects_non_array() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"sku": "A"}"#).unwrap();
        assert!(Dataset::from_json_file("Items", &path).is_err());
    }
}
