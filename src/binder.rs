//! Data source binding
//!
//! Turns the job's datasets and parameters into the single input value handed
//! to a render engine. Datasets are bound by name, so names must be present
//! and unique; input order is preserved for deterministic output.

use crate::error::ReportError;
use crate::types::{Dataset, Parameter};
use log::debug;
use std::collections::HashSet;

/// Renderer-ready combination of datasets and parameters
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BoundInput {
    pub datasets: Vec<Dataset>,
    pub parameters: Vec<Parameter>,
}

impl BoundInput {
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Bind datasets and parameters, rejecting inputs a template could not use.
pub fn bind(datasets: &[Dataset], parameters: &[Parameter]) -> Result<BoundInput, ReportError> {
    if datasets.is_empty() {
        return Err(ReportError::InvalidInput("at least one dataset is required".to_string()));
    }

    let mut seen = HashSet::new();
    for dataset in datasets {
        if dataset.name.trim().is_empty() {
            return Err(ReportError::InvalidInput("dataset name must not be empty".to_string()));
        }
        if !seen.insert(dataset.name.as_str()) {
            return Err(ReportError::InvalidInput(format!("duplicate dataset name '{}'", dataset.name)));
        }
    }

    debug!("bound {} dataset(s) and {} parameter(s)", datasets.len(), parameters.len());

    Ok(BoundInput { datasets: datasets.to_vec(), parameters: parameters.to_vec() })
}
