/// Configuration resolution module
///
/// This module handles:
/// - Locating and parsing the TOML config file
/// - Applying command-line overrides on top of it
/// - Building the `Pipeline` and `ChartClient` the commands run with
use crate::cli::GenerateArgs;
use crate::error::ReportError;
use crate::orchestrator::{DEFAULT_LOCK_TIMEOUT, FailMarkerPolicy, Pipeline};
use crate::qr::{self, ChartClient};
use crate::render::command::DEFAULT_RENDER_TIMEOUT;
use crate::render::{CommandRenderer, DirectoryTemplateStore};
use crate::sentinel::MarkerScope;
use log::debug;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "REPORT_PIPELINE_CONFIG";

/// Get the default config file location
/// - Linux: ~/.config/report-pipeline/config.toml
/// - macOS: ~/Library/Application Support/report-pipeline/config.toml
/// - Windows: %APPDATA%/report-pipeline/config.toml
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("report-pipeline").join("config.toml"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    /// Directory holding report templates
    pub templates_dir: PathBuf,
    /// Extension appended to template names when resolving them
    pub template_extension: String,
    pub marker_scope: MarkerScope,
    pub fail_marker_policy: FailMarkerPolicy,
    /// How long to wait for another run holding the same job
    pub lock_timeout_secs: u64,
    pub renderer: RendererConfig,
    pub chart: ChartConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RendererConfig {
    /// External render program; required for `generate`
    pub program: Option<PathBuf>,
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChartConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_bytes: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            templates_dir: PathBuf::from("templates"),
            template_extension: "tmpl".to_string(),
            marker_scope: MarkerScope::default(),
            fail_marker_policy: FailMarkerPolicy::default(),
            lock_timeout_secs: DEFAULT_LOCK_TIMEOUT.as_secs(),
            renderer: RendererConfig::default(),
            chart: ChartConfig::default(),
        }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self { program: None, args: Vec::new(), timeout_secs: DEFAULT_RENDER_TIMEOUT.as_secs() }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            base_url: qr::DEFAULT_CHART_URL.to_string(),
            timeout_secs: qr::DEFAULT_FETCH_TIMEOUT.as_secs(),
            max_bytes: qr::DEFAULT_MAX_BYTES,
        }
    }
}

/// Parse a config file's contents
pub fn parse_config(text: &str) -> Result<ReportConfig, ReportError> {
    toml::from_str(text).map_err(|e| ReportError::Config(e.to_string()))
}

/// Load configuration.
///
/// An explicit path (flag or `REPORT_PIPELINE_CONFIG`) must exist. The default
/// location is optional; without it the built-in defaults apply.
pub fn load_config(explicit: Option<&Path>) -> Result<ReportConfig, ReportError> {
    let explicit = explicit.map(Path::to_path_buf).or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));

    let path = match explicit {
        Some(path) => path,
        None => match default_config_path() {
            Some(path) if path.is_file() => path,
            _ => {
                debug!("no config file found, using defaults");
                return Ok(ReportConfig::default());
            }
        },
    };

    debug!("loading config from {:?}", path);
    let text = fs::read_to_string(&path)
        .map_err(|e| ReportError::Config(format!("failed to read {}: {}", path.display(), e)))?;
    parse_config(&text).map_err(|e| match e {
        ReportError::Config(msg) => ReportError::Config(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

impl ReportConfig {
    /// Apply `generate` flags that override file settings
    pub fn apply_generate_overrides(&mut self, args: &GenerateArgs) {
        if let Some(ref dir) = args.templates_dir {
            self.templates_dir = dir.clone();
        }
        if let Some(ref program) = args.renderer {
            self.renderer.program = Some(program.clone());
        }
        if let Some(secs) = args.render_timeout {
            self.renderer.timeout_secs = secs;
        }
        if let Some(scope) = args.marker_scope {
            self.marker_scope = scope;
        }
        if args.record_all_failures {
            self.fail_marker_policy = FailMarkerPolicy::All;
        }
        if let Some(secs) = args.lock_timeout {
            self.lock_timeout_secs = secs;
        }
    }

    /// Build the report pipeline described by this configuration
    pub fn build_pipeline(&self) -> Result<Pipeline, ReportError> {
        let program = self.renderer.program.as_ref().ok_or_else(|| {
            ReportError::Config("no renderer configured (set [renderer] program or pass --renderer)".to_string())
        })?;

        let engine = CommandRenderer::new(program)
            .with_args(self.renderer.args.clone())
            .with_timeout(Duration::from_secs(self.renderer.timeout_secs));
        let templates = DirectoryTemplateStore::new(&self.templates_dir, &self.template_extension);

        Ok(Pipeline::new(Box::new(templates), Box::new(engine))
            .with_marker_scope(self.marker_scope)
            .with_fail_marker_policy(self.fail_marker_policy)
            .with_lock_timeout(Duration::from_secs(self.lock_timeout_secs)))
    }

    pub fn chart_client(&self) -> ChartClient {
        ChartClient::new(&self.chart.base_url, Duration::from_secs(self.chart.timeout_secs))
            .with_max_bytes(self.chart.max_bytes)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
