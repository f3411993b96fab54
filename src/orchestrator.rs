//! Report job orchestration.
//!
//! Sequences lock -> sentinel -> bind -> clear -> render -> write for one job.
//!
//! ```text
//!            acquire job lock (timeout: ContentionFailure, nothing touched)
//!                      │
//!   Idle ──begin──► Processing ──► Succeeded ──────────┐
//!                      │      ├──► FailedContention ───┤ (fail marker written)
//!                      │      ├──► FailedRender ───────┤
//!                      │      ├──► FailedWrite ────────┤
//!                      │      └──► FailedInput ────────┤
//!                      │                               ▼
//!                      └──────────── end (exactly once) ──► Idle
//! ```
//!
//! Input is bound before the previous artifact is removed, so a job with bad
//! input never destroys a good artifact. The previous artifact is removed
//! before rendering, so a locked artifact means the render is never attempted.

use crate::artifact;
use crate::binder;
use crate::error::ReportError;
use crate::lock::{self, JobLock};
use crate::render::{self, RenderEngine, RenderKind, TemplateStore};
use crate::sentinel::{JobStatusStore, MarkerScope, ProcessingGuard, SentinelFiles};
use crate::types::{GeneratedReport, ReportJob};
use log::{debug, info, warn};
use std::time::Duration;

/// Default wait for another run holding the same job lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Which failures leave a fail marker behind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailMarkerPolicy {
    /// Only a previous artifact that could not be cleared
    #[default]
    Contention,
    /// Every failure after processing began
    All,
}

impl FailMarkerPolicy {
    fn records(&self, err: &ReportError) -> bool {
        match self {
            FailMarkerPolicy::Contention => matches!(err, ReportError::ContentionFailure { .. }),
            FailMarkerPolicy::All => true,
        }
    }
}

/// Terminal state of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Succeeded,
    FailedInput,
    FailedContention,
    FailedRender,
    FailedWrite,
    /// Failed outside the pipeline (config, QR fetch) before the job ran
    Rejected,
}

impl JobState {
    pub fn of(result: &Result<GeneratedReport, ReportError>) -> Self {
        match result {
            Ok(_) => JobState::Succeeded,
            Err(ReportError::ContentionFailure { .. }) => JobState::FailedContention,
            Err(ReportError::RenderFailure(_)) => JobState::FailedRender,
            Err(ReportError::WriteFailure { .. }) => JobState::FailedWrite,
            Err(ReportError::InvalidInput(_)) => JobState::FailedInput,
            // Raised before a job exists; the pipeline never returns these
            Err(ReportError::FetchFailure(_) | ReportError::Config(_)) => JobState::Rejected,
        }
    }
}

/// Everything a job needs besides its own description
pub struct Pipeline {
    templates: Box<dyn TemplateStore>,
    engine: Box<dyn RenderEngine>,
    status: Box<dyn JobStatusStore>,
    scope: MarkerScope,
    fail_policy: FailMarkerPolicy,
    lock_timeout: Duration,
}

impl Pipeline {
    pub fn new(templates: Box<dyn TemplateStore>, engine: Box<dyn RenderEngine>) -> Self {
        Self {
            templates,
            engine,
            status: Box::new(SentinelFiles::default()),
            scope: MarkerScope::default(),
            fail_policy: FailMarkerPolicy::default(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Use filesystem markers with the given scope; the job lock follows it.
    pub fn with_marker_scope(mut self, scope: MarkerScope) -> Self {
        self.scope = scope;
        self.status = Box::new(SentinelFiles::new(scope));
        self
    }

    /// Replace the status store (keeps the current lock scope)
    pub fn with_status_store(mut self, status: Box<dyn JobStatusStore>) -> Self {
        self.status = status;
        self
    }

    pub fn with_fail_marker_policy(mut self, policy: FailMarkerPolicy) -> Self {
        self.fail_policy = policy;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Produce the artifact for `job`.
    ///
    /// Returns the written artifact, or the single failure that ended the job.
    /// The processing marker never outlives this call.
    pub fn generate_report(&self, job: &ReportJob) -> Result<GeneratedReport, ReportError> {
        validate_identity(job)?;

        let key = &job.key;
        let _lock = match JobLock::acquire(key, self.scope, self.lock_timeout) {
            Ok(Some(held)) => held,
            Ok(None) => {
                return Err(ReportError::contention(&key.base_name, "another run holds the job lock"));
            }
            Err(e) => return Err(ReportError::write(lock::lock_path(key, self.scope), e)),
        };

        let guard =
            ProcessingGuard::begin(self.status.as_ref(), key).map_err(|e| ReportError::write(&key.output_dir, e))?;

        let result = self.run(job);

        if let Err(ref e) = result
            && self.fail_policy.records(e)
            && let Err(marker_err) = guard.fail(&e.to_string())
        {
            warn!("failed to write fail marker for {}: {}", key.display(), marker_err);
        }

        if let Err(e) = guard.finish() {
            warn!("failed to remove processing marker for {}: {}", key.display(), e);
        }

        let state = JobState::of(&result);
        match &result {
            Ok(report) => info!("{}: {:?} -> {}", key.base_name, state, report.path.display()),
            Err(e) => info!("{}: {:?}: {}", key.base_name, state, e),
        }
        result
    }

    fn run(&self, job: &ReportJob) -> Result<GeneratedReport, ReportError> {
        let kind = RenderKind::from_extension(&job.extension);
        let input = binder::bind(&job.datasets, &job.parameters)?;

        let target = job.artifact_path();
        if artifact::clear_existing(&target, &job.key.base_name)? {
            debug!("cleared previous artifact for {}", job.key.display());
        }

        let output = render::render_report(self.templates.as_ref(), self.engine.as_ref(), &job.template, &input, &kind)?;
        let bytes_written = artifact::write_atomic(&target, &output.bytes)?;

        Ok(GeneratedReport {
            path: target,
            mime_type: output.mime_type,
            encoding: output.encoding,
            extension: output.extension,
            bytes_written,
            warnings: output.warnings,
        })
    }
}

/// Base name and extension become file names; keep them to one path component.
fn validate_identity(job: &ReportJob) -> Result<(), ReportError> {
    fn bad(token: &str) -> bool {
        token.is_empty() || token == "." || token == ".." || token.contains(['/', '\\'])
    }

    if bad(&job.key.base_name) {
        return Err(ReportError::InvalidInput(format!("invalid report name '{}'", job.key.base_name)));
    }
    if bad(&job.extension) {
        return Err(ReportError::InvalidInput(format!("invalid file extension '{}'", job.extension)));
    }
    Ok(())
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod orchestrator_test;
