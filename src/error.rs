//! Error taxonomy for report jobs and image fetches.
//!
//! Every failure is terminal for the invocation that produced it; nothing in
//! this crate retries. Callers get one of these variants, never a silently
//! empty value.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    /// Datasets or job identity are malformed (empty list, duplicate names, ...)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The previous artifact (or the job lock) is held by someone else
    #[error("{base_name}: target in use: {reason}")]
    ContentionFailure { base_name: String, reason: String },

    /// Template lookup, data/parameter mismatch or renderer fault
    #[error("render failed: {0}")]
    RenderFailure(String),

    /// Persisting the rendered bytes failed
    #[error("failed to write {}: {source}", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    FetchFailure(#[from] FetchError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ReportError {
    pub fn contention(base_name: &str, reason: impl Into<String>) -> Self {
        ReportError::ContentionFailure { base_name: base_name.to_string(), reason: reason.into() }
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReportError::WriteFailure { path: path.into(), source }
    }

    /// Stable machine-readable name, used in JSON output and fail markers.
    pub fn kind(&self) -> &'static str {
        match self {
            ReportError::InvalidInput(_) => "invalid_input",
            ReportError::ContentionFailure { .. } => "contention_failure",
            ReportError::RenderFailure(_) => "render_failure",
            ReportError::WriteFailure { .. } => "write_failure",
            ReportError::FetchFailure(_) => "fetch_failure",
            ReportError::Config(_) => "config_error",
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            ReportError::InvalidInput(_) | ReportError::Config(_) => 2,
            ReportError::ContentionFailure { .. } => 3,
            ReportError::RenderFailure(_) => 4,
            ReportError::WriteFailure { .. } => 5,
            ReportError::FetchFailure(_) => 6,
        }
    }
}

/// Failure of the remote chart fetch or of decoding what it returned.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("chart service returned HTTP {status}")]
    Status { status: u16 },

    #[error("chart service request failed: {0}")]
    Transport(String),

    #[error("chart response exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("failed to read chart response: {0}")]
    Read(#[from] std::io::Error),

    #[error("chart response is not a decodable image: {0}")]
    Decode(#[from] image::ImageError),
}

impl From<ureq::Error> for FetchError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, _) => FetchError::Status { status },
            ureq::Error::Transport(t) => FetchError::Transport(t.to_string()),
        }
    }
}
