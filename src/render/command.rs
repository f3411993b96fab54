//! External render program driver.
//!
//! The render engine runs as a child process:
//!
//! ```text
//! <program> <args...> --template <path> --kind <kind>
//!   stdin  <- bound input as JSON
//!   stdout -> artifact bytes
//!   stderr -> diagnostics; lines starting with "warning:" are kept as warnings
//! ```
//!
//! A non-zero exit, empty output or an overrun of the timeout fails the render.

use super::RenderEngine;
use super::types::{RenderKind, RenderOutput, Template};
use crate::binder::BoundInput;
use crate::error::ReportError;
use log::{debug, warn};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default timeout for a single render (2 minutes)
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(120);

const WARNING_PREFIX: &str = "warning:";
const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandRenderer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), args: Vec::new(), timeout: DEFAULT_RENDER_TIMEOUT }
    }

    /// Arguments placed before `--template`/`--kind`
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl RenderEngine for CommandRenderer {
    fn render(&self, template: &Template, input: &BoundInput, kind: &RenderKind) -> Result<RenderOutput, ReportError> {
        debug!("running renderer {:?} for template {:?} as {}", self.program, template.path, kind);

        let payload =
            input.to_json().map_err(|e| ReportError::RenderFailure(format!("failed to serialize input: {}", e)))?;

        let start = Instant::now();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg("--template")
            .arg(&template.path)
            .arg("--kind")
            .arg(kind.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ReportError::RenderFailure(format!("failed to start {}: {}", self.program.display(), e)))?;

        // Feed stdin and drain both pipes on their own threads so a chatty
        // child can never block on a full pipe while we wait on it.
        let stdin_writer = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || {
                let result = stdin.write_all(&payload);
                drop(stdin);
                result
            })
        });
        let stdout_reader = child.stdout.take().map(|out| spawn_reader(out));
        let stderr_reader = child.stderr.take().map(|err| spawn_reader(err));

        let status = match wait_with_timeout(&mut child, self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                return Err(ReportError::RenderFailure(format!(
                    "renderer timed out after {:.1}s",
                    self.timeout.as_secs_f64()
                )));
            }
            Err(e) => return Err(ReportError::RenderFailure(format!("failed to wait for renderer: {}", e))),
        };

        if let Some(Ok(Err(e))) = stdin_writer.map(|h| h.join()) {
            debug!("renderer did not consume all input: {}", e);
        }
        let stdout = join_reader(stdout_reader)?;
        let stderr = String::from_utf8_lossy(&join_reader(stderr_reader)?).to_string();

        debug!("renderer exited with {} in {:?}", status, start.elapsed());

        if !status.success() {
            return Err(ReportError::RenderFailure(format!(
                "renderer exited with {}: {}",
                status,
                stderr.trim()
            )));
        }
        if stdout.is_empty() {
            return Err(ReportError::RenderFailure("renderer produced no output".to_string()));
        }

        let mut output = RenderOutput::for_kind(kind, stdout);
        output.warnings = parse_warnings(&stderr);
        for w in &output.warnings {
            warn!("renderer warning: {}", w);
        }
        Ok(output)
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut source: R) -> JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        source.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn join_reader(handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> Result<Vec<u8>, ReportError> {
    match handle {
        None => Ok(Vec::new()),
        Some(h) => h
            .join()
            .map_err(|_| ReportError::RenderFailure("renderer output reader panicked".to_string()))?
            .map_err(|e| ReportError::RenderFailure(format!("failed to read renderer output: {}", e))),
    }
}

/// Wait for the child, killing it once `timeout` has elapsed.
///
/// Returns `Ok(None)` on timeout.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Extract `warning:` lines from renderer stderr
pub fn parse_warnings(stderr: &str) -> Vec<String> {
    stderr
        .lines()
        .filter_map(|line| line.trim().strip_prefix(WARNING_PREFIX))
        .map(|w| w.trim().to_string())
        .filter(|w| !w.is_empty())
        .collect()
}
