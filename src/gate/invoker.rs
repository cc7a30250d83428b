use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::format::Format;
use super::types::{Mode, Verdict};
use crate::util::{MAX_DIAGNOSTIC_CHARS, truncate_chars};

/// Default bound on a single validator run in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Prefix of transient files handed to the validator
const TEMP_FILE_PREFIX: &str = "configkeeper-";

/// Failure to obtain a verdict. Never a statement about the document itself.
#[derive(Debug)]
pub enum InvokeError {
    TempFile(std::io::Error),
    Spawn(std::io::Error),
    Timeout(Duration),
    Cancelled,
    Parse {
        source: serde_json::Error,
        output: String,
    },
}

impl std::fmt::Display for InvokeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvokeError::TempFile(e) => write!(f, "Failed to write transient file: {}", e),
            InvokeError::Spawn(e) => write!(f, "Failed to run validator: {}", e),
            InvokeError::Timeout(d) => {
                write!(f, "Validator timed out after {} seconds", d.as_secs_f64())
            }
            InvokeError::Cancelled => write!(f, "Validation cancelled by the request"),
            InvokeError::Parse { source, output } => write!(
                f,
                "Failed to parse validator output: {}\noutput:\n{}",
                source,
                truncate_chars(output, MAX_DIAGNOSTIC_CHARS)
            ),
        }
    }
}

impl std::error::Error for InvokeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InvokeError::TempFile(e) | InvokeError::Spawn(e) => Some(e),
            InvokeError::Parse { source, .. } => Some(source),
            InvokeError::Timeout(_) | InvokeError::Cancelled => None,
        }
    }
}

/// Something that can turn a configuration document into a verdict
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(
        &self,
        body: &[u8],
        format: Format,
        cancel: &CancellationToken,
    ) -> Result<Verdict, InvokeError>;
}

/// Runs the external validator executable once per document
#[derive(Debug, Clone)]
pub struct ProcessValidator {
    pub program: PathBuf,
    pub subcommand: String,
    pub mode: Mode,
    pub security: bool,
    pub best_practices: bool,
    pub timeout: Duration,
}

impl ProcessValidator {
    /// Arguments placed before the document path
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            self.subcommand.clone(),
            "--mode".to_string(),
            self.mode.as_str().to_string(),
            "--output".to_string(),
            "json".to_string(),
        ];
        if self.security {
            args.push("--security".to_string());
        }
        if self.best_practices {
            args.push("--best-practices".to_string());
        }
        args
    }
}

#[async_trait]
impl Validator for ProcessValidator {
    async fn validate(
        &self,
        body: &[u8],
        format: Format,
        cancel: &CancellationToken,
    ) -> Result<Verdict, InvokeError> {
        let start = Instant::now();

        // Removed when dropped, on every return path
        let file = tempfile::Builder::new()
            .prefix(TEMP_FILE_PREFIX)
            .suffix(format.extension())
            .tempfile()
            .map_err(InvokeError::TempFile)?;
        tokio::fs::write(file.path(), body)
            .await
            .map_err(InvokeError::TempFile)?;
        trace!("Wrote {} bytes to {}", body.len(), file.path().display());

        let mut cmd = Command::new(&self.program);
        cmd.args(self.args())
            .arg(file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a wrapper script's children die with it
        #[cfg(unix)]
        cmd.process_group(0);
        debug!("Running validator {:?} {:?}", self.program, self.args());

        let child = cmd.spawn().map_err(InvokeError::Spawn)?;
        let mut group = ProcessGroup::new(child.id());

        // Early returns drop `group`, which kills the child and its descendants
        let output = tokio::select! {
            result = child.wait_with_output() => result.map_err(InvokeError::Spawn)?,
            _ = tokio::time::sleep(self.timeout) => return Err(InvokeError::Timeout(self.timeout)),
            _ = cancel.cancelled() => return Err(InvokeError::Cancelled),
        };
        group.disarm();

        // Exit status is ignored: the verdict decides pass or fail
        if !output.status.success() {
            debug!("Validator exited with {}", output.status);
        }

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);

        let verdict: Verdict =
            serde_json::from_slice(&combined).map_err(|source| InvokeError::Parse {
                source,
                output: String::from_utf8_lossy(&combined).into_owned(),
            })?;
        debug!(
            reported_ms = verdict.duration_ms,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Validator finished"
        );

        Ok(verdict)
    }
}

/// Kills a validator's whole process group when dropped, unless disarmed
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    trace!("Killing validator process group {}", pgid);
    let _ = killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL);
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}
