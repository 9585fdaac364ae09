use crate::config::RelayConfig;
use crate::utils::resolver::{ResolvedExecutable, resolve_executable};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

/// Captured result of one analysis process run
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Snapshot of how the runner would be invoked right now
#[derive(Debug, Clone)]
pub struct RunnerStatus {
    pub command: String,
    pub fallback: bool,
    pub script_present: bool,
}

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Failed to launch analysis process '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Analysis script timed out after {0}s")]
    TimedOut(u64),
}

/// Runs the external analysis against a file on disk.
#[async_trait::async_trait]
pub trait AnalysisRunner: Send + Sync {
    /// Run the analysis for `input` and capture both output streams.
    /// A non-zero exit is reported through `ProcessOutput`, not as an error.
    async fn run(&self, input: &Path) -> Result<ProcessOutput, RunnerError>;

    fn status(&self) -> RunnerStatus;
}

/// Invokes `<interpreter> <script> <input>` as a child process.
pub struct ScriptRunner {
    candidates: Vec<PathBuf>,
    executable_name: String,
    script: PathBuf,
    timeout: Option<Duration>,
}

impl ScriptRunner {
    pub fn new(
        candidates: Vec<PathBuf>,
        executable_name: String,
        script: PathBuf,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            candidates,
            executable_name,
            script,
            timeout,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(
            config.executable_candidates.clone(),
            config.executable_name.clone(),
            config.script_path.clone(),
            config.analysis_timeout_secs.map(Duration::from_secs),
        )
    }

    /// Resolved on every call so an interpreter installed after startup is picked up.
    pub fn executable(&self) -> ResolvedExecutable {
        resolve_executable(&self.candidates, &self.executable_name)
    }
}

#[async_trait::async_trait]
impl AnalysisRunner for ScriptRunner {
    async fn run(&self, input: &Path) -> Result<ProcessOutput, RunnerError> {
        let executable = self.executable();
        if executable.is_fallback() {
            warn!(
                "No configured interpreter path exists, falling back to '{}' on PATH",
                executable
            );
        }

        info!(
            "🔬 Running command: [{:?}, {:?}, {:?}]",
            executable.to_string(),
            self.script.display().to_string(),
            input.display().to_string()
        );

        let mut cmd = Command::new(executable.program());
        cmd.arg(&self.script)
            .arg(input)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let spawn_error = |source| RunnerError::Spawn {
            program: executable.to_string(),
            source,
        };

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| RunnerError::TimedOut(limit.as_secs()))?
                .map_err(spawn_error)?,
            None => cmd.output().await.map_err(spawn_error)?,
        };

        Ok(ProcessOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn status(&self) -> RunnerStatus {
        let executable = self.executable();
        RunnerStatus {
            command: executable.to_string(),
            fallback: executable.is_fallback(),
            script_present: self.script.is_file(),
        }
    }
}
