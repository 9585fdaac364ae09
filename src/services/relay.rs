use crate::infrastructure::scratch::ScratchFile;
use crate::services::analysis::{AnalysisRunner, RunnerError};
use crate::utils::naming::{infer_extension, scratch_path};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Failed to save upload: {0}")]
    Upload(#[source] std::io::Error),

    #[error("Analysis script failed: {stderr}")]
    ScriptFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to parse analysis output")]
    InvalidOutput(#[source] serde_json::Error),

    #[error(transparent)]
    Runner(#[from] RunnerError),
}

/// Upload → scratch file → external analysis → parsed JSON.
pub struct RelayService {
    scratch_dir: PathBuf,
    default_extension: String,
    runner: Arc<dyn AnalysisRunner>,
}

impl RelayService {
    /// `scratch_dir` should already exist and be absolute, see
    /// [`crate::infrastructure::scratch::init_scratch_dir`].
    pub fn new(
        scratch_dir: PathBuf,
        default_extension: String,
        runner: Arc<dyn AnalysisRunner>,
    ) -> Self {
        Self {
            scratch_dir,
            default_extension,
            runner,
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn runner(&self) -> &Arc<dyn AnalysisRunner> {
        &self.runner
    }

    /// Runs one upload through the external analysis.
    ///
    /// The scratch file is removed before this returns on every path,
    /// including when the returned future is dropped mid-flight.
    pub async fn handle<R>(&self, reader: R, filename: Option<&str>) -> Result<Value, RelayError>
    where
        R: AsyncRead + Send,
    {
        let extension = infer_extension(filename, &self.default_extension);
        let (upload_id, path) = scratch_path(&self.scratch_dir, &extension);
        info!(
            "📊 Analyzing upload {} (filename: {:?})",
            upload_id,
            filename.unwrap_or("<none>")
        );

        let scratch = self.save_upload(reader, path).await?;

        let output = self.runner.run(scratch.path()).await?;

        if !output.success {
            error!(
                "Analysis failed for {} (exit code {:?})",
                upload_id, output.exit_code
            );
            error!("Analysis stderr: {}", output.stderr);
            error!("Analysis stdout: {}", output.stdout);
            return Err(RelayError::ScriptFailed {
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }

        let parsed = serde_json::from_str(&output.stdout).map_err(|e| {
            error!("Analysis output parse error for {}: {}. Raw: {}", upload_id, e, output.stdout);
            RelayError::InvalidOutput(e)
        })?;

        info!("✅ Analysis complete for {}", upload_id);
        Ok(parsed)
    }

    async fn save_upload<R>(&self, reader: R, path: PathBuf) -> Result<ScratchFile, RelayError>
    where
        R: AsyncRead + Send,
    {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(RelayError::Upload)?;

        // Owned from here on, so a failed copy still cleans up
        let scratch = ScratchFile::new(path);

        let mut reader = std::pin::pin!(reader);
        tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(RelayError::Upload)?;
        file.flush().await.map_err(RelayError::Upload)?;

        Ok(scratch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::analysis::{ProcessOutput, RunnerStatus};
    use std::sync::Mutex;

    /// Records what the process would have seen and replies with a canned output
    struct RecordingRunner {
        reply: ProcessOutput,
        seen: Mutex<Vec<(PathBuf, Vec<u8>)>>,
    }

    impl RecordingRunner {
        fn replying(success: bool, stdout: &str, stderr: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: ProcessOutput {
                    success,
                    exit_code: Some(if success { 0 } else { 1 }),
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                },
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<(PathBuf, Vec<u8>)> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl AnalysisRunner for RecordingRunner {
        async fn run(&self, input: &Path) -> Result<ProcessOutput, RunnerError> {
            let contents = std::fs::read(input).unwrap();
            self.seen
                .lock()
                .unwrap()
                .push((input.to_path_buf(), contents));
            Ok(self.reply.clone())
        }

        fn status(&self) -> RunnerStatus {
            RunnerStatus {
                command: "recording".to_string(),
                fallback: false,
                script_present: true,
            }
        }
    }

    struct TimingOutRunner;

    #[async_trait::async_trait]
    impl AnalysisRunner for TimingOutRunner {
        async fn run(&self, _input: &Path) -> Result<ProcessOutput, RunnerError> {
            Err(RunnerError::TimedOut(30))
        }

        fn status(&self) -> RunnerStatus {
            RunnerStatus {
                command: "stuck".to_string(),
                fallback: false,
                script_present: true,
            }
        }
    }

    /// Fails after yielding a few bytes
    struct BrokenReader {
        sent: bool,
    }

    impl AsyncRead for BrokenReader {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            if self.sent {
                std::task::Poll::Ready(Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "client went away",
                )))
            } else {
                self.sent = true;
                buf.put_slice(b"a,b\n");
                std::task::Poll::Ready(Ok(()))
            }
        }
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_success_returns_parsed_output() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::replying(true, r#"{"rows": 2, "columns": ["a", "b"]}"#, "");
        let relay = RelayService::new(dir.path().to_path_buf(), "csv".to_string(), runner.clone());

        let result = relay
            .handle(&b"a,b\n1,2\n3,4\n"[..], Some("data.csv"))
            .await
            .unwrap();

        assert_eq!(result, serde_json::json!({"rows": 2, "columns": ["a", "b"]}));

        let seen = runner.seen();
        assert_eq!(seen.len(), 1);
        let (path, contents) = &seen[0];
        assert!(path.is_absolute());
        assert_eq!(path.parent(), Some(dir.path()));
        assert_eq!(path.extension().unwrap(), "csv");
        assert_eq!(contents, b"a,b\n1,2\n3,4\n");
        assert!(!path.exists());
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_default_extension_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::replying(true, "[]", "");
        let relay = RelayService::new(dir.path().to_path_buf(), "csv".to_string(), runner.clone());

        relay.handle(&b"x"[..], Some("measurements")).await.unwrap();
        relay.handle(&b"y"[..], None).await.unwrap();
        relay.handle(&b"z"[..], Some("sheet.xlsx")).await.unwrap();

        let extensions: Vec<String> = runner
            .seen()
            .iter()
            .map(|(p, _)| p.extension().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(extensions, vec!["csv", "csv", "xlsx"]);
    }

    #[tokio::test]
    async fn test_script_failure_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::replying(false, "", "Error in read.csv: no lines available");
        let relay = RelayService::new(dir.path().to_path_buf(), "csv".to_string(), runner);

        let err = relay.handle(&b""[..], Some("empty.csv")).await.unwrap_err();

        assert!(matches!(err, RelayError::ScriptFailed { .. }));
        assert!(err.to_string().contains("Error in read.csv: no lines available"));
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_unparsable_output() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::replying(true, "[1] \"not json\"", "");
        let relay = RelayService::new(dir.path().to_path_buf(), "csv".to_string(), runner);

        let err = relay.handle(&b"a\n1\n"[..], Some("a.csv")).await.unwrap_err();

        assert!(matches!(err, RelayError::InvalidOutput(_)));
        assert_eq!(err.to_string(), "Failed to parse analysis output");
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_runner_error_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let relay = RelayService::new(
            dir.path().to_path_buf(),
            "csv".to_string(),
            Arc::new(TimingOutRunner),
        );

        let err = relay.handle(&b"a\n1\n"[..], Some("a.csv")).await.unwrap_err();

        assert_eq!(err.to_string(), "Analysis script timed out after 30s");
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_upload_io_failure_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::replying(true, "{}", "");
        let relay = RelayService::new(dir.path().to_path_buf(), "csv".to_string(), runner.clone());

        let err = relay
            .handle(BrokenReader { sent: false }, Some("a.csv"))
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Upload(_)));
        assert!(err.to_string().starts_with("Failed to save upload: "));
        assert!(err.to_string().contains("client went away"));
        assert!(runner.seen().is_empty());
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_missing_scratch_dir_is_upload_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::replying(true, "{}", "");
        let relay = RelayService::new(dir.path().join("gone"), "csv".to_string(), runner);

        let err = relay.handle(&b"x"[..], Some("a.csv")).await.unwrap_err();
        assert!(matches!(err, RelayError::Upload(_)));
    }

    #[tokio::test]
    async fn test_concurrent_uploads_never_share_a_path() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::replying(true, "{}", "");
        let relay = Arc::new(RelayService::new(
            dir.path().to_path_buf(),
            "csv".to_string(),
            runner.clone(),
        ));

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let relay = relay.clone();
                tokio::spawn(async move {
                    let body = format!("value\n{}\n", i).into_bytes();
                    relay.handle(&body[..], Some("same-name.csv")).await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let seen = runner.seen();
        let unique: std::collections::HashSet<_> = seen.iter().map(|(p, _)| p.clone()).collect();
        assert_eq!(seen.len(), 32);
        assert_eq!(unique.len(), 32);
        assert!(dir_is_empty(dir.path()));
    }
}
