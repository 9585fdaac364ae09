use std::env;
use std::path::PathBuf;

const DEFAULT_SCRIPT_NAME: &str = "stats.R";

/// Runtime configuration for the upload relay
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Directory for request-scoped scratch files (default: "temp_uploads")
    pub scratch_dir: PathBuf,

    /// Extension used when the upload has none (default: "csv")
    pub default_extension: String,

    /// Absolute interpreter locations tried in order before the bare name
    pub executable_candidates: Vec<PathBuf>,

    /// Interpreter name resolved through PATH when no candidate exists (default: "Rscript")
    pub executable_name: String,

    /// Companion analysis script passed as the first argument
    /// (default: "stats.R" in the directory of the running binary)
    pub script_path: PathBuf,

    /// Upper bound on how long the analysis process may run. None waits forever.
    pub analysis_timeout_secs: Option<u64>,

    /// Maximum accepted request body in bytes (default: 100 MB)
    pub max_upload_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from("temp_uploads"),
            default_extension: "csv".to_string(),
            executable_candidates: default_executable_candidates(),
            executable_name: "Rscript".to_string(),
            script_path: default_script_path(),
            analysis_timeout_secs: None,
            max_upload_size: 100 * 1024 * 1024, // 100 MB
        }
    }
}

/// `stats.R` beside the running binary, or in the working directory if the
/// binary's location cannot be determined.
fn default_script_path() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_SCRIPT_NAME)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRIPT_NAME))
}

#[cfg(windows)]
fn default_executable_candidates() -> Vec<PathBuf> {
    vec![PathBuf::from(r"C:\Program Files\R\R-4.5.2\bin\Rscript.exe")]
}

#[cfg(not(windows))]
fn default_executable_candidates() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/usr/local/bin/Rscript"),
        PathBuf::from("/usr/bin/Rscript"),
    ]
}

fn parse_path_list(value: &str) -> Vec<PathBuf> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

impl RelayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            scratch_dir: env::var("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.scratch_dir),

            default_extension: env::var("DEFAULT_EXTENSION")
                .ok()
                .map(|v| v.trim_start_matches('.').to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default.default_extension),

            executable_candidates: env::var("ANALYSIS_EXECUTABLE_PATHS")
                .ok()
                .map(|v| parse_path_list(&v))
                .unwrap_or(default.executable_candidates),

            executable_name: env::var("ANALYSIS_EXECUTABLE").unwrap_or(default.executable_name),

            script_path: env::var("ANALYSIS_SCRIPT")
                .map(PathBuf::from)
                .unwrap_or(default.script_path),

            analysis_timeout_secs: env::var("ANALYSIS_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs: &u64| *secs > 0),

            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_size),
        }
    }
}
