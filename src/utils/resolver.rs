use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Where the analysis interpreter was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedExecutable {
    /// One of the configured absolute locations exists
    Candidate(PathBuf),
    /// No candidate exists; the bare name is left to PATH lookup at spawn time
    Fallback(String),
}

impl ResolvedExecutable {
    pub fn program(&self) -> OsString {
        match self {
            ResolvedExecutable::Candidate(path) => path.clone().into_os_string(),
            ResolvedExecutable::Fallback(name) => OsString::from(name),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ResolvedExecutable::Fallback(_))
    }
}

impl std::fmt::Display for ResolvedExecutable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedExecutable::Candidate(path) => write!(f, "{}", path.display()),
            ResolvedExecutable::Fallback(name) => write!(f, "{}", name),
        }
    }
}

/// Picks the first candidate that exists on disk, otherwise the bare name.
pub fn resolve_executable(candidates: &[PathBuf], fallback: &str) -> ResolvedExecutable {
    resolve_with(candidates, fallback, |path| path.is_file())
}

fn resolve_with<F>(candidates: &[PathBuf], fallback: &str, exists: F) -> ResolvedExecutable
where
    F: Fn(&Path) -> bool,
{
    candidates
        .iter()
        .find(|candidate| exists(candidate))
        .cloned()
        .map(ResolvedExecutable::Candidate)
        .unwrap_or_else(|| ResolvedExecutable::Fallback(fallback.to_string()))
}
