use crate::utils::naming::is_scratch_name;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Creates the scratch directory if needed and returns its absolute path.
/// Safe to call repeatedly.
pub async fn init_scratch_dir(dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create scratch directory {}", dir.display()))?;

    let absolute = tokio::fs::canonicalize(dir)
        .await
        .with_context(|| format!("Failed to resolve scratch directory {}", dir.display()))?;

    info!("🗂️  Scratch directory: {}", absolute.display());
    Ok(absolute)
}

/// Removes scratch files left behind by a previous process that died mid-request.
/// Only files named like generated scratch files are touched.
pub async fn sweep_stale(dir: &Path) -> Result<usize> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read scratch directory {}", dir.display()))?;

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() || !is_scratch_name(&path) {
            continue;
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove stale scratch file {}: {}", path.display(), e),
        }
    }

    if removed > 0 {
        info!("🧹 Removed {} stale scratch file(s)", removed);
    }
    Ok(removed)
}

/// A request-scoped scratch file. The file is deleted when the guard drops,
/// whichever way the owning scope exits.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        // Drop cannot await; a single unlink is short enough to run inline on the worker
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed scratch file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove scratch file {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}
