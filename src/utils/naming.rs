use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Extracts the extension of an uploaded filename, or `default` when none is usable.
///
/// Only the final path component is considered and the extension must be
/// ASCII alphanumeric, so a client-supplied name can never influence where
/// the scratch file lands.
pub fn infer_extension(filename: Option<&str>, default: &str) -> String {
    let Some(filename) = filename else {
        return default.to_string();
    };

    // Treat both separators as path boundaries regardless of host platform
    let name = filename.rsplit(['/', '\\']).next().unwrap_or_default();

    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
            ext.to_string()
        }
        Some((_, ext)) if !ext.is_empty() => {
            tracing::warn!("Ignoring unsafe upload extension: {:?}", ext);
            default.to_string()
        }
        _ => default.to_string(),
    }
}

/// Builds `<dir>/<uuid>.<ext>` for a fresh identifier.
pub fn scratch_path(dir: &Path, extension: &str) -> (Uuid, PathBuf) {
    let id = Uuid::new_v4();
    (id, dir.join(format!("{}.{}", id, extension)))
}

/// True when a file stem looks like one of our generated identifiers.
pub fn is_scratch_name(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|stem| Uuid::parse_str(stem).is_ok())
}
