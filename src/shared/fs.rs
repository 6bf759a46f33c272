//! Usage: Whole-file atomic writes for state files (token, checkpoint, caches).

use crate::shared::error::{AppError, AppResult};
use serde::Serialize;
use std::path::Path;

pub(crate) fn write_file_atomic(path: &Path, bytes: &[u8]) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            AppError::Io(format!(
                "failed to create dir {}: {e}",
                parent.display()
            ))
        })?;
    }

    let file_name = path.file_name().and_then(|v| v.to_str()).unwrap_or("state");
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

    std::fs::write(&tmp_path, bytes).map_err(|e| {
        AppError::Io(format!(
            "failed to write temp file {}: {e}",
            tmp_path.display()
        ))
    })?;

    // State files hold refresh tokens; keep them owner-only.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600)) {
            tracing::warn!("failed to restrict permissions on {}: {e}", tmp_path.display());
        }
    }

    // Same-directory rename: readers observe either the previous file or the new one.
    std::fs::rename(&tmp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        AppError::Io(format!(
            "failed to finalize file {}: {e}",
            path.display()
        ))
    })?;

    Ok(())
}

pub(crate) fn write_json_atomic(path: &Path, value: &impl Serialize) -> AppResult<()> {
    let mut content = serde_json::to_vec_pretty(value).map_err(|e| {
        AppError::Io(format!(
            "failed to serialize {}: {e}",
            path.display()
        ))
    })?;
    content.push(b'\n');
    write_file_atomic(path, &content)
}

/// Reads a file, treating absence as `None`.
pub(crate) fn read_optional(path: &Path) -> AppResult<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::Io(format!(
            "failed to read {}: {e}",
            path.display()
        ))),
    }
}
