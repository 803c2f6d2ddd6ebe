//! Staging key layout: `{kind}s/raw/{task_id}{ext}` for source media and
//! `{kind}s/converted/{task_id}.webp` for artifacts.

use sticker_models::{MediaKind, TaskId, WEBP_EXTENSION};

use crate::error::{StorageError, StorageResult};

/// Make a task id safe to use as a single path segment.
pub fn sanitize_segment(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Key of the staged source media.
pub fn raw_key(kind: MediaKind, task_id: &TaskId, extension: &str) -> String {
    format!(
        "{}/raw/{}{}",
        kind.staging_dir(),
        sanitize_segment(task_id.as_str()),
        extension
    )
}

/// Key of the converted artifact.
pub fn converted_key(kind: MediaKind, task_id: &TaskId) -> String {
    format!(
        "{}/converted/{}{}",
        kind.staging_dir(),
        sanitize_segment(task_id.as_str()),
        WEBP_EXTENSION
    )
}

/// Reject keys that could escape the staging root.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    if key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
