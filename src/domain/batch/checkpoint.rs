//! Usage: Resumable batch progress persisted as a JSON checkpoint file.

use crate::shared::error::AppResult;
use crate::shared::fs::{read_optional, write_json_atomic};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    InProgress,
    Completed,
}

/// Logical identity of a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFingerprint {
    pub source_json: String,
    pub source_path: String,
    pub target_name: String,
    pub item_hash: String,
}

impl SourceFingerprint {
    pub fn new(
        source_json: impl Into<String>,
        source_path: impl Into<String>,
        target_name: impl Into<String>,
        items: &[String],
    ) -> Self {
        Self {
            source_json: source_json.into(),
            source_path: source_path.into(),
            target_name: target_name.into(),
            item_hash: hash_items(items),
        }
    }
}

/// SHA-256 (hex) over every item followed by `\n`; order-sensitive.
pub fn hash_items(items: &[String]) -> String {
    let mut hasher = Sha256::new();
    for item in items {
        hasher.update(item.as_bytes());
        hasher.update(b"\n");
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub status: CheckpointStatus,
    pub created_at: i64,
    #[serde(flatten)]
    pub fingerprint: SourceFingerprint,
    pub resource_id: String,
    pub total: usize,
    pub next_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped_items: Option<usize>,
}

impl Checkpoint {
    /// Eligible for resume only on an exact fingerprint match while still in progress.
    pub fn resumable_for(&self, fingerprint: &SourceFingerprint, total: usize) -> bool {
        self.status == CheckpointStatus::InProgress
            && self.fingerprint == *fingerprint
            && self.total == total
            && self.next_index <= self.total
            && !self.resource_id.trim().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unreadable or foreign-shaped files count as "no checkpoint".
    pub fn load(&self) -> AppResult<Option<Checkpoint>> {
        let Some(text) = read_optional(&self.path)? else {
            return Ok(None);
        };
        match serde_json::from_str::<Checkpoint>(&text) {
            Ok(checkpoint) => Ok(Some(checkpoint)),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), "ignoring unreadable checkpoint: {err}");
                Ok(None)
            }
        }
    }

    pub fn save(&self, checkpoint: &Checkpoint) -> AppResult<()> {
        write_json_atomic(&self.path, checkpoint)
    }
}
