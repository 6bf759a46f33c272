//! Usage: Create-then-append batch driver that resumes from its checkpoint after a restart.

use super::checkpoint::{Checkpoint, CheckpointStatus, CheckpointStore, SourceFingerprint};
use crate::shared::error::{AppError, AppResult};
use crate::shared::time::now_unix_seconds;
use std::path::PathBuf;

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// The remote side of a batch run.
#[allow(async_fn_in_trait)]
pub trait BatchTarget {
    /// Creates the resource items are appended to and returns its id.
    async fn create_resource(&mut self) -> AppResult<String>;

    async fn apply_batch(&mut self, resource_id: &str, items: &[String]) -> AppResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub resource_id: String,
    pub total: usize,
    /// Items applied by this invocation.
    pub applied: usize,
    pub resumed: bool,
}

#[derive(Debug, Clone)]
pub struct CheckpointedBatchRunner {
    store: CheckpointStore,
    batch_size: usize,
    resume: bool,
    skipped_items: Option<usize>,
}

impl CheckpointedBatchRunner {
    pub fn new(checkpoint_path: impl Into<PathBuf>) -> Self {
        Self {
            store: CheckpointStore::new(checkpoint_path),
            batch_size: DEFAULT_BATCH_SIZE,
            resume: true,
            skipped_items: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Recorded in fresh checkpoints for the operator's benefit.
    pub fn with_skipped_items(mut self, skipped_items: usize) -> Self {
        self.skipped_items = Some(skipped_items);
        self
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Applies `items` to the target in order. A failed batch leaves the checkpoint
    /// `in_progress` at the last persisted `next_index`.
    pub async fn run<T: BatchTarget>(
        &self,
        fingerprint: &SourceFingerprint,
        items: &[String],
        target: &mut T,
    ) -> AppResult<RunOutcome> {
        let total = items.len();
        let previous = if self.resume { self.store.load()? } else { None };

        let (mut checkpoint, resumed) = match previous {
            Some(checkpoint) if checkpoint.resumable_for(fingerprint, total) => {
                tracing::info!(
                    resource_id = %checkpoint.resource_id,
                    "resuming at {}/{}",
                    checkpoint.next_index,
                    checkpoint.total
                );
                (checkpoint, true)
            }
            _ => {
                let resource_id = target.create_resource().await?;
                if resource_id.trim().is_empty() {
                    return Err(AppError::MalformedResponse(
                        "created resource has no id".to_string(),
                    ));
                }
                let checkpoint = Checkpoint {
                    status: CheckpointStatus::InProgress,
                    created_at: now_unix_seconds(),
                    fingerprint: fingerprint.clone(),
                    resource_id,
                    total,
                    next_index: 0,
                    completed_at: None,
                    skipped_items: self.skipped_items,
                };
                self.store.save(&checkpoint)?;
                tracing::info!(resource_id = %checkpoint.resource_id, total, "created target resource");
                (checkpoint, false)
            }
        };

        let start = checkpoint.next_index;
        while checkpoint.next_index < total {
            let from = checkpoint.next_index;
            let to = (from + self.batch_size).min(total);
            tracing::info!("applying items {}-{} of {}", from + 1, to, total);
            target
                .apply_batch(&checkpoint.resource_id, &items[from..to])
                .await?;
            checkpoint.next_index = to;
            self.store.save(&checkpoint)?;
        }

        checkpoint.status = CheckpointStatus::Completed;
        checkpoint.completed_at = Some(now_unix_seconds());
        self.store.save(&checkpoint)?;

        Ok(RunOutcome {
            resource_id: checkpoint.resource_id,
            total,
            applied: total - start,
            resumed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingTarget {
        created: usize,
        batches: Vec<Vec<String>>,
        fail_on_batch: Option<usize>,
    }

    impl BatchTarget for RecordingTarget {
        async fn create_resource(&mut self) -> AppResult<String> {
            self.created += 1;
            Ok(format!("res-{}", self.created))
        }

        async fn apply_batch(&mut self, resource_id: &str, items: &[String]) -> AppResult<()> {
            assert!(resource_id.starts_with("res-"));
            if self.fail_on_batch == Some(self.batches.len()) {
                return Err(AppError::TransientServerError {
                    status: Some(503),
                    message: "boom".to_string(),
                });
            }
            self.batches.push(items.to_vec());
            Ok(())
        }
    }

    fn items(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("item-{i}")).collect()
    }

    #[tokio::test]
    async fn fresh_run_creates_once_and_slices_batches() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = CheckpointedBatchRunner::new(dir.path().join("cp.json"));
        let items = items(250);
        let fp = SourceFingerprint::new("a.json", "mix.items", "Mix", &items);
        let mut target = RecordingTarget::default();

        let outcome = runner.run(&fp, &items, &mut target).await.expect("run");

        assert_eq!(target.created, 1);
        let sizes: Vec<usize> = target.batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_eq!(outcome.applied, 250);
        assert!(!outcome.resumed);

        let saved = runner.store().load().expect("load").expect("checkpoint");
        assert_eq!(saved.status, CheckpointStatus::Completed);
        assert_eq!(saved.next_index, 250);
        assert!(saved.completed_at.is_some());
    }

    #[tokio::test]
    async fn failed_batch_leaves_progress_in_progress() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = CheckpointedBatchRunner::new(dir.path().join("cp.json"));
        let items = items(250);
        let fp = SourceFingerprint::new("a.json", "mix.items", "Mix", &items);
        let mut target = RecordingTarget {
            fail_on_batch: Some(1),
            ..RecordingTarget::default()
        };

        let err = runner.run(&fp, &items, &mut target).await.expect_err("fails");
        assert_eq!(err.code(), "API_TRANSIENT");

        let saved = runner.store().load().expect("load").expect("checkpoint");
        assert_eq!(saved.status, CheckpointStatus::InProgress);
        assert_eq!(saved.next_index, 100);
    }

    #[tokio::test]
    async fn resume_disabled_always_starts_fresh() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cp.json");
        let items = items(3);
        let fp = SourceFingerprint::new("a.json", "mix.items", "Mix", &items);

        let mut failing = RecordingTarget {
            fail_on_batch: Some(0),
            ..RecordingTarget::default()
        };
        let _ = CheckpointedBatchRunner::new(&path)
            .run(&fp, &items, &mut failing)
            .await;

        let mut target = RecordingTarget::default();
        let outcome = CheckpointedBatchRunner::new(&path)
            .with_resume(false)
            .run(&fp, &items, &mut target)
            .await
            .expect("run");
        assert_eq!(target.created, 1);
        assert!(!outcome.resumed);
        assert_eq!(outcome.applied, 3);
    }
}
