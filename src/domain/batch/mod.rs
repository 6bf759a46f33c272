pub(crate) mod checkpoint;
pub(crate) mod runner;

pub use checkpoint::{hash_items, Checkpoint, CheckpointStatus, CheckpointStore, SourceFingerprint};
pub use runner::{BatchTarget, CheckpointedBatchRunner, RunOutcome, DEFAULT_BATCH_SIZE};
