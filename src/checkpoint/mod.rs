/*!
 * Durable per-item progress tracking for a pipeline run.
 *
 * This module provides:
 * - Deterministic job identity derived from the source reference
 * - A JSON checkpoint file written through on every mutation
 * - Resume queries (pending items, progress summary)
 */

pub mod models;
pub mod store;

// Re-export main types
pub use models::{
    CheckpointState, CheckpointSummary, ItemRecord, ItemSeed, ItemStatus, JobInfo,
    SubtitleProvenance,
};
pub use store::{CheckpointStore, checkpoint_path, job_identity};
