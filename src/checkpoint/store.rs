/*!
 * Checkpoint store for resumable pipeline runs.
 *
 * This module handles:
 * - Loading an existing checkpoint (a corrupt file means a fresh start)
 * - Registering a job, or resuming it when the identity matches
 * - Write-through status updates for each item
 * - Clearing the checkpoint once a run is no longer needed
 */

use chrono::Utc;
use log::{debug, error, info, warn};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::truncate_message;
use crate::file_utils::{FileManager, indexed_stem};

use super::models::{
    CheckpointState, CheckpointSummary, ItemRecord, ItemSeed, ItemStatus, JobInfo,
    SubtitleProvenance,
};

/// Maximum stored length of an item error, in characters
pub const MAX_ERROR_CHARS: usize = 500;

/// Deterministic identity for a source reference: first 16 hex chars of its SHA-256
pub fn job_identity(source_reference: &str) -> String {
    let digest = Sha256::digest(source_reference.as_bytes());
    let hex = format!("{:x}", digest);
    hex[..16].to_string()
}

/// `<output_dir>/.checkpoint_<identity>.json`
pub fn checkpoint_path<P: AsRef<Path>>(output_dir: P, source_reference: &str) -> PathBuf {
    output_dir
        .as_ref()
        .join(format!(".checkpoint_{}.json", job_identity(source_reference)))
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Owns the checkpoint file for one job run
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    state: CheckpointState,
}

impl CheckpointStore {
    /// Open a checkpoint at `path`, loading it when present.
    ///
    /// Never fails: an unreadable or invalid file is logged and replaced
    /// by an empty state.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let state = Self::load(&path);
        Self { path, state }
    }

    /// Open the checkpoint belonging to `source_reference` under `output_dir`
    pub fn for_source<P: AsRef<Path>>(output_dir: P, source_reference: &str) -> Self {
        Self::open(checkpoint_path(output_dir, source_reference))
    }

    fn load(path: &Path) -> CheckpointState {
        if !path.exists() {
            return CheckpointState::default();
        }

        let parsed = fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|content| serde_json::from_str::<CheckpointState>(&content).map_err(Into::into));

        match parsed {
            Ok(state) => {
                info!("Loaded checkpoint: {}", path.display());
                state
            }
            Err(e) => {
                warn!("Failed to load checkpoint {}, starting fresh: {}", path.display(), e);
                CheckpointState::default()
            }
        }
    }

    /// Persist the current state. Failures are logged, never raised.
    fn save(&self) {
        let result = serde_json::to_string_pretty(&self.state)
            .map_err(anyhow::Error::from)
            .and_then(|json| FileManager::write_to_file(&self.path, &json));

        if let Err(e) = result {
            error!("Failed to save checkpoint {}: {}", self.path.display(), e);
        }
    }

    // =========================================================================
    // Job registration
    // =========================================================================

    /// Register a job, or resume it.
    ///
    /// When the loaded state already carries `job_id` this does nothing and
    /// the supplied item list is ignored. Otherwise the state is replaced
    /// and every item starts as pending, indexed from 1 in the given order.
    pub fn initialize(&mut self, job_id: &str, source_reference: &str, items: &[ItemSeed]) {
        if !self.state.is_empty() && self.state.job_id == job_id {
            info!("Resuming existing job {}", &job_id[..8.min(job_id.len())]);
            return;
        }

        let timestamp = now();
        let mut records = BTreeMap::new();
        for (position, seed) in items.iter().enumerate() {
            let index = position + 1;
            let item_id = if seed.item_id.is_empty() {
                index.to_string()
            } else {
                seed.item_id.clone()
            };
            let title = if seed.title.is_empty() {
                format!("Video {}", index)
            } else {
                seed.title.clone()
            };
            records.insert(item_id.clone(), ItemRecord::new(index, item_id, title));
        }

        self.state = CheckpointState {
            job_id: job_id.to_string(),
            source_reference: source_reference.to_string(),
            created_at: timestamp.clone(),
            last_updated: timestamp,
            total_items: items.len(),
            items: records,
        };

        self.save();
        info!("Checkpoint initialized: {} item(s)", items.len());
    }

    /// `initialize` with the identity derived from the source reference
    pub fn initialize_for_source(&mut self, source_reference: &str, items: &[ItemSeed]) {
        let job_id = job_identity(source_reference);
        self.initialize(&job_id, source_reference, items);
    }

    // =========================================================================
    // Item state transitions
    // =========================================================================

    /// False when the item or the whole item table is unknown
    pub fn is_completed(&self, item_id: &str) -> bool {
        self.state
            .items
            .get(item_id)
            .is_some_and(|item| item.status == ItemStatus::Completed)
    }

    /// Record a successful attempt. Unknown ids are ignored with a warning.
    pub fn mark_completed(
        &mut self,
        item_id: &str,
        provenance: Option<SubtitleProvenance>,
        artifacts: Vec<String>,
    ) {
        let timestamp = now();
        let Some(item) = self.state.items.get_mut(item_id) else {
            warn!("Item not found in checkpoint: {}", item_id);
            return;
        };

        item.status = ItemStatus::Completed;
        item.finished_at = Some(timestamp.clone());
        item.provenance = provenance;
        item.artifacts = artifacts;
        item.error = None;
        self.state.last_updated = timestamp;
        self.save();

        let summary = self.summary();
        debug!("Progress: {}/{} items", summary.completed, self.state.total_items);
    }

    /// Record a failed attempt with a bounded error message.
    /// Unknown ids are ignored with a warning.
    pub fn mark_failed(&mut self, item_id: &str, error: &str) {
        let timestamp = now();
        let Some(item) = self.state.items.get_mut(item_id) else {
            warn!("Item not found in checkpoint: {}", item_id);
            return;
        };

        item.status = ItemStatus::Failed;
        item.error = Some(truncate_message(error, MAX_ERROR_CHARS));
        item.finished_at = Some(timestamp.clone());
        self.state.last_updated = timestamp;
        self.save();
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Pending and failed items, ordered by index
    pub fn pending_items(&self) -> Vec<ItemRecord> {
        self.state
            .ordered_items()
            .into_iter()
            .filter(|item| item.needs_processing())
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> CheckpointSummary {
        CheckpointSummary::from_state(&self.state)
    }

    /// Job metadata, or `None` when nothing is registered
    pub fn job(&self) -> Option<JobInfo> {
        (!self.state.is_empty()).then(|| JobInfo::from_state(&self.state))
    }

    pub fn item(&self, item_id: &str) -> Option<&ItemRecord> {
        self.state.items.get(item_id)
    }

    /// All items ordered by index
    pub fn items(&self) -> Vec<&ItemRecord> {
        self.state.ordered_items()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `item id -> "<index>. <sanitized title>"` for renaming downloaded files
    pub fn rename_map(&self) -> BTreeMap<String, String> {
        self.state
            .items
            .values()
            .map(|item| (item.item_id.clone(), indexed_stem(item.index, &item.title)))
            .collect()
    }

    // =========================================================================
    // Cleanup
    // =========================================================================

    /// Delete the checkpoint file and reset the in-memory state
    pub fn clear(&mut self) {
        if self.path.exists() {
            match fs::remove_file(&self.path) {
                Ok(()) => info!("Checkpoint removed: {}", self.path.display()),
                Err(e) => error!("Failed to remove checkpoint {}: {}", self.path.display(), e),
            }
        }
        self.state = CheckpointState::default();
    }
}
