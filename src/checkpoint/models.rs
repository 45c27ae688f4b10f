/*!
 * Checkpoint records.
 *
 * Field names match the on-disk JSON document. Every field is defaulted
 * and unknown fields are ignored so older and newer files both load.
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Processing status of one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Finished successfully; never revisited on resume
    Completed,
    /// Last attempt failed; reattempted on resume
    Failed,
    /// Not attempted yet; unrecognized stored values also read as pending
    #[default]
    #[serde(other)]
    Pending,
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemStatus::Pending => write!(f, "pending"),
            ItemStatus::Completed => write!(f, "completed"),
            ItemStatus::Failed => write!(f, "failed"),
        }
    }
}

/// How an item's subtitle track was obtained.
///
/// Absence (`null` on disk) means no subtitle was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubtitleProvenance {
    /// Subtitles published by the source
    #[serde(rename = "youtube")]
    SourceProvided,
    /// Produced by automatic transcription
    #[serde(rename = "whisper")]
    Synthesized,
    /// Media kept so transcription can run later
    #[serde(rename = "whisper_pending")]
    PendingSynthesis,
}

impl fmt::Display for SubtitleProvenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubtitleProvenance::SourceProvided => write!(f, "source"),
            SubtitleProvenance::Synthesized => write!(f, "transcribed"),
            SubtitleProvenance::PendingSynthesis => write!(f, "transcription pending"),
        }
    }
}

/// One item as stored in the checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemRecord {
    /// 1-based position within the job
    pub index: usize,
    pub title: String,
    #[serde(rename = "video_id")]
    pub item_id: String,
    pub status: ItemStatus,
    /// When the last attempt finished (RFC 3339)
    #[serde(rename = "downloaded_at")]
    pub finished_at: Option<String>,
    #[serde(rename = "subtitle_source")]
    pub provenance: Option<SubtitleProvenance>,
    #[serde(rename = "subtitle_files")]
    pub artifacts: Vec<String>,
    pub error: Option<String>,
}

impl Default for ItemRecord {
    fn default() -> Self {
        Self {
            index: 0,
            title: String::new(),
            item_id: String::new(),
            status: ItemStatus::Pending,
            finished_at: None,
            provenance: None,
            artifacts: Vec::new(),
            error: None,
        }
    }
}

impl ItemRecord {
    pub fn new(index: usize, item_id: String, title: String) -> Self {
        Self {
            index,
            title,
            item_id,
            ..Self::default()
        }
    }

    /// Whether a resumed run must attempt this item again
    pub fn needs_processing(&self) -> bool {
        self.status != ItemStatus::Completed
    }
}

/// What the caller knows about an item when a job is first registered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSeed {
    pub item_id: String,
    pub title: String,
}

impl ItemSeed {
    pub fn new(item_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            title: title.into(),
        }
    }
}

/// The whole checkpoint document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointState {
    #[serde(rename = "playlist_id")]
    pub job_id: String,
    #[serde(rename = "playlist_url")]
    pub source_reference: String,
    pub created_at: String,
    pub last_updated: String,
    #[serde(rename = "total_videos")]
    pub total_items: usize,
    #[serde(rename = "videos")]
    pub items: BTreeMap<String, ItemRecord>,
}

impl CheckpointState {
    /// True when no job has been registered
    pub fn is_empty(&self) -> bool {
        self.job_id.is_empty()
    }

    /// Items ordered by index
    pub fn ordered_items(&self) -> Vec<&ItemRecord> {
        let mut items: Vec<&ItemRecord> = self.items.values().collect();
        items.sort_by_key(|item| item.index);
        items
    }
}

/// Job-level metadata without the item table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobInfo {
    pub job_id: String,
    pub source_reference: String,
    pub created_at: String,
    pub last_updated: String,
    pub total_items: usize,
}

impl JobInfo {
    pub fn from_state(state: &CheckpointState) -> Self {
        Self {
            job_id: state.job_id.clone(),
            source_reference: state.source_reference.clone(),
            created_at: state.created_at.clone(),
            last_updated: state.last_updated.clone(),
            total_items: state.total_items,
        }
    }
}

/// Item counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
}

impl CheckpointSummary {
    pub fn from_state(state: &CheckpointState) -> Self {
        let mut summary = Self {
            total: state.items.len(),
            ..Self::default()
        };
        for item in state.items.values() {
            match item.status {
                ItemStatus::Completed => summary.completed += 1,
                ItemStatus::Failed => summary.failed += 1,
                ItemStatus::Pending => summary.pending += 1,
            }
        }
        summary
    }

    /// Calculate completion percentage
    pub fn completion_percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.completed as f64 / self.total as f64) * 100.0
    }
}

impl fmt::Display for CheckpointSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} completed, {} failed, {} pending",
            self.completed, self.total, self.failed, self.pending
        )
    }
}
