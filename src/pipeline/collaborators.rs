/*!
 * Contracts the orchestrator consumes.
 *
 * The orchestrator never talks to a network client or a transcoder directly.
 * It drives a `MediaSource` (listing and downloading items) and a
 * `SubtitleSynthesizer` (producing a subtitle track from audio), so tests can
 * substitute scripted implementations.
 */

use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

use crate::checkpoint::ItemSeed;
use crate::language_utils::{AvailableSubtitle, AvailableSubtitleSet};

/// One item reported by a source listing
#[derive(Debug, Clone, PartialEq)]
pub struct MediaItem {
    /// 1-based position in the listing
    pub index: usize,
    /// Identifier as reported by the source
    pub id: String,
    pub title: String,
    /// Length in seconds, when known
    pub duration: Option<f64>,
    /// Subtitle tracks the source offers
    pub subtitles: AvailableSubtitleSet,
}

impl MediaItem {
    pub fn new(index: usize, id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            index,
            id: id.into(),
            title: title.into(),
            duration: None,
            subtitles: AvailableSubtitleSet::new(),
        }
    }

    pub fn with_subtitles(mut self, subtitles: AvailableSubtitleSet) -> Self {
        self.subtitles = subtitles;
        self
    }

    /// Seed for checkpoint registration
    pub fn seed(&self) -> ItemSeed {
        ItemSeed::new(self.id.clone(), self.title.clone())
    }
}

/// Files produced by acquiring one item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquiredMedia {
    /// Downloaded audio or video, absent when only subtitles were fetched
    pub media_path: Option<PathBuf>,
    /// Subtitle files fetched alongside the media
    pub subtitle_paths: Vec<PathBuf>,
}

/// Lists and downloads items from a source reference
#[async_trait]
pub trait MediaSource: Send + Sync + Debug {
    /// Ordered items of a source; an error here aborts the whole run
    async fn enumerate(&self, source_reference: &str) -> Result<Vec<MediaItem>>;

    /// Download one item into `destination`, with `subtitle` when one was
    /// selected. Must be safe to call again for the same item.
    async fn acquire(
        &self,
        item: &MediaItem,
        subtitle: Option<&AvailableSubtitle>,
        destination: &Path,
    ) -> Result<AcquiredMedia>;
}

/// Produces a subtitle file from an audio file
#[async_trait]
pub trait SubtitleSynthesizer: Send + Sync + Debug {
    /// Transcribe `media` into an SRT file at `output`.
    /// Must be safe to call again for the same input.
    async fn synthesize(&self, media: &Path, output: &Path, language: Option<&str>) -> Result<PathBuf>;
}
