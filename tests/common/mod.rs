/*!
 * Common test utilities for the playscribe test suite
 */

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use playscribe::language_utils::{AvailableSubtitle, AvailableSubtitleSet};
use playscribe::pipeline::{AcquiredMedia, MediaItem, MediaSource, SubtitleSynthesizer};
use playscribe::subtitle_processor::{SubtitleEntry, SubtitleTrack};

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Creates a sample subtitle file for testing
pub fn create_test_subtitle(dir: &Path, filename: &str) -> Result<PathBuf> {
    let content = r#"1
00:00:01,000 --> 00:00:04,000
This is a test subtitle.

2
00:00:05,000 --> 00:00:09,000
It contains multiple entries.

3
00:00:10,000 --> 00:00:14,000
For testing purposes.
"#;
    create_test_file(dir, filename, content)
}

/// Track of `count` entries with ids "1".."count" and distinct timings
pub fn sample_track(count: usize) -> SubtitleTrack {
    let entries = (1..=count)
        .map(|i| {
            let start = SubtitleEntry::format_timestamp((i - 1) as f64 * 2.0);
            let end = SubtitleEntry::format_timestamp((i - 1) as f64 * 2.0 + 1.5);
            SubtitleEntry::new(i.to_string(), format!("{} --> {}", start, end), format!("Line number {}", i))
        })
        .collect();
    SubtitleTrack::new(entries)
}

/// Item with the given manual and automatic subtitle tags
pub fn media_item(index: usize, id: &str, title: &str, manual: &[&str], automatic: &[&str]) -> MediaItem {
    MediaItem::new(index, id, title).with_subtitles(AvailableSubtitleSet::from_source_listing(manual, automatic))
}

// =========================================================================
// Scripted media source
// =========================================================================

/// Media source returning a fixed listing and writing placeholder files
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    items: Vec<MediaItem>,
    fail_listing: bool,
    failing_ids: Arc<Mutex<HashSet<String>>>,
    acquisitions: Arc<Mutex<HashMap<String, usize>>>,
}

impl ScriptedSource {
    pub fn new(items: Vec<MediaItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    /// Source whose listing always fails
    pub fn unlistable() -> Self {
        Self {
            fail_listing: true,
            ..Self::default()
        }
    }

    /// Make `acquire` fail for `id` until `heal` is called
    pub fn fail_item(&self, id: &str) {
        self.failing_ids.lock().insert(id.to_string());
    }

    pub fn heal(&self, id: &str) {
        self.failing_ids.lock().remove(id);
    }

    /// Number of `acquire` calls for `id`
    pub fn acquisitions(&self, id: &str) -> usize {
        self.acquisitions.lock().get(id).copied().unwrap_or(0)
    }

    pub fn total_acquisitions(&self) -> usize {
        self.acquisitions.lock().values().sum()
    }
}

#[async_trait]
impl MediaSource for ScriptedSource {
    async fn enumerate(&self, source_reference: &str) -> Result<Vec<MediaItem>> {
        if self.fail_listing {
            return Err(anyhow!("listing unavailable for {}", source_reference));
        }
        Ok(self.items.clone())
    }

    async fn acquire(
        &self,
        item: &MediaItem,
        subtitle: Option<&AvailableSubtitle>,
        destination: &Path,
    ) -> Result<AcquiredMedia> {
        *self.acquisitions.lock().entry(item.id.clone()).or_insert(0) += 1;
        if self.failing_ids.lock().contains(&item.id) {
            return Err(anyhow!("download of {} failed", item.id));
        }

        fs::create_dir_all(destination)?;
        let stem = format!("{}. {}", item.index, item.title);
        let media = destination.join(format!("{}.mp3", stem));
        fs::write(&media, b"audio")?;

        let mut acquired = AcquiredMedia {
            media_path: Some(media),
            subtitle_paths: Vec::new(),
        };
        if let Some(subtitle) = subtitle {
            let path = destination.join(format!("{}.{}.srt", stem, subtitle.reported));
            fs::write(&path, "1\n00:00:00,000 --> 00:00:01,000\nHello\n")?;
            acquired.subtitle_paths.push(path);
        }
        Ok(acquired)
    }
}

// =========================================================================
// Recording synthesizer
// =========================================================================

/// Synthesizer writing a one-line SRT and counting calls
#[derive(Debug, Clone, Default)]
pub struct RecordingSynthesizer {
    calls: Arc<Mutex<Vec<PathBuf>>>,
    failing: bool,
}

impl RecordingSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn outputs(&self) -> Vec<PathBuf> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl SubtitleSynthesizer for RecordingSynthesizer {
    async fn synthesize(&self, _media: &Path, output: &Path, _language: Option<&str>) -> Result<PathBuf> {
        self.calls.lock().push(output.to_path_buf());
        if self.failing {
            return Err(anyhow!("speech-to-text unavailable"));
        }
        fs::write(output, "1\n00:00:00,000 --> 00:00:01,000\nTranscribed\n")?;
        Ok(output.to_path_buf())
    }
}
