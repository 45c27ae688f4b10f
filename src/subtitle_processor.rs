use anyhow::{Context, Result};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::file_utils::FileManager;

// @module: Subtitle track grammar and manipulation

// @const: Blank-line block separator, tolerant of trailing spaces
static BLOCK_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").unwrap());

// @const: SRT timing span
static TIMING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{2}:\d{2}:\d{2}[,.]\d{3}\s+-->\s+\d{2}:\d{2}:\d{2}[,.]\d{3}").unwrap()
});

// @struct: Single subtitle block
//
// Index and timing are kept exactly as read; only `text` is ever rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleEntry {
    // @field: Sequence label, verbatim
    pub index: String,

    // @field: `HH:MM:SS,mmm --> HH:MM:SS,mmm`, verbatim
    pub timing: String,

    // @field: One or more text lines joined by `\n`
    pub text: String,
}

impl SubtitleEntry {
    pub fn new(index: impl Into<String>, timing: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            timing: timing.into(),
            text: text.into(),
        }
    }

    /// Same block with different text
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            index: self.index.clone(),
            timing: self.timing.clone(),
            text: text.into(),
        }
    }

    /// Format seconds as `HH:MM:SS,mmm`
    pub fn format_timestamp(seconds: f64) -> String {
        let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
        let hours = total_ms / 3_600_000;
        let minutes = (total_ms % 3_600_000) / 60_000;
        let secs = (total_ms % 60_000) / 1_000;
        let millis = total_ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
    }
}

impl fmt::Display for SubtitleEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.index)?;
        writeln!(f, "{}", self.timing)?;
        writeln!(f, "{}", self.text)?;
        writeln!(f)
    }
}

/// One time-aligned segment of a transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Transcript of one audio chunk, times relative to the chunk start
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
}

/// Ordered sequence of subtitle blocks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtitleTrack {
    pub entries: Vec<SubtitleEntry>,
}

impl SubtitleTrack {
    pub fn new(entries: Vec<SubtitleEntry>) -> Self {
        Self { entries }
    }

    /// Parse SRT text. Blocks missing an index, a timing line or any text
    /// are skipped.
    pub fn parse(content: &str) -> Self {
        let normalized = content.replace("\r\n", "\n");
        let normalized = normalized.trim_start_matches('\u{feff}').trim();

        let mut entries = Vec::new();
        for block in BLOCK_SEPARATOR.split(normalized) {
            let lines: Vec<&str> = block.trim().lines().collect();
            if lines.len() < 3 {
                if !block.trim().is_empty() {
                    debug!("Skipping incomplete subtitle block: {:?}", block.trim());
                }
                continue;
            }
            if !TIMING_REGEX.is_match(lines[1].trim()) {
                warn!("Unexpected timing line in block {}: {}", lines[0], lines[1]);
            }
            entries.push(SubtitleEntry::new(
                lines[0].trim(),
                lines[1].trim(),
                lines[2..].join("\n"),
            ));
        }

        Self { entries }
    }

    /// Read and parse an SRT file
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = FileManager::read_to_string(&path)?;
        let track = Self::parse(&content);
        debug!("Parsed {} subtitles from {:?}", track.len(), path.as_ref());
        Ok(track)
    }

    /// Build a track from per-chunk transcripts. Chunk `i` is shifted by
    /// `i * chunk_duration_secs`; empty segments are dropped and blocks are
    /// numbered from 1.
    pub fn from_segments(chunks: &[Transcript], chunk_duration_secs: f64) -> Self {
        let mut entries = Vec::new();

        for (chunk_idx, transcript) in chunks.iter().enumerate() {
            let offset = chunk_idx as f64 * chunk_duration_secs;
            for segment in &transcript.segments {
                let text = segment.text.trim();
                if text.is_empty() {
                    continue;
                }
                let timing = format!(
                    "{} --> {}",
                    SubtitleEntry::format_timestamp(segment.start + offset),
                    SubtitleEntry::format_timestamp(segment.end + offset)
                );
                entries.push(SubtitleEntry::new((entries.len() + 1).to_string(), timing, text));
            }
        }

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consecutive slices of at most `size` entries
    pub fn batches(&self, size: usize) -> impl Iterator<Item = &[SubtitleEntry]> {
        self.entries.chunks(size.max(1))
    }

    pub fn to_srt_string(&self) -> String {
        self.entries.iter().map(ToString::to_string).collect()
    }

    /// Write the track as SRT, replacing the file atomically
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        FileManager::write_to_file(&path, &self.to_srt_string())
            .with_context(|| format!("Failed to write subtitles to {:?}", path.as_ref()))
    }

    /// All text joined by spaces, line breaks flattened
    pub fn plain_text(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.text.replace('\n', " "))
            .filter(|t| !t.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
