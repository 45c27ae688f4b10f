/*!
 * Media acquisition backed by `yt-dlp` and `ffmpeg`.
 *
 * `YtDlpSource` lists a playlist (or single video) with `yt-dlp -J`,
 * downloads one item at a time as `<id>.<ext>`, renames the results to
 * `<index>. <title>.<ext>` and optionally extracts a compact audio track
 * for transcription.
 */

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::command_runner::run_command;
use crate::file_utils::{FileManager, indexed_stem};
use crate::language_utils::{AvailableSubtitle, AvailableSubtitleSet, SubtitleOrigin};
use crate::pipeline::{AcquiredMedia, MediaItem, MediaSource};

// @const: Listing a long playlist can be slow
const LIST_TIMEOUT: Duration = Duration::from_secs(600);

// @const: One download or conversion
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(3600);

// @const: Video page used for single-item downloads
const WATCH_BASE: &str = "https://www.youtube.com/watch";

// @const: Extensions treated as subtitles among downloaded files
const SUBTITLE_EXTENSIONS: [&str; 2] = ["srt", "vtt"];

/// Download behaviour for `YtDlpSource`
#[derive(Debug, Clone)]
pub struct MediaOptions {
    /// Keep only an mp3 audio track
    pub audio_only: bool,
    /// Keep the downloaded file after audio extraction
    pub keep_original: bool,
    /// Re-encode extracted audio as 64 kbps mono for smaller uploads
    pub compress_audio: bool,
    /// Name of the `yt-dlp` executable
    pub yt_dlp: String,
}

impl Default for MediaOptions {
    fn default() -> Self {
        Self {
            audio_only: true,
            keep_original: false,
            compress_audio: true,
            yt_dlp: "yt-dlp".to_string(),
        }
    }
}

/// Media source using the `yt-dlp` command line tool
#[derive(Debug, Clone, Default)]
pub struct YtDlpSource {
    options: MediaOptions,
}

impl YtDlpSource {
    pub fn new(options: MediaOptions) -> Self {
        Self { options }
    }

    /// Parse the JSON printed by `yt-dlp -J`, for a playlist or one video
    pub fn parse_listing(json: &str) -> Result<Vec<MediaItem>> {
        let value: Value = serde_json::from_str(json).context("Failed to parse yt-dlp JSON output")?;

        let entries: Vec<&Value> = match value.get("entries").and_then(Value::as_array) {
            Some(entries) => entries.iter().filter(|e| !e.is_null()).collect(),
            None => vec![&value],
        };

        let mut items = Vec::with_capacity(entries.len());
        for (position, entry) in entries.into_iter().enumerate() {
            let Some(id) = entry.get("id").and_then(Value::as_str) else {
                warn!("Skipping listing entry {} without an id", position + 1);
                continue;
            };
            let title = entry
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let manual = object_keys(entry.get("subtitles"));
            let automatic = object_keys(entry.get("automatic_captions"));

            let mut item = MediaItem::new(position + 1, id, title)
                .with_subtitles(AvailableSubtitleSet::from_source_listing(&manual, &automatic));
            item.duration = entry.get("duration").and_then(Value::as_f64);
            items.push(item);
        }

        Ok(items)
    }

    fn download_args(&self, item: &MediaItem, subtitle: Option<&AvailableSubtitle>, destination: &Path) -> Vec<String> {
        let template = destination.join("%(id)s.%(ext)s");
        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "-o".to_string(),
            template.to_string_lossy().to_string(),
        ];
        if self.options.audio_only {
            args.push("-f".to_string());
            args.push("bestaudio/best".to_string());
        }
        if let Some(subtitle) = subtitle {
            args.push(match subtitle.origin {
                SubtitleOrigin::Human => "--write-subs".to_string(),
                SubtitleOrigin::Auto => "--write-auto-subs".to_string(),
            });
            args.push("--sub-langs".to_string());
            args.push(subtitle.locator.clone());
            args.push("--convert-subs".to_string());
            args.push("srt".to_string());
        }
        args.push(watch_url(&item.id));
        args
    }

    /// Extract an mp3 track from `media`, optionally 64 kbps mono
    pub async fn extract_audio(&self, media: &Path) -> Result<PathBuf> {
        let output = media.with_extension("mp3");
        let in_place = output == media;
        if in_place && !self.options.compress_audio {
            return Ok(output);
        }
        let target = if in_place {
            media.with_extension("tmp.mp3")
        } else {
            output.clone()
        };

        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            media.to_string_lossy().to_string(),
            "-vn".to_string(),
            "-acodec".to_string(),
            "libmp3lame".to_string(),
        ];
        if self.options.compress_audio {
            args.extend(["-ac", "1", "-b:a", "64k"].map(String::from));
        }
        args.push(target.to_string_lossy().to_string());
        run_command("ffmpeg", &args, DOWNLOAD_TIMEOUT).await?;

        if in_place {
            std::fs::rename(&target, &output)
                .with_context(|| format!("Failed to rename {:?} to {:?}", target, output))?;
        } else if !self.options.keep_original {
            std::fs::remove_file(media).with_context(|| format!("Failed to remove {:?}", media))?;
        }
        debug!("Extracted audio to {:?}", output);
        Ok(output)
    }
}

/// Watch page of a video id
fn watch_url(id: &str) -> String {
    match Url::parse_with_params(WATCH_BASE, &[("v", id)]) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{}?v={}", WATCH_BASE, id),
    }
}

/// Reject references that are neither URLs nor bare ids before spawning `yt-dlp`
fn check_reference(reference: &str) -> Result<()> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Empty source reference"));
    }
    if trimmed.contains("://") {
        Url::parse(trimmed).with_context(|| format!("Invalid source URL: {}", trimmed))?;
    }
    Ok(())
}

/// Keys of a JSON object, e.g. the language tags of a subtitle listing
fn object_keys(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_object)
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default()
}

fn is_subtitle_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SUBTITLE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
}

#[async_trait]
impl MediaSource for YtDlpSource {
    async fn enumerate(&self, source_reference: &str) -> Result<Vec<MediaItem>> {
        check_reference(source_reference)?;
        info!("Listing {}", source_reference);
        let args = vec!["-J".to_string(), "--no-warnings".to_string(), source_reference.to_string()];
        let output = run_command(&self.options.yt_dlp, &args, LIST_TIMEOUT).await?;
        let items = Self::parse_listing(&String::from_utf8_lossy(&output.stdout))?;
        if items.is_empty() {
            return Err(anyhow!("No items found at {}", source_reference));
        }
        Ok(items)
    }

    async fn acquire(
        &self,
        item: &MediaItem,
        subtitle: Option<&AvailableSubtitle>,
        destination: &Path,
    ) -> Result<AcquiredMedia> {
        FileManager::ensure_dir(destination)?;
        let args = self.download_args(item, subtitle, destination);
        run_command(&self.options.yt_dlp, &args, DOWNLOAD_TIMEOUT).await?;

        let stem = indexed_stem(item.index, &item.title);
        let renamed = FileManager::rename_by_prefix(destination, &item.id, &stem, false)?;
        if renamed.is_empty() {
            return Err(anyhow!("Download of {} produced no files", item.id));
        }

        let mut acquired = AcquiredMedia::default();
        for (_, path) in renamed {
            if is_subtitle_file(&path) {
                acquired.subtitle_paths.push(path);
            } else if acquired.media_path.is_none() {
                acquired.media_path = Some(path);
            }
        }

        if self.options.audio_only {
            if let Some(media) = acquired.media_path.take() {
                acquired.media_path = Some(self.extract_audio(&media).await?);
            }
        }

        Ok(acquired)
    }
}
