use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

use crate::command_runner::run_command;
use crate::file_utils::FileManager;

// @module: Splitting long audio into uploadable chunks

// @const: Upper bound for one ffprobe/ffmpeg call
const TOOL_TIMEOUT: Duration = Duration::from_secs(600);

/// Temporary directory holding audio chunks, removed when dropped.
///
/// Dropping the guard is the only cleanup path, so errors, early returns and
/// cancelled futures all leave the filesystem clean.
#[derive(Debug)]
pub struct TempChunkGuard {
    dir: TempDir,
    chunks: Vec<PathBuf>,
}

impl TempChunkGuard {
    /// Create an empty chunk directory under `parent`
    pub fn new<P: AsRef<Path>>(parent: P) -> Result<Self> {
        FileManager::ensure_dir(&parent)?;
        let dir = tempfile::Builder::new()
            .prefix("chunks_")
            .tempdir_in(parent.as_ref())
            .with_context(|| format!("Failed to create chunk directory in {:?}", parent.as_ref()))?;
        Ok(Self {
            dir,
            chunks: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Chunk files in playback order
    pub fn chunks(&self) -> &[PathBuf] {
        &self.chunks
    }

    /// Rescan the directory for `chunk_NNNN.*` files
    pub fn collect_chunks(&mut self) -> Result<usize> {
        let mut chunks: Vec<PathBuf> = std::fs::read_dir(self.dir.path())
            .with_context(|| format!("Failed to list {:?}", self.dir.path()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("chunk_"))
            })
            .collect();
        chunks.sort();
        self.chunks = chunks;
        Ok(self.chunks.len())
    }
}

/// Whether a file of `size` bytes must be split before upload
pub fn needs_chunking(size: u64, max_upload_bytes: u64) -> bool {
    size > max_upload_bytes
}

/// Name of chunk `index` for an audio extension
pub fn chunk_file_name(index: usize, extension: &str) -> String {
    format!("chunk_{:04}.{}", index, extension)
}

/// Duration of a media file in seconds, from ffprobe's format section
pub async fn probe_duration<P: AsRef<Path>>(path: P) -> Result<f64> {
    let path = path.as_ref();
    let args = vec![
        "-v".to_string(),
        "quiet".to_string(),
        "-print_format".to_string(),
        "json".to_string(),
        "-show_format".to_string(),
        path.to_string_lossy().to_string(),
    ];
    let output = run_command("ffprobe", &args, TOOL_TIMEOUT).await?;
    parse_probe_duration(&String::from_utf8_lossy(&output.stdout))
        .with_context(|| format!("No duration reported for {:?}", path))
}

/// Extract `format.duration` from ffprobe JSON
pub fn parse_probe_duration(json: &str) -> Result<f64> {
    let value: Value = serde_json::from_str(json).context("Failed to parse ffprobe JSON output")?;
    value
        .get("format")
        .and_then(|f| f.get("duration"))
        .and_then(|d| match d {
            Value::String(s) => s.parse::<f64>().ok(),
            Value::Number(n) => n.as_f64(),
            _ => None,
        })
        .ok_or_else(|| anyhow!("ffprobe output has no format.duration"))
}

/// Split `audio` into consecutive chunks of `chunk_duration_secs`
pub async fn split_audio<P: AsRef<Path>, Q: AsRef<Path>>(
    audio: P,
    work_dir: Q,
    chunk_duration_secs: u64,
) -> Result<TempChunkGuard> {
    let audio = audio.as_ref();
    let duration = probe_duration(audio).await?;
    let expected = (duration / chunk_duration_secs.max(1) as f64).ceil() as usize;
    info!(
        "Splitting {:.0}s of audio into {} chunk(s) of {}s",
        duration, expected, chunk_duration_secs
    );

    let mut guard = TempChunkGuard::new(work_dir)?;
    let extension = audio
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp3")
        .to_string();
    let pattern = guard.path().join(format!("chunk_%04d.{}", extension));

    let args = vec![
        "-y".to_string(),
        "-i".to_string(),
        audio.to_string_lossy().to_string(),
        "-f".to_string(),
        "segment".to_string(),
        "-segment_time".to_string(),
        chunk_duration_secs.to_string(),
        "-c".to_string(),
        "copy".to_string(),
        pattern.to_string_lossy().to_string(),
    ];
    run_command("ffmpeg", &args, TOOL_TIMEOUT).await?;

    let found = guard.collect_chunks()?;
    if found == 0 {
        return Err(anyhow!("ffmpeg produced no chunks for {:?}", audio));
    }
    if found != expected {
        warn!("Expected {} chunk(s) but found {}", expected, found);
    }
    debug!("Chunks written to {:?}", guard.path());
    Ok(guard)
}
