/*!
 * Speech-to-text synthesis of subtitle tracks.
 *
 * Small files go to the speech-to-text service in one request. Larger files
 * are split into fixed-length chunks inside a `TempChunkGuard`; each chunk is
 * transcribed (or read back from the cache) and the segments are shifted by
 * the chunk offset into one track.
 */

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::TranscriptionConfig;
use crate::pipeline::SubtitleSynthesizer;
use crate::providers::SpeechToText;
use crate::subtitle_processor::{SubtitleTrack, Transcript};

use super::cache::TranscriptCache;
use super::chunking::{needs_chunking, split_audio};

/// Chunked, cached transcription into subtitle tracks
#[derive(Debug)]
pub struct Transcriber {
    stt: Arc<dyn SpeechToText>,
    cache: Option<TranscriptCache>,
    chunk_duration_secs: u64,
    max_upload_bytes: u64,
    work_dir: PathBuf,
}

impl Transcriber {
    pub fn new(stt: Arc<dyn SpeechToText>, config: &TranscriptionConfig, work_dir: PathBuf) -> Self {
        Self {
            stt,
            cache: Some(TranscriptCache::new(config.resolved_cache_dir())),
            chunk_duration_secs: config.chunk_duration_minutes.max(1) * 60,
            max_upload_bytes: config.max_upload_bytes,
            work_dir,
        }
    }

    /// Replace the cache, or disable it with `None`
    pub fn with_cache(mut self, cache: Option<TranscriptCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> Option<&TranscriptCache> {
        self.cache.as_ref()
    }

    async fn transcribe_chunk(
        &self,
        key: Option<&str>,
        index: usize,
        chunk: &Path,
        language: Option<&str>,
    ) -> Result<Transcript> {
        if let (Some(cache), Some(key)) = (&self.cache, key) {
            if let Some(cached) = cache.get(key, index) {
                return Ok(cached);
            }
        }

        let transcript = self
            .stt
            .transcribe(chunk, language)
            .await
            .with_context(|| format!("Transcription failed for chunk {}", index))?;

        if let (Some(cache), Some(key)) = (&self.cache, key) {
            if let Err(e) = cache.put(key, index, &transcript) {
                warn!("Failed to cache transcript for chunk {}: {}", index, e);
            }
        }
        Ok(transcript)
    }

    /// Transcribe an audio file into a subtitle track
    pub async fn transcribe_file(&self, audio: &Path, language: Option<&str>) -> Result<SubtitleTrack> {
        let size = std::fs::metadata(audio)
            .with_context(|| format!("Audio file not found: {:?}", audio))?
            .len();
        let key = match &self.cache {
            Some(_) => Some(TranscriptCache::file_key(audio)?),
            None => None,
        };

        let mut transcripts = Vec::new();
        if needs_chunking(size, self.max_upload_bytes) {
            // Held until every chunk is transcribed; dropping it removes the files
            let guard = split_audio(audio, &self.work_dir, self.chunk_duration_secs).await?;
            let total = guard.chunks().len();
            for (index, chunk) in guard.chunks().iter().enumerate() {
                debug!("Transcribing chunk {}/{}", index + 1, total);
                transcripts.push(self.transcribe_chunk(key.as_deref(), index, chunk, language).await?);
            }
        } else {
            transcripts.push(self.transcribe_chunk(key.as_deref(), 0, audio, language).await?);
        }

        let track = SubtitleTrack::from_segments(&transcripts, self.chunk_duration_secs as f64);
        if track.is_empty() {
            return Err(anyhow!("Transcription of {:?} produced no segments", audio));
        }
        info!("Transcribed {:?} into {} subtitles", audio.file_name().unwrap_or_default(), track.len());
        Ok(track)
    }
}

#[async_trait]
impl SubtitleSynthesizer for Transcriber {
    async fn synthesize(&self, media: &Path, output: &Path, language: Option<&str>) -> Result<PathBuf> {
        let track = self.transcribe_file(media, language).await?;
        track.write_to_file(output)?;
        Ok(output.to_path_buf())
    }
}
