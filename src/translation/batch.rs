/*!
 * Batch translation with strict identifier validation.
 *
 * A track is split into bounded batches. Each batch is sent as one structured
 * request; the response must carry exactly the identifiers that were sent.
 * A mismatch or an unparsable response retries the same request. Once the
 * attempts are exhausted every line still missing keeps its original text,
 * so no line is ever dropped. Index and timing always come from the source
 * entry, never from the response.
 */

use anyhow::Result;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{TranslationConfig, WireFormat};
use crate::errors::TranslationError;
use crate::progress::progress_bar;
use crate::providers::{GenerationRequest, TextGenerator};
use crate::subtitle_processor::{SubtitleEntry, SubtitleTrack};

use super::formats::{decode_response, encode_batch};
use super::quality::QualityReport;

/// Options controlling batching and retries
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Maximum subtitle lines per request
    pub batch_size: usize,
    /// Total attempts per batch, including the first
    pub max_attempts: u32,
    /// Base delay before a retry, doubled on each further retry; 0 disables
    pub retry_backoff_ms: u64,
    /// Structured exchange shape
    pub wire_format: WireFormat,
    /// Sampling temperature
    pub temperature: f32,
    /// System prompt template with a `{target_language}` placeholder
    pub system_prompt: String,
    /// Model override
    pub model: Option<String>,
    /// Show a progress bar over batches
    pub show_progress: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::from_config(&TranslationConfig::default())
    }
}

impl BatchOptions {
    /// Options from the translation section of the config
    pub fn from_config(config: &TranslationConfig) -> Self {
        Self {
            batch_size: config.common.batch_size.max(1),
            max_attempts: config.common.max_attempts.max(1),
            retry_backoff_ms: config.common.retry_backoff_ms,
            wire_format: config.common.wire_format,
            temperature: config.common.temperature,
            system_prompt: config.common.system_prompt.clone(),
            model: None,
            show_progress: false,
        }
    }

    pub fn wire_format(mut self, wire_format: WireFormat) -> Self {
        self.wire_format = wire_format;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn retry_backoff_ms(mut self, retry_backoff_ms: u64) -> Self {
        self.retry_backoff_ms = retry_backoff_ms;
        self
    }

    pub fn show_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Delay before the given retry (1 = first retry)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        if self.retry_backoff_ms == 0 || retry == 0 {
            return Duration::ZERO;
        }
        let factor = 1u64 << (retry - 1).min(16);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}

/// Result of translating a single batch
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Entries in source order with source index and timing
    pub entries: Vec<SubtitleEntry>,
    /// Identifiers sent in this batch
    pub entry_ids: Vec<String>,
    /// Attempts made, including the first
    pub attempts: u32,
    /// Whether any line kept its original text
    pub used_fallback: bool,
    /// Lines that kept their original text
    pub fallback_ids: Vec<String>,
}

impl BatchResult {
    /// Number of retries after the first attempt
    pub fn retries_used(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    /// Check if every line got a translation
    pub fn is_complete(&self) -> bool {
        self.fallback_ids.is_empty()
    }

    /// Lines that kept their original text
    pub fn missing_ids(&self) -> &[String] {
        &self.fallback_ids
    }
}

/// Counters accumulated over a track
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationStats {
    /// Total number of batches processed
    pub total_batches: usize,
    /// Batches where every line was translated
    pub completed_batches: usize,
    /// Total lines translated
    pub total_entries_translated: usize,
    /// Total retries across all batches
    pub total_retries: usize,
    /// Lines that kept their original text
    pub fallback_lines: usize,
}

impl TranslationStats {
    /// Fold one batch into the counters
    pub fn record(&mut self, result: &BatchResult) {
        self.total_batches += 1;
        if result.is_complete() {
            self.completed_batches += 1;
        }
        self.total_entries_translated += result.entry_ids.len() - result.fallback_ids.len();
        self.total_retries += result.retries_used() as usize;
        self.fallback_lines += result.fallback_ids.len();
    }

    /// Calculate success rate
    pub fn success_rate(&self) -> f32 {
        if self.total_batches == 0 {
            return 100.0;
        }
        (self.completed_batches as f32 / self.total_batches as f32) * 100.0
    }
}

impl fmt::Display for TranslationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} batches complete, {} lines translated, {} retries, {} lines kept original",
            self.completed_batches,
            self.total_batches,
            self.total_entries_translated,
            self.total_retries,
            self.fallback_lines
        )
    }
}

/// A translated track with its counters and quality scan
#[derive(Debug, Clone)]
pub struct TrackTranslation {
    pub track: SubtitleTrack,
    pub stats: TranslationStats,
    pub quality: QualityReport,
}

/// Drives batches of a track through a text generator
#[derive(Debug, Clone)]
pub struct BatchTranslator {
    generator: Arc<dyn TextGenerator>,
    options: BatchOptions,
}

impl BatchTranslator {
    pub fn new(generator: Arc<dyn TextGenerator>, options: BatchOptions) -> Self {
        Self { generator, options }
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Build the request for one batch; the payload is always the last part
    pub fn build_request(
        &self,
        batch: &[SubtitleEntry],
        target_language: &str,
    ) -> Result<GenerationRequest, TranslationError> {
        let payload = encode_batch(batch, self.options.wire_format)?;
        let system = self
            .options
            .system_prompt
            .replace("{target_language}", target_language);

        let shape = match self.options.wire_format {
            WireFormat::Json => {
                "Return a JSON array with one object per subtitle, each with the same \"id\" and the translated \"text\"."
            }
            WireFormat::Tabular => {
                "Return CSV with the header id,time,text and one row per subtitle, keeping id and time unchanged."
            }
        };
        let user = format!(
            "Translate the following {} subtitles into {}.\n{}\nDo not merge, split, add or drop subtitles.\n{}",
            batch.len(),
            target_language,
            shape,
            payload
        );

        let mut request = GenerationRequest::new(system, user).temperature(self.options.temperature);
        if let Some(model) = &self.options.model {
            request = request.model(model.clone());
        }
        Ok(request)
    }

    /// Translate one batch, retrying on invalid responses
    pub async fn translate_batch(
        &self,
        batch: &[SubtitleEntry],
        target_language: &str,
    ) -> Result<BatchResult, TranslationError> {
        let entry_ids: Vec<String> = batch.iter().map(|e| e.index.clone()).collect();
        let sent: HashMap<&str, &str> = batch.iter().map(|e| (e.index.as_str(), e.text.as_str())).collect();
        let request = self.build_request(batch, target_language)?;

        // Translations gathered for this batch only; later attempts override
        let mut best: HashMap<String, String> = HashMap::new();
        let mut attempts = 0;

        while attempts < self.options.max_attempts {
            if attempts > 0 {
                let delay = self.options.backoff_for(attempts);
                if !delay.is_zero() {
                    debug!("Retrying batch after {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
            }
            attempts += 1;

            match self.attempt(&request, &sent).await {
                Ok(translations) => {
                    best.extend(translations);
                    debug!("Batch of {} lines validated on attempt {}", batch.len(), attempts);
                    break;
                }
                Err((partial, error)) => {
                    best.extend(partial);
                    warn!(
                        "Batch attempt {}/{} rejected: {}",
                        attempts, self.options.max_attempts, error
                    );
                }
            }
        }

        let mut fallback_ids = Vec::new();
        let entries = batch
            .iter()
            .map(|entry| match best.get(&entry.index) {
                Some(text) => entry.with_text(text.clone()),
                None => {
                    fallback_ids.push(entry.index.clone());
                    entry.clone()
                }
            })
            .collect();

        if !fallback_ids.is_empty() {
            warn!(
                "Keeping original text for {} line(s) after {} attempt(s): {:?}",
                fallback_ids.len(),
                attempts,
                fallback_ids
            );
        }

        Ok(BatchResult {
            entries,
            entry_ids,
            attempts,
            used_fallback: !fallback_ids.is_empty(),
            fallback_ids,
        })
    }

    /// One request; on rejection returns whatever valid lines came back
    async fn attempt(
        &self,
        request: &GenerationRequest,
        sent: &HashMap<&str, &str>,
    ) -> Result<HashMap<String, String>, (HashMap<String, String>, TranslationError)> {
        let response = self
            .generator
            .generate(request.clone())
            .await
            .map_err(|e| (HashMap::new(), TranslationError::from(e)))?;

        let items = decode_response(&response, self.options.wire_format)
            .map_err(|e| (HashMap::new(), e))?;

        let mut accepted = HashMap::new();
        let mut unexpected = Vec::new();
        for item in items {
            match sent.get(item.id.as_str()) {
                // A blank answer for a non-blank line counts as missing
                Some(source) if item.text.trim().is_empty() && !source.trim().is_empty() => {}
                Some(_) => {
                    accepted.insert(item.id, item.text);
                }
                None => unexpected.push(item.id),
            }
        }

        let mut missing: Vec<String> = sent
            .keys()
            .filter(|id| !accepted.contains_key(**id))
            .map(|id| id.to_string())
            .collect();
        missing.sort_by_key(|id| id.parse::<u64>().unwrap_or(u64::MAX));

        if missing.is_empty() && unexpected.is_empty() {
            Ok(accepted)
        } else {
            Err((accepted, TranslationError::IdentifierMismatch { missing, unexpected }))
        }
    }

    /// Translate a whole track batch by batch, in order
    pub async fn translate_track(
        &self,
        track: &SubtitleTrack,
        target_language: &str,
    ) -> Result<TrackTranslation> {
        let batch_count = track.len().div_ceil(self.options.batch_size);
        info!(
            "Translating {} lines into {} in {} batch(es) via {}",
            track.len(),
            target_language,
            batch_count,
            self.generator.name()
        );

        let bar = progress_bar(batch_count as u64, "batches", self.options.show_progress);
        let mut stats = TranslationStats::default();
        let mut entries = Vec::with_capacity(track.len());

        for batch in track.batches(self.options.batch_size) {
            let result = self.translate_batch(batch, target_language).await?;
            stats.record(&result);
            entries.extend(result.entries);
            bar.inc(1);
        }
        bar.finish_and_clear();

        let translated = SubtitleTrack::new(entries);
        let quality = QualityReport::scan(&translated);
        info!("Translation finished: {}", stats);
        quality.log_summary();

        Ok(TrackTranslation {
            track: translated,
            stats,
            quality,
        })
    }
}
