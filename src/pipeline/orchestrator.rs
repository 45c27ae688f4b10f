/*!
 * Resumable per-item pipeline driver.
 *
 * Each item moves through acquire, then subtitle selection or synthesis, then
 * a checkpoint write. Completed items are skipped on later runs; failed items
 * are retried. One item's failure is recorded and the run moves on. Only a
 * failure to list the source aborts the run.
 */

use anyhow::{Result, anyhow};
use log::{debug, error, info, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::Config;
use crate::checkpoint::{CheckpointStore, ItemSeed, SubtitleProvenance};
use crate::errors::{PipelineError, truncate_message};
use crate::file_utils::indexed_stem;
use crate::language_utils::{HostLocale, LanguageTag};
use crate::progress::progress_bar;

use super::collaborators::{MediaItem, MediaSource, SubtitleSynthesizer};

/// Characters of an item error shown in log lines
pub const LOG_ERROR_CHARS: usize = 100;

/// Settings for one run
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Root output directory; downloads go to `<output_dir>/downloads`
    pub output_dir: PathBuf,
    /// Subtitle language preferences, most wanted first
    pub preferences: Vec<LanguageTag>,
    /// Sleep between processed items
    pub inter_item_delay: Duration,
    /// Persist progress in a checkpoint file
    pub enable_checkpoint: bool,
    /// Delete an existing checkpoint before starting
    pub clear_checkpoint: bool,
    /// Use source subtitles when one matches the preferences
    pub prefer_existing_subtitles: bool,
    /// Record items without subtitles as awaiting synthesis instead of transcribing
    pub skip_transcription: bool,
    /// Spoken-language hint for synthesis
    pub transcription_language: Option<String>,
    /// Show a progress bar over items
    pub show_progress: bool,
}

impl OrchestratorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            preferences: config.languages.preferences(),
            inter_item_delay: Duration::from_secs(config.pipeline.inter_item_delay_secs),
            enable_checkpoint: config.pipeline.enable_checkpoint,
            clear_checkpoint: false,
            prefer_existing_subtitles: config.pipeline.prefer_existing_subtitles,
            skip_transcription: config.pipeline.skip_transcription,
            transcription_language: config.languages.transcription_language.clone(),
            show_progress: false,
        }
    }

    /// Default options with host-derived preferences
    pub fn for_output(output_dir: impl Into<PathBuf>, host: &dyn HostLocale) -> Self {
        let mut config = Config::default();
        config.output_dir = output_dir.into();
        let mut options = Self::from_config(&config);
        options.preferences = crate::language_utils::default_preferences(host);
        options
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.output_dir.join("downloads")
    }
}

/// Outcome of one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Already completed by an earlier run
    Skipped,
    Completed(Option<SubtitleProvenance>),
    Failed(String),
}

/// Summary of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub total: usize,
    pub skipped: usize,
    pub completed: usize,
    pub failed: usize,
    /// (item id, truncated error) per failed item, in processing order
    pub failures: Vec<(String, String)>,
}

impl RunReport {
    /// True when no item failed in this run
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    fn record(&mut self, item_id: &str, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Completed(_) => self.completed += 1,
            ItemOutcome::Failed(message) => {
                self.failed += 1;
                self.failures.push((item_id.to_string(), message.clone()));
            }
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} item(s): {} completed, {} skipped, {} failed",
            self.total, self.completed, self.skipped, self.failed
        )
    }
}

/// Drives every item of a source through the pipeline
#[derive(Debug)]
pub struct PipelineOrchestrator {
    source: Arc<dyn MediaSource>,
    synthesizer: Arc<dyn SubtitleSynthesizer>,
    options: OrchestratorOptions,
}

impl PipelineOrchestrator {
    pub fn new(
        source: Arc<dyn MediaSource>,
        synthesizer: Arc<dyn SubtitleSynthesizer>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            source,
            synthesizer,
            options,
        }
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Process every item of `source_reference`, resuming from the checkpoint
    pub async fn run(&self, source_reference: &str) -> Result<RunReport> {
        let items = self
            .source
            .enumerate(source_reference)
            .await
            .map_err(|e| PipelineError::Enumeration {
                reference: source_reference.to_string(),
                message: e.to_string(),
            })?;
        if items.is_empty() {
            return Err(PipelineError::Enumeration {
                reference: source_reference.to_string(),
                message: "source listed no items".to_string(),
            }
            .into());
        }
        info!("Found {} item(s) in {}", items.len(), source_reference);

        let mut store = self.open_store(source_reference, &items);
        let mut report = RunReport {
            total: items.len(),
            ..RunReport::default()
        };

        let bar = progress_bar(items.len() as u64, "items", self.options.show_progress);
        let last = items.len() - 1;
        for (position, item) in items.iter().enumerate() {
            let outcome = self.process_item(item, store.as_mut()).await;
            report.record(&item.id, &outcome);
            bar.inc(1);

            let processed = outcome != ItemOutcome::Skipped;
            if processed && position < last && !self.options.inter_item_delay.is_zero() {
                debug!("Waiting {:?} before the next item", self.options.inter_item_delay);
                tokio::time::sleep(self.options.inter_item_delay).await;
            }
        }
        bar.finish_and_clear();

        if let Some(store) = &store {
            info!("Checkpoint: {}", store.summary());
        }
        if report.is_success() {
            info!("Run finished: {}", report);
        } else {
            warn!("Run finished: {}", report);
        }
        Ok(report)
    }

    fn open_store(&self, source_reference: &str, items: &[MediaItem]) -> Option<CheckpointStore> {
        if !self.options.enable_checkpoint {
            return None;
        }
        let mut store = CheckpointStore::for_source(&self.options.output_dir, source_reference);
        if self.options.clear_checkpoint {
            store.clear();
        }
        let seeds: Vec<ItemSeed> = items.iter().map(MediaItem::seed).collect();
        store.initialize_for_source(source_reference, &seeds);
        Some(store)
    }

    /// Run one item and record its outcome before returning
    pub async fn process_item(&self, item: &MediaItem, store: Option<&mut CheckpointStore>) -> ItemOutcome {
        if store.as_ref().is_some_and(|s| s.is_completed(&item.id)) {
            debug!("Skipping completed item {}: {}", item.index, item.title);
            return ItemOutcome::Skipped;
        }

        info!("[{}] {}", item.index, item.title);
        match self.attempt_item(item).await {
            Ok((provenance, artifacts)) => {
                if let Some(store) = store {
                    let artifacts = artifacts.iter().map(|p| p.to_string_lossy().to_string()).collect();
                    store.mark_completed(&item.id, provenance, artifacts);
                }
                ItemOutcome::Completed(provenance)
            }
            Err(e) => {
                let message = e.to_string();
                error!("[{}] failed: {}", item.index, truncate_message(&message, LOG_ERROR_CHARS));
                if let Some(store) = store {
                    store.mark_failed(&item.id, &message);
                }
                ItemOutcome::Failed(truncate_message(&message, LOG_ERROR_CHARS))
            }
        }
    }

    async fn attempt_item(&self, item: &MediaItem) -> Result<(Option<SubtitleProvenance>, Vec<PathBuf>)> {
        let selected = if self.options.prefer_existing_subtitles {
            item.subtitles.select_preferred(&self.options.preferences)
        } else {
            None
        };
        if let Some(subtitle) = selected {
            debug!("Using source subtitles {} ({:?})", subtitle.reported, subtitle.origin);
        }

        let destination = self.options.downloads_dir();
        let acquired = self
            .source
            .acquire(item, selected, &destination)
            .await
            .map_err(|e| PipelineError::Acquisition(e.to_string()))?;

        if selected.is_some() && !acquired.subtitle_paths.is_empty() {
            return Ok((Some(SubtitleProvenance::SourceProvided), acquired.subtitle_paths));
        }
        if selected.is_some() {
            warn!("Source subtitles were selected but none were downloaded; synthesizing instead");
        }

        if self.options.skip_transcription {
            return Ok((Some(SubtitleProvenance::PendingSynthesis), Vec::new()));
        }

        let media = acquired
            .media_path
            .ok_or_else(|| PipelineError::Synthesis("no media file to transcribe".to_string()))?;
        let output = synthesized_subtitle_path(&destination, item);
        let written = self
            .synthesizer
            .synthesize(&media, &output, self.options.transcription_language.as_deref())
            .await
            .map_err(|e| PipelineError::Synthesis(e.to_string()))?;

        Ok((Some(SubtitleProvenance::Synthesized), vec![written]))
    }
}

/// `<dir>/<index>. <title>.whisper.srt`
pub fn synthesized_subtitle_path(dir: &Path, item: &MediaItem) -> PathBuf {
    dir.join(format!("{}.whisper.srt", indexed_stem(item.index, &item.title)))
}

/// Fail with the first recorded error when any item failed
pub fn ensure_success(report: &RunReport) -> Result<()> {
    match report.failures.first() {
        None => Ok(()),
        Some((id, message)) => Err(anyhow!(
            "{} item(s) failed; first failure {}: {}",
            report.failed,
            id,
            message
        )),
    }
}
