/*!
 * Integration tests for resumable pipeline runs.
 *
 * The orchestrator is driven with a scripted media source and a recording
 * synthesizer, so every run is local and deterministic.
 */

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use playscribe::checkpoint::{CheckpointStore, ItemStatus, SubtitleProvenance, checkpoint_path};
use playscribe::errors::PipelineError;
use playscribe::language_utils::{FixedLocale, parse_language_list};
use playscribe::pipeline::{ItemOutcome, MediaItem, OrchestratorOptions, PipelineOrchestrator, ensure_success};
use playscribe::providers::mock::MockSpeechToText;
use playscribe::transcription::Transcriber;
use playscribe::app_config::TranscriptionConfig;
use crate::common::{self, RecordingSynthesizer, ScriptedSource};

const SOURCE: &str = "https://www.youtube.com/playlist?list=PLtest";

fn playlist() -> Vec<MediaItem> {
    vec![
        common::media_item(1, "aaa", "Welcome", &["pt-BR"], &["en"]),
        common::media_item(2, "bbb", "Setup", &[], &["en"]),
        common::media_item(3, "ccc", "Deep dive", &[], &[]),
    ]
}

fn options(output: &Path) -> OrchestratorOptions {
    let mut options = OrchestratorOptions::for_output(output, &FixedLocale("en_US".to_string()));
    options.preferences = parse_language_list("pt,en");
    options.inter_item_delay = Duration::ZERO;
    options
}

fn orchestrator(source: &ScriptedSource, synthesizer: &RecordingSynthesizer, options: OrchestratorOptions) -> PipelineOrchestrator {
    PipelineOrchestrator::new(Arc::new(source.clone()), Arc::new(synthesizer.clone()), options)
}

/// Test that a first run completes every item with the right provenance
#[tokio::test]
async fn test_run_withFreshOutput_shouldCompleteAllItems() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let source = ScriptedSource::new(playlist());
    let synthesizer = RecordingSynthesizer::new();

    let report = orchestrator(&source, &synthesizer, options(dir.path())).run(SOURCE).await?;

    assert_eq!((report.total, report.completed, report.failed, report.skipped), (3, 3, 0, 0));
    assert!(ensure_success(&report).is_ok());
    assert_eq!(synthesizer.call_count(), 1);

    let store = CheckpointStore::for_source(dir.path(), SOURCE);
    assert_eq!(store.item("aaa").and_then(|i| i.provenance), Some(SubtitleProvenance::SourceProvided));
    assert_eq!(store.item("bbb").and_then(|i| i.provenance), Some(SubtitleProvenance::SourceProvided));
    assert_eq!(store.item("ccc").and_then(|i| i.provenance), Some(SubtitleProvenance::Synthesized));
    assert!(store.item("ccc").unwrap().artifacts[0].ends_with("3. Deep dive.whisper.srt"));
    assert!(dir.path().join("downloads").join("1. Welcome.pt-BR.srt").exists());
    Ok(())
}

/// Test that a second run over a finished job does no work
#[tokio::test]
async fn test_run_twice_shouldSkipCompletedItems() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let source = ScriptedSource::new(playlist());
    let synthesizer = RecordingSynthesizer::new();

    orchestrator(&source, &synthesizer, options(dir.path())).run(SOURCE).await?;
    let second = orchestrator(&source, &synthesizer, options(dir.path())).run(SOURCE).await?;

    assert_eq!(second.skipped, 3);
    assert_eq!(second.completed, 0);
    assert_eq!(source.total_acquisitions(), 3);
    assert_eq!(synthesizer.call_count(), 1);
    Ok(())
}

/// Test that one failed item is recorded and retried on the next run
#[tokio::test]
async fn test_run_withFailingItem_shouldContinueAndRetryOnResume() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let source = ScriptedSource::new(playlist());
    let synthesizer = RecordingSynthesizer::new();
    source.fail_item("bbb");

    let first = orchestrator(&source, &synthesizer, options(dir.path())).run(SOURCE).await?;

    assert_eq!((first.completed, first.failed), (2, 1));
    assert_eq!(first.failures[0].0, "bbb");
    assert!(ensure_success(&first).is_err());
    let store = CheckpointStore::for_source(dir.path(), SOURCE);
    assert_eq!(store.item("bbb").map(|i| i.status), Some(ItemStatus::Failed));
    assert!(store.item("bbb").and_then(|i| i.error.clone()).unwrap().contains("download of bbb failed"));

    source.heal("bbb");
    let second = orchestrator(&source, &synthesizer, options(dir.path())).run(SOURCE).await?;

    assert_eq!((second.skipped, second.completed, second.failed), (2, 1, 0));
    assert_eq!(source.acquisitions("aaa"), 1);
    assert_eq!(source.acquisitions("bbb"), 2);
    assert_eq!(source.acquisitions("ccc"), 1);
    let store = CheckpointStore::for_source(dir.path(), SOURCE);
    assert_eq!(store.summary().completed, 3);
    assert!(store.item("bbb").and_then(|i| i.error.clone()).is_none());
    Ok(())
}

/// Test that a listing failure aborts the run before any checkpoint exists
#[tokio::test]
async fn test_run_withEnumerationFailure_shouldAbort() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let source = ScriptedSource::unlistable();
    let synthesizer = RecordingSynthesizer::new();

    let err = orchestrator(&source, &synthesizer, options(dir.path()))
        .run(SOURCE)
        .await
        .unwrap_err();

    assert!(matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::Enumeration { .. })));
    assert!(!checkpoint_path(dir.path(), SOURCE).exists());
    assert_eq!(source.total_acquisitions(), 0);
    Ok(())
}

/// Test that an empty listing is treated as an enumeration failure
#[tokio::test]
async fn test_run_withEmptyListing_shouldAbort() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let source = ScriptedSource::new(Vec::new());

    let result = orchestrator(&source, &RecordingSynthesizer::new(), options(dir.path())).run(SOURCE).await;

    assert!(result.is_err());
    Ok(())
}

/// Test that a synthesis failure fails only that item
#[tokio::test]
async fn test_run_withFailingSynthesizer_shouldFailOnlyUntitledItems() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let source = ScriptedSource::new(playlist());
    let synthesizer = RecordingSynthesizer::failing();

    let report = orchestrator(&source, &synthesizer, options(dir.path())).run(SOURCE).await?;

    assert_eq!((report.completed, report.failed), (2, 1));
    let (id, message) = &report.failures[0];
    assert_eq!(id, "ccc");
    assert!(message.contains("speech-to-text unavailable"));
    Ok(())
}

/// Test that skipping transcription records pending synthesis
#[tokio::test]
async fn test_run_withSkipTranscription_shouldRecordPendingSynthesis() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let source = ScriptedSource::new(playlist());
    let synthesizer = RecordingSynthesizer::new();
    let mut options = options(dir.path());
    options.skip_transcription = true;

    orchestrator(&source, &synthesizer, options).run(SOURCE).await?;

    let store = CheckpointStore::for_source(dir.path(), SOURCE);
    assert_eq!(store.item("ccc").and_then(|i| i.provenance), Some(SubtitleProvenance::PendingSynthesis));
    assert_eq!(store.item("ccc").map(|i| i.status), Some(ItemStatus::Completed));
    assert_eq!(synthesizer.call_count(), 0);
    Ok(())
}

/// Test that preferences decide which source track is downloaded
#[tokio::test]
async fn test_run_withEnglishPreference_shouldFetchEnglishTrack() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let source = ScriptedSource::new(playlist());
    let mut options = options(dir.path());
    options.preferences = parse_language_list("en,pt");

    orchestrator(&source, &RecordingSynthesizer::new(), options).run(SOURCE).await?;

    assert!(dir.path().join("downloads").join("1. Welcome.en.srt").exists());
    assert!(!dir.path().join("downloads").join("1. Welcome.pt-BR.srt").exists());
    Ok(())
}

/// Test that disabling the checkpoint reprocesses everything
#[tokio::test]
async fn test_run_withoutCheckpoint_shouldReprocessAndWriteNothing() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let source = ScriptedSource::new(playlist());
    let synthesizer = RecordingSynthesizer::new();
    let mut options = options(dir.path());
    options.enable_checkpoint = false;

    orchestrator(&source, &synthesizer, options.clone()).run(SOURCE).await?;
    orchestrator(&source, &synthesizer, options).run(SOURCE).await?;

    assert_eq!(source.total_acquisitions(), 6);
    assert!(!checkpoint_path(dir.path(), SOURCE).exists());
    Ok(())
}

/// Test that clearing the checkpoint starts over
#[tokio::test]
async fn test_run_withClearCheckpoint_shouldStartOver() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let source = ScriptedSource::new(playlist());
    let synthesizer = RecordingSynthesizer::new();

    orchestrator(&source, &synthesizer, options(dir.path())).run(SOURCE).await?;
    let mut options = options(dir.path());
    options.clear_checkpoint = true;
    let report = orchestrator(&source, &synthesizer, options).run(SOURCE).await?;

    assert_eq!(report.completed, 3);
    assert_eq!(source.total_acquisitions(), 6);
    Ok(())
}

/// Test that the delay separates processed items but not skipped ones
#[tokio::test(start_paused = true)]
async fn test_run_withDelay_shouldWaitOnlyBetweenProcessedItems() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let source = ScriptedSource::new(playlist());
    let synthesizer = RecordingSynthesizer::new();
    let mut options = options(dir.path());
    options.inter_item_delay = Duration::from_millis(40);

    let started = Instant::now();
    orchestrator(&source, &synthesizer, options.clone()).run(SOURCE).await?;
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(80));
    assert!(elapsed < Duration::from_secs(1));

    options.inter_item_delay = Duration::from_secs(30);
    let started = Instant::now();
    let report = orchestrator(&source, &synthesizer, options).run(SOURCE).await?;
    assert_eq!(report.skipped, 3);
    assert!(started.elapsed() < Duration::from_secs(1));
    Ok(())
}

/// Test a single item outcome without a checkpoint
#[tokio::test]
async fn test_processItem_withoutStore_shouldReportOutcome() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let source = ScriptedSource::new(playlist());
    let runner = orchestrator(&source, &RecordingSynthesizer::new(), options(dir.path()));

    let outcome = runner.process_item(&playlist()[1], None).await;

    assert_eq!(outcome, ItemOutcome::Completed(Some(SubtitleProvenance::SourceProvided)));
    Ok(())
}

/// Test the orchestrator with the real transcriber and a mock speech service
#[tokio::test]
async fn test_run_withTranscriber_shouldWriteSynthesizedSrt() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let source = ScriptedSource::new(vec![common::media_item(1, "zzz", "Lecture", &[], &[])]);
    let stt = MockSpeechToText::working();
    let config = TranscriptionConfig {
        cache_dir: Some(dir.path().join("cache")),
        ..TranscriptionConfig::default()
    };
    let transcriber = Transcriber::new(Arc::new(stt.clone()), &config, dir.path().join("work"));
    let runner = PipelineOrchestrator::new(Arc::new(source), Arc::new(transcriber), options(dir.path()));

    let report = runner.run(SOURCE).await?;

    assert_eq!(report.completed, 1);
    assert_eq!(stt.request_count(), 1);
    let srt = std::fs::read_to_string(dir.path().join("downloads").join("1. Lecture.whisper.srt"))?;
    assert!(srt.contains("00:00:00,000 --> 00:00:01,500"));
    Ok(())
}
