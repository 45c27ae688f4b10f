/*!
 * Integration tests for structured batch translation.
 *
 * Every test runs against the mock text generator; retries use a zero
 * backoff so the suite stays fast.
 */

use std::sync::Arc;

use playscribe::app_config::WireFormat;
use playscribe::providers::mock::{MockTextGenerator, TRANSLATED_PREFIX};
use playscribe::subtitle_processor::SubtitleTrack;
use playscribe::translation::{BatchOptions, BatchTranslator};
use crate::common;

fn translator(mock: &MockTextGenerator, format: WireFormat, max_attempts: u32) -> BatchTranslator {
    let options = BatchOptions::default()
        .wire_format(format)
        .batch_size(10)
        .max_attempts(max_attempts)
        .retry_backoff_ms(0);
    BatchTranslator::new(Arc::new(mock.clone()), options)
}

fn translated(text: &str) -> String {
    format!("{}{}", TRANSLATED_PREFIX, text)
}

/// Test that a line missing from every answer keeps its original text
#[tokio::test]
async fn test_translateBatch_withPersistentlyMissingId_shouldFallBackForThatLineOnly() {
    let mock = MockTextGenerator::missing_ids(["2"]);
    let track = common::sample_track(3);

    let result = translator(&mock, WireFormat::Tabular, 2)
        .translate_batch(&track.entries, "Spanish")
        .await
        .unwrap();

    assert_eq!(mock.request_count(), 2);
    assert_eq!(result.attempts, 2);
    assert_eq!(result.entries[0].text, translated("Line number 1"));
    assert_eq!(result.entries[1].text, "Line number 2");
    assert_eq!(result.entries[2].text, translated("Line number 3"));
    assert_eq!(result.fallback_ids, vec!["2".to_string()]);
    assert!(result.used_fallback);
}

/// Test that identifiers and timings always come from the source
#[tokio::test]
async fn test_translateTrack_shouldPreserveIdsAndTimings() {
    for format in [WireFormat::Json, WireFormat::Tabular] {
        let mock = MockTextGenerator::working();
        let track = common::sample_track(25);

        let output = translator(&mock, format, 3).translate_track(&track, "German").await.unwrap();

        assert_eq!(output.track.len(), 25);
        for (source, result) in track.entries.iter().zip(&output.track.entries) {
            assert_eq!(source.index, result.index);
            assert_eq!(source.timing, result.timing);
            assert_eq!(result.text, translated(&source.text));
        }
        assert_eq!(mock.request_count(), 3);
        assert_eq!(output.stats.total_batches, 3);
        assert_eq!(output.stats.fallback_lines, 0);
    }
}

/// Test that exhausting attempts yields the source track, identically every time
#[tokio::test]
async fn test_translateTrack_withFailingProvider_shouldBeDeterministicFallback() {
    let track = common::sample_track(4);

    let first = translator(&MockTextGenerator::failing(), WireFormat::Json, 2)
        .translate_track(&track, "French")
        .await
        .unwrap();
    let second = translator(&MockTextGenerator::failing(), WireFormat::Json, 2)
        .translate_track(&track, "French")
        .await
        .unwrap();

    assert_eq!(first.track, track);
    assert_eq!(first.track, second.track);
    assert_eq!(first.stats.fallback_lines, 4);
}

/// Test that an answer with an extra identifier is retried
#[tokio::test]
async fn test_translateBatch_withUnexpectedId_shouldRetryAndAcceptValidAnswer() {
    let bogus = r#"[{"id":"1","text":"uno"},{"id":"2","text":"dos"},{"id":"99","text":"extra"}]"#;
    let mock = MockTextGenerator::with_responses(vec![bogus.to_string()]);
    let track = common::sample_track(2);

    let result = translator(&mock, WireFormat::Json, 3)
        .translate_batch(&track.entries, "Spanish")
        .await
        .unwrap();

    assert_eq!(mock.request_count(), 2);
    assert!(result.is_complete());
    assert_eq!(result.entries[0].text, translated("Line number 1"));
}

/// Test that a tabular answer without the header counts as malformed and is retried
#[tokio::test]
async fn test_translateBatch_withHeaderlessTabular_shouldRetry() {
    let headerless = "1,,uno\n2,,dos\n".to_string();
    let mock = MockTextGenerator::with_responses(vec![headerless]);
    let track = common::sample_track(2);

    let result = translator(&mock, WireFormat::Tabular, 2)
        .translate_batch(&track.entries, "Spanish")
        .await
        .unwrap();

    assert_eq!(mock.request_count(), 2);
    assert_eq!(result.retries_used(), 1);
    assert!(result.is_complete());
}

/// Test that an empty answer on every attempt keeps every original line
#[tokio::test]
async fn test_translateBatch_withEmptyResponses_shouldKeepOriginals() {
    let mock = MockTextGenerator::empty();
    let track = common::sample_track(3);

    let result = translator(&mock, WireFormat::Json, 3)
        .translate_batch(&track.entries, "Italian")
        .await
        .unwrap();

    assert_eq!(mock.request_count(), 3);
    assert_eq!(result.entries, track.entries);
    assert_eq!(result.fallback_ids.len(), 3);
}

/// Test that requests carry only the current batch
#[tokio::test]
async fn test_translateTrack_shouldSendOnlyBatchLinesPerRequest() {
    let mock = MockTextGenerator::working();
    let track = common::sample_track(12);

    translator(&mock, WireFormat::Json, 1).translate_track(&track, "Dutch").await.unwrap();

    let requests = mock.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].user.contains("Line number 10"));
    assert!(!requests[0].user.contains("Line number 11"));
    assert!(requests[1].user.contains("Line number 12"));
    assert!(requests[0].system.contains("Dutch"));
}

/// Test that a translated track round-trips through an SRT file
#[tokio::test]
async fn test_translateTrack_output_shouldWriteValidSrt() {
    let dir = common::create_temp_dir().unwrap();
    let input = common::create_test_subtitle(dir.path(), "lesson.srt").unwrap();
    let track = SubtitleTrack::read_from_file(&input).unwrap();
    let mock = MockTextGenerator::working();

    let output = translator(&mock, WireFormat::Tabular, 2).translate_track(&track, "Portuguese").await.unwrap();
    let path = dir.path().join("lesson.pt.srt");
    output.track.write_to_file(&path).unwrap();

    let reread = SubtitleTrack::read_from_file(&path).unwrap();
    assert_eq!(reread.len(), 3);
    assert_eq!(reread.entries[0].timing, "00:00:01,000 --> 00:00:04,000");
    assert_eq!(reread.entries[2].text, translated("For testing purposes."));
    assert!(output.quality.is_clean());
}

/// Test that a blank translation of a non-blank line is retried like a missing one
#[tokio::test]
async fn test_translateBatch_withBlankTranslation_shouldRetryThatLine() {
    let blank = r#"[{"id":"1","text":"uno"},{"id":"2","text":""},{"id":"3","text":"tres"}]"#;
    let mock = MockTextGenerator::with_responses(vec![blank.to_string()]);
    let track = common::sample_track(3);

    let result = translator(&mock, WireFormat::Json, 2)
        .translate_batch(&track.entries, "Spanish")
        .await
        .unwrap();

    assert_eq!(mock.request_count(), 2);
    assert!(result.is_complete());
    assert_eq!(result.entries[1].text, translated("Line number 2"));
}

/// Test that a line answered blank on every attempt keeps its text and survives the SRT file
#[tokio::test]
async fn test_translateTrack_withPersistentBlankTranslation_shouldKeepEveryBlock() {
    let blank = r#"[{"id":"1","text":"uno"},{"id":"2","text":"   "},{"id":"3","text":"tres"}]"#;
    let mock = MockTextGenerator::with_responses(vec![blank.to_string(), blank.to_string()]);
    let track = common::sample_track(3);

    let output = translator(&mock, WireFormat::Json, 2).translate_track(&track, "Spanish").await.unwrap();

    assert_eq!(output.stats.fallback_lines, 1);
    assert_eq!(output.track.entries[0].text, "uno");
    assert_eq!(output.track.entries[1].text, "Line number 2");
    let reparsed = SubtitleTrack::parse(&output.track.to_srt_string());
    assert_eq!(reparsed.len(), 3);
}

/// Test that prose answers are retried and then fall back to the source text
#[tokio::test]
async fn test_translateBatch_withMalformedResponses_shouldFallBackAfterRetries() {
    let mock = MockTextGenerator::malformed();
    let track = common::sample_track(2);

    let result = translator(&mock, WireFormat::Tabular, 3)
        .translate_batch(&track.entries, "Spanish")
        .await
        .unwrap();

    assert_eq!(mock.request_count(), 3);
    assert_eq!(result.entries, track.entries);
    assert_eq!(result.fallback_ids, vec!["1".to_string(), "2".to_string()]);
}

/// Test that answers wrapped in a markdown fence are accepted on the first attempt
#[tokio::test]
async fn test_translateTrack_withFencedResponses_shouldDecode() {
    for format in [WireFormat::Json, WireFormat::Tabular] {
        let mock = MockTextGenerator::fenced();
        let track = common::sample_track(4);

        let output = translator(&mock, format, 2).translate_track(&track, "Italian").await.unwrap();

        assert_eq!(mock.request_count(), 1);
        assert_eq!(output.stats.fallback_lines, 0);
        assert_eq!(output.track.entries[3].text, translated("Line number 4"));
    }
}
