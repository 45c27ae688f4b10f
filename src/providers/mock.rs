/*!
 * Mock provider implementations for testing.
 *
 * This module provides mock providers that simulate different behaviors:
 * - `MockTextGenerator::working()` - Answers every structured request correctly
 * - `MockTextGenerator::missing_ids(..)` - Leaves the given lines out of each answer
 * - `MockTextGenerator::malformed()` - Answers with prose instead of data
 * - `MockTextGenerator::fenced()` - Wraps correct answers in a markdown fence
 * - `MockTextGenerator::failing()` - Always fails with an error
 * - `MockTextGenerator::with_responses(..)` - Replays a fixed script
 * - `MockSpeechToText` - Returns canned transcripts for audio files
 *
 * Clones share the request counter and the request log, so a test can hand
 * a clone to the code under test and inspect the original afterwards.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::app_config::WireFormat;
use crate::errors::ProviderError;
use crate::subtitle_processor::{Transcript, TranscriptSegment};
use crate::translation::formats::{TABULAR_HEADER, WireItem, decode_response};

use super::{GenerationRequest, SpeechToText, TextGenerator};

/// Prefix the working mock puts in front of every line
pub const TRANSLATED_PREFIX: &str = "[TRANSLATED] ";

/// Behavior mode for the mock text generator
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always answers with every line translated
    Working,
    /// Answers but leaves out the given identifiers
    MissingIds(Vec<String>),
    /// Returns prose instead of structured data
    Malformed,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Returns empty response
    Empty,
    /// Wraps a correct answer in a markdown fence
    Fenced,
}

/// Mock text generator for testing translation and summary behavior
#[derive(Debug, Clone)]
pub struct MockTextGenerator {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter shared between clones
    request_count: Arc<AtomicUsize>,
    /// Every request received, in order
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
    /// Scripted responses consumed before falling back to `behavior`
    script: Arc<Mutex<VecDeque<String>>>,
}

impl MockTextGenerator {
    /// Create a new mock generator with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            script: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn missing_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(MockBehavior::MissingIds(ids.into_iter().map(Into::into).collect()))
    }

    pub fn malformed() -> Self {
        Self::new(MockBehavior::Malformed)
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    pub fn fenced() -> Self {
        Self::new(MockBehavior::Fenced)
    }

    /// Replay `responses` in order, then behave as `Working`
    pub fn with_responses(responses: Vec<String>) -> Self {
        let mock = Self::working();
        mock.script.lock().extend(responses);
        mock
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Copy of every request received so far
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }

    /// Locate the structured payload at the end of a request
    fn find_payload(user: &str) -> Option<(WireFormat, &str)> {
        let header = TABULAR_HEADER.join(",");
        // The prompt may mention the header before the payload itself
        if let Some(pos) = user.rfind(&header) {
            return Some((WireFormat::Tabular, &user[pos..]));
        }
        user.rfind("\n[")
            .map(|pos| (WireFormat::Json, &user[pos + 1..]))
    }

    /// Answer a structured request, leaving out `skip`
    pub fn answer(user: &str, skip: &[String]) -> String {
        let Some((format, payload)) = Self::find_payload(user) else {
            return format!("{}{}", TRANSLATED_PREFIX, user);
        };
        let items = match decode_response(payload, format) {
            Ok(items) => items,
            Err(e) => return format!("mock could not read request: {}", e),
        };

        let translated: Vec<WireItem> = items
            .into_iter()
            .filter(|item| !skip.contains(&item.id))
            .map(|item| WireItem {
                text: format!("{}{}", TRANSLATED_PREFIX, item.text),
                id: item.id,
            })
            .collect();

        match format {
            WireFormat::Json => serde_json::to_string(&translated).unwrap_or_default(),
            WireFormat::Tabular => {
                let mut writer = csv::Writer::from_writer(Vec::new());
                let _ = writer.write_record(TABULAR_HEADER);
                for item in &translated {
                    let _ = writer.write_record([item.id.as_str(), "", item.text.as_str()]);
                }
                writer
                    .into_inner()
                    .ok()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
                    .unwrap_or_default()
            }
        }
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        if let Some(scripted) = self.script.lock().pop_front() {
            return Ok(scripted);
        }

        match &self.behavior {
            MockBehavior::Working => Ok(Self::answer(&request.user, &[])),

            MockBehavior::MissingIds(ids) => Ok(Self::answer(&request.user, ids)),

            MockBehavior::Malformed => Ok("Here are your translations, enjoy!".to_string()),

            MockBehavior::Intermittent { fail_every } => {
                if *fail_every > 0 && count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    Ok(Self::answer(&request.user, &[]))
                }
            }

            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),

            MockBehavior::Empty => Ok(String::new()),

            MockBehavior::Fenced => {
                let label = match Self::find_payload(&request.user) {
                    Some((WireFormat::Tabular, _)) => "csv",
                    _ => "json",
                };
                Ok(format!("```{}\n{}\n```", label, Self::answer(&request.user, &[])))
            }
        }
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError("mock offline".to_string())),
            _ => Ok(()),
        }
    }

    fn name(&self) -> String {
        "mock/test-model".to_string()
    }
}

/// Mock speech-to-text returning one transcript per call
#[derive(Debug, Clone)]
pub struct MockSpeechToText {
    /// Fail every call when set
    failing: bool,
    /// Request counter shared between clones
    request_count: Arc<AtomicUsize>,
}

impl MockSpeechToText {
    pub fn working() -> Self {
        Self {
            failing: false,
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::working()
        }
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechToText for MockSpeechToText {
    async fn transcribe(
        &self,
        audio: &Path,
        language: Option<&str>,
    ) -> Result<Transcript, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(ProviderError::ApiError {
                message: format!("Simulated transcription failure for {}", audio.display()),
                status_code: 500,
            });
        }

        let stem = audio
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(Transcript {
            text: format!("{} part one {} part two", stem, stem),
            language: language.map(str::to_string),
            segments: vec![
                TranscriptSegment {
                    start: 0.0,
                    end: 1.5,
                    text: format!("{} part one (call {})", stem, count + 1),
                },
                TranscriptSegment {
                    start: 1.5,
                    end: 3.0,
                    text: format!("{} part two", stem),
                },
            ],
        })
    }
}
