/*!
 * Provider implementations for remote text and speech services.
 *
 * This module contains client implementations for:
 * - OpenAI: chat completions and audio transcription
 * - Anthropic: messages API
 * - Mock: scripted providers for tests and benchmarks
 *
 * Providers make exactly one attempt per call. Retrying is the caller's job.
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use crate::app_config::{ProviderConfig, TranslationConfig, TranslationProvider};
use crate::errors::ProviderError;
use crate::subtitle_processor::Transcript;

pub mod anthropic;
pub mod mock;
pub mod openai;

/// One text-generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// System prompt
    pub system: String,
    /// User message
    pub user: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Output token limit, provider default when absent
    pub max_tokens: Option<u32>,
    /// Model override, provider default when absent
    pub model: Option<String>,
}

impl GenerationRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.3,
            max_tokens: None,
            model: None,
        }
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the output token limit
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Override the model; empty strings are ignored
    pub fn model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.is_empty() {
            self.model = Some(model);
        }
        self
    }
}

/// Common trait for text-generation services
///
/// Used by batch translation and summary generation, allowing the
/// concrete client to be swapped for a mock in tests.
#[async_trait]
pub trait TextGenerator: Send + Sync + Debug {
    /// Run one request and return the generated text
    async fn generate(&self, request: GenerationRequest) -> Result<String, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;

    /// `provider/model` label for logs
    fn name(&self) -> String;
}

/// Common trait for speech-to-text services
#[async_trait]
pub trait SpeechToText: Send + Sync + Debug {
    /// Transcribe one audio file into time-aligned segments
    async fn transcribe(
        &self,
        audio: &Path,
        language: Option<&str>,
    ) -> Result<Transcript, ProviderError>;
}

/// Build the text generator for the active provider
pub fn create_text_generator(config: &TranslationConfig) -> Arc<dyn TextGenerator> {
    create_text_generator_for(config.provider, &config.active_provider())
}

/// Build a text generator from an explicit provider config
pub fn create_text_generator_for(
    provider: TranslationProvider,
    config: &ProviderConfig,
) -> Arc<dyn TextGenerator> {
    match provider {
        TranslationProvider::OpenAI => Arc::new(openai::OpenAI::new(
            &config.api_key,
            &config.endpoint,
            &config.model,
            config.timeout_secs,
        )),
        TranslationProvider::Anthropic => Arc::new(anthropic::Anthropic::new(
            &config.api_key,
            &config.endpoint,
            &config.model,
            config.timeout_secs,
        )),
    }
}

/// Map a reqwest transport error to a provider error
pub(crate) fn transport_error(provider: &str, error: reqwest::Error) -> ProviderError {
    if error.is_timeout() || error.is_connect() {
        ProviderError::ConnectionError(format!("{}: {}", provider, error))
    } else {
        ProviderError::RequestFailed(format!("{}: {}", provider, error))
    }
}
