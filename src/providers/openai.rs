use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::subtitle_processor::Transcript;

use super::{GenerationRequest, SpeechToText, TextGenerator, transport_error};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

/// OpenAI client for chat completions and audio transcription
#[derive(Debug)]
pub struct OpenAI {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// API base URL, including the version segment
    endpoint: String,
    /// Default chat model
    model: String,
    /// Speech-to-text model
    transcription_model: String,
}

/// Chat completion request
#[derive(Debug, Serialize)]
pub struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// Chat message
#[derive(Debug, Serialize, Deserialize)]
pub struct OpenAIMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

/// Token usage information
#[derive(Debug, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
pub struct OpenAIResponse {
    pub choices: Vec<OpenAIChoice>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

/// One completion choice
#[derive(Debug, Deserialize)]
pub struct OpenAIChoice {
    pub message: OpenAIMessage,
}

impl OpenAIRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Add a message to the request; empty system messages are skipped
    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        let role = role.into();
        let content = content.into();
        if role == "system" && content.is_empty() {
            return self;
        }
        self.messages.push(OpenAIMessage {
            role,
            content: Some(content),
        });
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

impl OpenAI {
    /// Create a new OpenAI client
    pub fn new(api_key: &str, endpoint: &str, model: &str, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key: api_key.to_string(),
            endpoint: if endpoint.is_empty() {
                DEFAULT_ENDPOINT.to_string()
            } else {
                endpoint.trim_end_matches('/').to_string()
            },
            model: model.to_string(),
            transcription_model: "whisper-1".to_string(),
        }
    }

    /// Set the speech-to-text model
    pub fn with_transcription_model(mut self, model: impl Into<String>) -> Self {
        self.transcription_model = model.into();
        self
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to get error response text".to_string());
        error!("OpenAI API error ({}): {}", status, error_text);
        Err(ProviderError::from_status(status.as_u16(), error_text))
    }

    /// Complete a chat request
    pub async fn complete(&self, request: OpenAIRequest) -> Result<OpenAIResponse, ProviderError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error("OpenAI", e))?;

        let response = Self::check_status(response).await?;
        let parsed = response
            .json::<OpenAIResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(format!("OpenAI response: {}", e)))?;

        if let Some(usage) = &parsed.usage {
            debug!(
                "OpenAI usage: {} in / {} out / {} total tokens",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }
        Ok(parsed)
    }

    /// Extract text from the first choice
    pub fn extract_text_from_response(response: &OpenAIResponse) -> String {
        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for OpenAI {
    async fn generate(&self, request: GenerationRequest) -> Result<String, ProviderError> {
        let model = request.model.unwrap_or_else(|| self.model.clone());
        let chat = OpenAIRequest::new(model)
            .add_message("system", request.system)
            .add_message("user", request.user)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens);

        let response = self.complete(chat).await?;
        Ok(Self::extract_text_from_response(&response))
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(format!("{}/models", self.endpoint))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| transport_error("OpenAI", e))?;
        Self::check_status(response).await?;
        Ok(())
    }

    fn name(&self) -> String {
        format!("openai/{}", self.model)
    }
}

#[async_trait]
impl SpeechToText for OpenAI {
    async fn transcribe(
        &self,
        audio: &Path,
        language: Option<&str>,
    ) -> Result<Transcript, ProviderError> {
        let bytes = tokio::fs::read(audio)
            .await
            .map_err(|e| ProviderError::RequestFailed(format!("Failed to read {:?}: {}", audio, e)))?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());

        let mut form = Form::new()
            .text("model", self.transcription_model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment")
            .part("file", Part::bytes(bytes).file_name(file_name));
        if let Some(language) = language {
            form = form.text("language", language.to_string());
        }

        debug!("Uploading {} to speech-to-text API", audio.display());
        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.endpoint))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error("OpenAI", e))?;

        let response = Self::check_status(response).await?;
        response
            .json::<Transcript>()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Transcription response: {}", e)))
    }
}
