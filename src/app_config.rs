use anyhow::{Context, Result, anyhow};
use log::{LevelFilter, warn};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::file_utils::FileManager;
use crate::language_utils::{self, EnvLocale, LanguageTag};

/// Application configuration module
/// This module handles loading, validating and saving the configuration
/// for pipeline runs, translation, transcription and summaries.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Root directory for downloads, subtitles and checkpoints
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Language preferences
    #[serde(default)]
    pub languages: LanguageConfig,

    /// Pipeline behaviour
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Transcription config
    #[serde(default)]
    pub transcription: TranscriptionConfig,

    /// Summary generation config
    #[serde(default)]
    pub summary: SummaryConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: OpenAI (chat completions and audio transcription)
    #[default]
    OpenAI,
    // @provider: Anthropic
    Anthropic,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::OpenAI => "openai".to_string(),
            Self::Anthropic => "anthropic".to_string(),
        }
    }

    /// Environment variable holding the API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::OpenAI => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Structured exchange shape for batch translation
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// Array of `{"id", "text"}` objects
    #[default]
    Json,
    /// CSV with the header `id,time,text`
    #[serde(alias = "csv")]
    Tabular,
}

impl std::fmt::Display for WireFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Tabular => write!(f, "tabular"),
        }
    }
}

impl std::str::FromStr for WireFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "tabular" | "csv" => Ok(Self::Tabular),
            _ => Err(anyhow!("Invalid wire format: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key (empty means read from the environment)
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        match provider_type {
            TranslationProvider::OpenAI => Self {
                provider_type: "openai".to_string(),
                model: default_openai_model(),
                api_key: String::new(),
                endpoint: default_openai_endpoint(),
                timeout_secs: default_timeout_secs(),
            },
            TranslationProvider::Anthropic => Self {
                provider_type: "anthropic".to_string(),
                model: default_anthropic_model(),
                api_key: String::new(),
                endpoint: default_anthropic_endpoint(),
                timeout_secs: default_anthropic_timeout_secs(),
            },
        }
    }
}

/// Language preferences
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LanguageConfig {
    /// Ordered subtitle preferences; empty means derive from the host locale
    #[serde(default)]
    pub subtitle_preferences: Vec<String>,

    /// Spoken language hint for transcription (auto-detect when absent)
    #[serde(default)]
    pub transcription_language: Option<String>,

    /// Language of the generated summary
    #[serde(default = "default_summary_language")]
    pub summary_language: String,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            subtitle_preferences: Vec::new(),
            transcription_language: None,
            summary_language: default_summary_language(),
        }
    }
}

impl LanguageConfig {
    /// Resolved preference list, always terminating in `und`
    pub fn preferences(&self) -> Vec<LanguageTag> {
        if self.subtitle_preferences.is_empty() {
            return language_utils::default_preferences(&EnvLocale);
        }
        let mut tags: Vec<LanguageTag> = self
            .subtitle_preferences
            .iter()
            .map(|s| LanguageTag::parse(s))
            .collect();
        let undetermined = LanguageTag::undetermined();
        if !tags.contains(&undetermined) {
            tags.push(undetermined);
        }
        tags
    }
}

/// Pipeline behaviour
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Sleep between items to respect upstream rate limits
    #[serde(default = "default_inter_item_delay_secs")]
    pub inter_item_delay_secs: u64,

    /// Track progress in a checkpoint file
    #[serde(default = "default_true")]
    pub enable_checkpoint: bool,

    /// Use subtitles published by the source before transcribing
    #[serde(default = "default_true")]
    pub prefer_existing_subtitles: bool,

    /// Download audio only
    #[serde(default = "default_true")]
    pub audio_only: bool,

    /// Skip the 64 kbps mono conversion
    #[serde(default)]
    pub keep_original_audio: bool,

    /// Download only; items without subtitles are left pending transcription
    #[serde(default)]
    pub skip_transcription: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inter_item_delay_secs: default_inter_item_delay_secs(),
            enable_checkpoint: true,
            prefer_existing_subtitles: true,
            audio_only: true,
            keep_original_audio: false,
            skip_transcription: false,
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Common translation settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// System prompt template. Placeholder: {target_language}
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Maximum subtitle lines per request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Total attempts per batch, first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff between attempts (in milliseconds), doubled each time
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Structured exchange shape
    #[serde(default)]
    pub wire_format: WireFormat,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            wire_format: WireFormat::default(),
            temperature: default_temperature(),
        }
    }
}

/// Speech-to-text configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranscriptionConfig {
    /// Speech-to-text model
    #[serde(default = "default_transcription_model")]
    pub model: String,

    /// Length of each chunk when a file is split
    #[serde(default = "default_chunk_duration_minutes")]
    pub chunk_duration_minutes: u64,

    /// Files above this size are split before upload
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Transcript cache location; defaults under the user cache dir
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model: default_transcription_model(),
            chunk_duration_minutes: default_chunk_duration_minutes(),
            max_upload_bytes: default_max_upload_bytes(),
            cache_dir: None,
        }
    }
}

impl TranscriptionConfig {
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("playscribe")
                .join("transcripts")
        })
    }
}

/// Summary generation configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SummaryConfig {
    /// Model override; empty uses the active provider's model
    #[serde(default = "String::new")]
    pub model: String,

    #[serde(default = "default_summary_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_tokens: default_summary_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

fn default_summary_language() -> String {
    "en".to_string()
}

fn default_inter_item_delay_secs() -> u64 {
    5
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_anthropic_timeout_secs() -> u64 {
    180
}

fn default_batch_size() -> usize {
    150
}

fn default_max_attempts() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500 // doubled on each further attempt
}

fn default_temperature() -> f32 {
    0.3
}

fn default_true() -> bool {
    true
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_chunk_duration_minutes() -> u64 {
    10
}

fn default_max_upload_bytes() -> u64 {
    25 * 1024 * 1024
}

fn default_summary_max_tokens() -> u32 {
    16000
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_openai_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-haiku".to_string()
}

fn default_system_prompt() -> String {
    "You are a professional subtitle translator. Translate every subtitle into {target_language}. Translate only the text, keep identifiers unchanged, preserve line breaks and ordering, and return only the requested structured data with no commentary.".to_string()
}

impl Config {
    /// Load a configuration file, creating one with defaults when missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let reader = BufReader::new(file);
            return serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config file: {}", path.display()));
        }

        warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        FileManager::write_to_file(path, &config_json)
            .with_context(|| format!("Failed to write default config to file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        for code in &self.languages.subtitle_preferences {
            language_utils::validate_language_code(code)
                .with_context(|| format!("Invalid subtitle preference: {}", code))?;
        }
        if let Some(code) = &self.languages.transcription_language {
            language_utils::validate_language_code(code)
                .with_context(|| format!("Invalid transcription language: {}", code))?;
        }
        language_utils::validate_language_code(&self.languages.summary_language)
            .with_context(|| format!("Invalid summary language: {}", self.languages.summary_language))?;

        let common = &self.translation.common;
        if common.batch_size == 0 {
            return Err(anyhow!("translation.common.batch_size must be greater than 0"));
        }
        if common.max_attempts == 0 {
            return Err(anyhow!("translation.common.max_attempts must be at least 1"));
        }
        if self.transcription.chunk_duration_minutes == 0 {
            return Err(anyhow!("transcription.chunk_duration_minutes must be greater than 0"));
        }

        Ok(())
    }

    /// Check that a key is available before making remote calls
    pub fn validate_remote(&self) -> Result<()> {
        if self.translation.get_api_key().is_empty() {
            return Err(anyhow!(
                "API key is required for the {} provider (set it in the config or {})",
                self.translation.provider.display_name(),
                self.translation.provider.api_key_env()
            ));
        }
        Ok(())
    }

    /// Provider config used for speech-to-text (always OpenAI-compatible)
    pub fn transcription_provider(&self) -> ProviderConfig {
        self.translation
            .get_provider_config(&TranslationProvider::OpenAI)
            .cloned()
            .unwrap_or_else(|| ProviderConfig::new(TranslationProvider::OpenAI))
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            output_dir: default_output_dir(),
            languages: LanguageConfig::default(),
            pipeline: PipelineConfig::default(),
            translation: TranslationConfig::default(),
            transcription: TranscriptionConfig::default(),
            summary: SummaryConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(&self.provider)
    }

    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, provider_type: &TranslationProvider) -> Option<&ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        self.available_providers
            .iter()
            .find(|p| p.provider_type == provider_str)
    }

    /// Resolved config for the active provider, defaults filled in
    pub fn active_provider(&self) -> ProviderConfig {
        let mut resolved = ProviderConfig::new(self.provider);
        if let Some(configured) = self.get_active_provider_config() {
            if !configured.model.is_empty() {
                resolved.model = configured.model.clone();
            }
            if !configured.api_key.is_empty() {
                resolved.api_key = configured.api_key.clone();
            }
            if !configured.endpoint.is_empty() {
                resolved.endpoint = configured.endpoint.clone();
            }
            resolved.timeout_secs = configured.timeout_secs;
        }
        resolved
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        self.active_provider().model
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        self.active_provider().api_key
    }

    /// Fill an empty key for `provider`, adding its entry when absent
    pub fn set_api_key_if_empty(&mut self, provider: TranslationProvider, api_key: &str) {
        if api_key.is_empty() {
            return;
        }
        let provider_str = provider.to_lowercase_string();
        match self
            .available_providers
            .iter_mut()
            .find(|p| p.provider_type == provider_str)
        {
            Some(existing) if existing.api_key.is_empty() => existing.api_key = api_key.to_string(),
            Some(_) => {}
            None => {
                let mut entry = ProviderConfig::new(provider);
                entry.api_key = api_key.to_string();
                self.available_providers.push(entry);
            }
        }
    }

    /// Override the model of the active provider
    pub fn set_model(&mut self, model: &str) {
        let provider = self.provider;
        let provider_str = provider.to_lowercase_string();
        match self
            .available_providers
            .iter_mut()
            .find(|p| p.provider_type == provider_str)
        {
            Some(existing) => existing.model = model.to_string(),
            None => {
                let mut entry = ProviderConfig::new(provider);
                entry.model = model.to_string();
                self.available_providers.push(entry);
            }
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: vec![
                ProviderConfig::new(TranslationProvider::OpenAI),
                ProviderConfig::new(TranslationProvider::Anthropic),
            ],
            common: TranslationCommonConfig::default(),
        }
    }
}
