/*!
 * # Playscribe - resumable playlist subtitle pipeline
 *
 * A Rust library that turns a video playlist into subtitles and study
 * material, surviving interruptions without redoing paid work.
 *
 * ## Features
 *
 * - Per-item checkpointing with deterministic job identity
 * - Subtitle language selection across inconsistent locale spellings
 * - Speech-to-text synthesis when no suitable subtitle exists
 * - Batch translation with strict identifier validation and fallback
 * - Consolidation of a playlist's subtitles into study material
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `checkpoint`: durable per-item state
 * - `pipeline`: the resumable per-item driver and its collaborator traits
 * - `language_utils`: locale tags, preferences and subtitle selection
 * - `translation`: structured batch translation and quality scan
 * - `transcription`: chunked, cached speech-to-text
 * - `media`: `yt-dlp` / `ffmpeg` acquisition
 * - `summary`: consolidation and study-material generation
 * - `providers`: OpenAI, Anthropic and mock clients
 * - `app_config`, `errors`, `file_utils`, `subtitle_processor`: shared plumbing
 */

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod app_config;
pub mod checkpoint;
pub mod command_runner;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod media;
pub mod pipeline;
pub mod progress;
pub mod providers;
pub mod subtitle_processor;
pub mod summary;
pub mod transcription;
pub mod translation;

pub use app_config::Config;
pub use checkpoint::{CheckpointStore, CheckpointSummary, ItemStatus, SubtitleProvenance, job_identity};
pub use errors::{AppError, PipelineError, ProviderError, TranslationError};
pub use language_utils::{AvailableSubtitleSet, LanguageTag};
pub use pipeline::{PipelineOrchestrator, RunReport};
pub use subtitle_processor::{SubtitleEntry, SubtitleTrack};
pub use translation::{BatchOptions, BatchTranslator};
