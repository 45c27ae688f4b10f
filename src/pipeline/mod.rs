/*!
 * Per-item pipeline orchestration.
 *
 * - `collaborators`: the media source and synthesizer contracts
 * - `orchestrator`: the resumable driver
 */

pub mod collaborators;
pub mod orchestrator;

pub use collaborators::{AcquiredMedia, MediaItem, MediaSource, SubtitleSynthesizer};
pub use orchestrator::{
    ItemOutcome, OrchestratorOptions, PipelineOrchestrator, RunReport, ensure_success,
    synthesized_subtitle_path,
};
