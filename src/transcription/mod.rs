/*!
 * Audio transcription into subtitle tracks.
 *
 * - `chunking`: ffprobe/ffmpeg splitting with a self-cleaning chunk directory
 * - `cache`: per-chunk transcript cache keyed by file hash
 * - `transcriber`: the synthesizer the pipeline calls
 */

pub mod cache;
pub mod chunking;
pub mod transcriber;

pub use cache::{CacheStats, TranscriptCache};
pub use chunking::{TempChunkGuard, split_audio};
pub use transcriber::Transcriber;
