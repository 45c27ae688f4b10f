/*!
 * Structured batch translation of subtitle tracks.
 *
 * - `formats`: JSON and tabular wire shapes
 * - `batch`: batching, identifier validation, retries and fallback
 * - `quality`: advisory scan of the assembled track
 */

pub mod batch;
pub mod formats;
pub mod quality;

pub use batch::{BatchOptions, BatchResult, BatchTranslator, TrackTranslation, TranslationStats};
pub use formats::{WireItem, decode_response, encode_batch, strip_code_fences};
pub use quality::QualityReport;
