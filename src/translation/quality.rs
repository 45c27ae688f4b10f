/*!
 * Advisory quality scan over a translated track.
 *
 * The scan only counts suspicious lines and logs a summary. It never rejects
 * or modifies output.
 */

use log::{info, warn};
use std::fmt;

use crate::subtitle_processor::SubtitleTrack;

/// Tokens models emit when they give up on a line
pub const UNTRANSLATED_MARKERS: [&str; 4] = ["[UNTRANSLATED]", "[ERROR]", "[N/A]", "???"];

/// Lines shorter than this (in characters) are flagged as possibly truncated
pub const MIN_PLAUSIBLE_CHARS: usize = 2;

/// Counts of suspicious lines in a translated track
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QualityReport {
    /// Lines checked
    pub lines_checked: usize,
    /// Lines with no text at all
    pub empty_translations: usize,
    /// Lines carrying a give-up marker
    pub untranslated_markers: usize,
    /// Lines with replacement characters from a bad decode
    pub encoding_errors: usize,
    /// Non-empty lines too short to be a real translation
    pub suspicious_length: usize,
    /// Identifiers of every flagged line, in track order
    pub flagged_ids: Vec<String>,
}

impl QualityReport {
    /// Scan every entry of a track
    pub fn scan(track: &SubtitleTrack) -> Self {
        let mut report = Self::default();

        for entry in &track.entries {
            report.lines_checked += 1;
            let text = entry.text.trim();
            let mut flagged = false;

            if text.is_empty() {
                report.empty_translations += 1;
                flagged = true;
            } else if text.chars().count() < MIN_PLAUSIBLE_CHARS {
                report.suspicious_length += 1;
                flagged = true;
            }

            if UNTRANSLATED_MARKERS.iter().any(|m| text.contains(m)) {
                report.untranslated_markers += 1;
                flagged = true;
            }

            if text.contains('\u{FFFD}') {
                report.encoding_errors += 1;
                flagged = true;
            }

            if flagged {
                report.flagged_ids.push(entry.index.clone());
            }
        }

        report
    }

    /// Total number of issues found
    pub fn issue_count(&self) -> usize {
        self.empty_translations + self.untranslated_markers + self.encoding_errors + self.suspicious_length
    }

    pub fn is_clean(&self) -> bool {
        self.issue_count() == 0
    }

    /// Log a one-line summary, as a warning when anything was flagged
    pub fn log_summary(&self) {
        if self.is_clean() {
            info!("Quality check: {} lines, no issues", self.lines_checked);
        } else {
            warn!("Quality check: {}", self);
        }
    }
}

impl fmt::Display for QualityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} issue(s) in {} lines ({} empty, {} untranslated markers, {} encoding errors, {} suspiciously short)",
            self.issue_count(),
            self.lines_checked,
            self.empty_translations,
            self.untranslated_markers,
            self.encoding_errors,
            self.suspicious_length
        )
    }
}
