/*!
 * Language tag utilities.
 *
 * Normalizes locale spellings (`pt_BR`, `PT-br`, `ptbr`) into a canonical
 * `LanguageTag`, expands tags into matching variants, and selects the best
 * subtitle track for an item from an ordered preference list.
 */

use anyhow::{Result, anyhow};
use isolang::Language;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Subtag for "undetermined / machine-synthesized, no language claim"
pub const UNDETERMINED: &str = "und";

/// Language used when nothing else is known
pub const FALLBACK_LANGUAGE: &str = "en";

/// Host locale used when the environment yields nothing usable
pub const DEFAULT_HOST_LOCALE: &str = "en-US";

static FILENAME_LANGUAGE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.([a-z]{2}(?:[-_][a-z]{2})?|whisper)$").unwrap()
});

static FILENAME_INDEX_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\.\s*").unwrap());

/// Output spelling for a normalized tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagFormat {
    /// `pt-BR`
    #[default]
    Bcp47,
    /// `pt_BR`
    Posix,
    /// `pt`
    Iso639_1,
}

impl FromStr for TagFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "bcp47" => Ok(Self::Bcp47),
            "posix" => Ok(Self::Posix),
            "iso639-1" | "iso639_1" => Ok(Self::Iso639_1),
            _ => Err(anyhow!("Invalid tag format: {}", s)),
        }
    }
}

/// A normalized locale identifier: lowercase language, optional uppercase region
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct LanguageTag {
    language: String,
    region: Option<String>,
}

impl LanguageTag {
    /// Parse any accepted spelling. Never fails: empty input yields `en`.
    pub fn parse(input: &str) -> Self {
        let code = input.split('.').next().unwrap_or_default();
        let code = code.split('@').next().unwrap_or_default().trim();
        // LANGUAGE may carry a colon-separated priority list
        let code = code.split(':').next().unwrap_or_default().trim();

        if code.is_empty() {
            return Self::language_only(FALLBACK_LANGUAGE);
        }
        if code.eq_ignore_ascii_case("whisper") {
            return Self::undetermined();
        }

        let code = code.replace('_', "-");
        let mut parts = code.split('-');
        let mut language = parts.next().unwrap_or_default().to_lowercase();
        let mut region = parts
            .next()
            .filter(|r| r.chars().count() == 2)
            .map(|r| r.to_uppercase());

        if region.is_none() && language.len() == 4 && language.is_ascii() {
            region = Some(language[2..].to_uppercase());
            language.truncate(2);
        }

        Self { language, region }
    }

    /// The reserved undetermined tag
    pub fn undetermined() -> Self {
        Self::language_only(UNDETERMINED)
    }

    fn language_only(language: &str) -> Self {
        Self {
            language: language.to_string(),
            region: None,
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn is_undetermined(&self) -> bool {
        self.language == UNDETERMINED
    }

    /// The tag with the region dropped
    pub fn base(&self) -> Self {
        Self::language_only(&self.language)
    }

    /// Render in the requested spelling
    pub fn format(&self, format: TagFormat) -> String {
        match (format, &self.region) {
            (TagFormat::Iso639_1, _) | (_, None) => self.language.clone(),
            (TagFormat::Bcp47, Some(region)) => format!("{}-{}", self.language, region),
            (TagFormat::Posix, Some(region)) => format!("{}_{}", self.language, region),
        }
    }

    /// Acceptable textual variants, most specific first, all lowercase.
    ///
    /// `pt-BR` expands to `pt-br`, `pt_br`, `ptbr`, `pt`.
    pub fn variants(&self) -> Vec<String> {
        let mut variants = Vec::with_capacity(4);
        if let Some(region) = &self.region {
            let region = region.to_lowercase();
            variants.push(format!("{}-{}", self.language, region));
            variants.push(format!("{}_{}", self.language, region));
            variants.push(format!("{}{}", self.language, region));
        }
        variants.push(self.language.clone());

        let mut seen = std::collections::HashSet::new();
        variants.retain(|v| seen.insert(v.clone()));
        variants
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(TagFormat::Bcp47))
    }
}

impl From<String> for LanguageTag {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<LanguageTag> for String {
    fn from(value: LanguageTag) -> Self {
        value.to_string()
    }
}

/// Normalize a language code string into the requested spelling
pub fn normalize_language_code(code: &str, format: TagFormat) -> String {
    LanguageTag::parse(code).format(format)
}

/// Parse a comma-separated list such as `pt-BR,en,es`
pub fn parse_language_list(list: &str) -> Vec<LanguageTag> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(LanguageTag::parse)
        .collect()
}

/// Check whether the base language is a known ISO 639-1 code (or `und`)
pub fn is_supported_language(code: &str) -> bool {
    let tag = LanguageTag::parse(code);
    tag.is_undetermined() || Language::from_639_1(tag.language()).is_some()
}

/// Validate a code and return its normalized tag
pub fn validate_language_code(code: &str) -> Result<LanguageTag> {
    if code.trim().is_empty() {
        return Err(anyhow!("Language code cannot be empty"));
    }
    if !is_supported_language(code) {
        return Err(anyhow!("Invalid language code: {}", code));
    }
    Ok(LanguageTag::parse(code))
}

/// English name for a language code (`pt-BR` -> `Portuguese (BR)`)
pub fn language_name(code: &str) -> Result<String> {
    let tag = validate_language_code(code)?;
    if tag.is_undetermined() {
        return Ok("Undetermined".to_string());
    }
    let lang = Language::from_639_1(tag.language())
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", code))?;
    Ok(match tag.region() {
        Some(region) => format!("{} ({})", lang.to_name(), region),
        None => lang.to_name().to_string(),
    })
}

// =========================================================================
// Host locale
// =========================================================================

/// Source of the host's preferred locale
pub trait HostLocale {
    /// Raw locale string, if the host exposes one
    fn locale(&self) -> Option<String>;
}

/// Reads `LANGUAGE`, `LC_ALL`, `LC_MESSAGES` and `LANG` in that order
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvLocale;

impl HostLocale for EnvLocale {
    fn locale(&self) -> Option<String> {
        locale_from_vars(|name| std::env::var(name).ok())
    }
}

/// A fixed locale, for tests and explicit overrides
#[derive(Debug, Clone)]
pub struct FixedLocale(pub String);

impl HostLocale for FixedLocale {
    fn locale(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// First usable locale among the standard environment variables
pub fn locale_from_vars<F>(lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    ["LANGUAGE", "LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|name| lookup(name))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty() && value != "C" && value != "POSIX" && !value.starts_with("C."))
}

/// Detect the host tag, defaulting to `en-US`
pub fn detect_host_locale(host: &dyn HostLocale) -> LanguageTag {
    host.locale()
        .map(|raw| LanguageTag::parse(&raw))
        .unwrap_or_else(|| LanguageTag::parse(DEFAULT_HOST_LOCALE))
}

/// Default preference list: host tag, host base, `en`, then `und`.
///
/// Always ends with the undetermined tag so selection has a last resort.
pub fn default_preferences(host: &dyn HostLocale) -> Vec<LanguageTag> {
    let host_tag = detect_host_locale(host);
    let host_base = host_tag.base();
    let candidates = [host_tag, host_base, LanguageTag::parse(FALLBACK_LANGUAGE)];

    // The undetermined tag only ever appears once, at the end
    let mut defaults: Vec<LanguageTag> = Vec::with_capacity(4);
    for tag in candidates {
        if !tag.is_undetermined() && !defaults.contains(&tag) {
            defaults.push(tag);
        }
    }
    defaults.push(LanguageTag::undetermined());
    defaults
}

// =========================================================================
// Available subtitle sets and selection
// =========================================================================

/// How a subtitle track came to exist at the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleOrigin {
    /// Uploaded by a person
    Human,
    /// Generated automatically by the source
    Auto,
}

/// One subtitle track available for an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableSubtitle {
    /// Tag exactly as the source reported it
    pub reported: String,
    /// Normalized tag
    pub tag: LanguageTag,
    pub origin: SubtitleOrigin,
    /// Where to fetch the track (file name, URL or source tag)
    pub locator: String,
}

/// Per-item subtitle tracks with at most one entry per normalized tag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailableSubtitleSet {
    entries: Vec<AvailableSubtitle>,
}

impl AvailableSubtitleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a source listing: manual tags first, then automatic ones
    pub fn from_source_listing<S: AsRef<str>>(manual: &[S], automatic: &[S]) -> Self {
        let mut set = Self::new();
        for tag in manual {
            set.insert(tag.as_ref(), SubtitleOrigin::Human, tag.as_ref());
        }
        for tag in automatic {
            set.insert(tag.as_ref(), SubtitleOrigin::Auto, tag.as_ref());
        }
        set
    }

    /// Insert a track. A human entry replaces an auto entry for the same
    /// tag; nothing ever replaces a human entry.
    pub fn insert(&mut self, reported: &str, origin: SubtitleOrigin, locator: &str) {
        let tag = LanguageTag::parse(reported);
        let candidate = AvailableSubtitle {
            reported: reported.to_string(),
            tag: tag.clone(),
            origin,
            locator: locator.to_string(),
        };

        match self.entries.iter_mut().find(|e| e.tag == tag) {
            Some(existing) => {
                if existing.origin == SubtitleOrigin::Auto && origin == SubtitleOrigin::Human {
                    *existing = candidate;
                }
            }
            None => self.entries.push(candidate),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[AvailableSubtitle] {
        &self.entries
    }

    pub fn get(&self, tag: &LanguageTag) -> Option<&AvailableSubtitle> {
        self.entries.iter().find(|e| &e.tag == tag)
    }

    /// Select one track for an ordered preference list.
    ///
    /// For each preference and each of its variants: first an exact
    /// case-insensitive match on the reported tag, then a base-language
    /// match. With no hit at all, the first entry is returned; `None` only
    /// when the set is empty.
    pub fn select(&self, preferences: &[LanguageTag]) -> Option<&AvailableSubtitle> {
        self.select_preferred(preferences)
            .or_else(|| self.entries.first())
    }

    /// Like `select` but without the first-entry fallback
    pub fn select_preferred(&self, preferences: &[LanguageTag]) -> Option<&AvailableSubtitle> {
        for preference in preferences {
            for variant in preference.variants() {
                if let Some(hit) = self
                    .entries
                    .iter()
                    .find(|e| e.reported.to_lowercase() == variant)
                {
                    return Some(hit);
                }
                if let Some(hit) = self.entries.iter().find(|e| e.tag.language() == variant) {
                    return Some(hit);
                }
            }
        }
        None
    }
}

// =========================================================================
// Subtitle file names: `<index>. <Title>.<lang>.srt`
// =========================================================================

/// Metadata recovered from a subtitle file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleFileInfo {
    pub file_name: String,
    pub index: Option<usize>,
    pub title: String,
    pub language: Option<LanguageTag>,
}

impl SubtitleFileInfo {
    pub fn parse(file_name: &str) -> Self {
        let stem = Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let language = FILENAME_LANGUAGE_REGEX
            .captures(&stem)
            .and_then(|caps| caps.get(1))
            .map(|m| LanguageTag::parse(m.as_str()));

        let index = FILENAME_INDEX_REGEX
            .captures(&stem)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<usize>().ok());

        let without_index = FILENAME_INDEX_REGEX.replace(&stem, "");
        let title = FILENAME_LANGUAGE_REGEX.replace(&without_index, "");

        Self {
            file_name: file_name.to_string(),
            index,
            title: title.trim().to_string(),
            language,
        }
    }

    /// Language key used for grouping: unlabelled files count as `und`
    pub fn language_or_undetermined(&self) -> LanguageTag {
        self.language.clone().unwrap_or_else(LanguageTag::undetermined)
    }
}

/// Group subtitle files by video index. Files without an index are skipped.
pub fn group_subtitles_by_video<S: AsRef<str>>(files: &[S]) -> BTreeMap<usize, AvailableSubtitleSet> {
    let mut groups: BTreeMap<usize, AvailableSubtitleSet> = BTreeMap::new();
    for file in files {
        let info = SubtitleFileInfo::parse(file.as_ref());
        let Some(index) = info.index else {
            continue;
        };
        let tag = info.language_or_undetermined();
        let origin = if tag.is_undetermined() {
            SubtitleOrigin::Auto
        } else {
            SubtitleOrigin::Human
        };
        groups
            .entry(index)
            .or_default()
            .insert(&tag.to_string(), origin, &info.file_name);
    }
    groups
}

/// Count of videos per available language
pub fn available_languages<S: AsRef<str>>(files: &[S]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for set in group_subtitles_by_video(files).values() {
        for entry in set.entries() {
            *counts.entry(entry.tag.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

/// One chosen subtitle per video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistSelection {
    pub video_index: usize,
    pub language: LanguageTag,
    pub file_name: String,
    pub title: String,
}

/// Pick one subtitle file per video, ordered by video index
pub fn select_subtitles_for_playlist<S: AsRef<str>>(
    files: &[S],
    preferences: &[LanguageTag],
) -> Vec<PlaylistSelection> {
    group_subtitles_by_video(files)
        .into_iter()
        .filter_map(|(video_index, set)| {
            set.select(preferences).map(|chosen| PlaylistSelection {
                video_index,
                language: chosen.tag.clone(),
                file_name: chosen.locator.clone(),
                title: SubtitleFileInfo::parse(&chosen.locator).title,
            })
        })
        .collect()
}
