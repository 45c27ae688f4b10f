/*!
 * Tests for language tags, host preferences and subtitle selection
 */

use playscribe::language_utils::{
    AvailableSubtitleSet, FixedLocale, LanguageTag, SubtitleOrigin, TagFormat, default_preferences,
    language_name, locale_from_vars, parse_language_list, select_subtitles_for_playlist, validate_language_code,
};

fn tags(list: &[&str]) -> Vec<LanguageTag> {
    list.iter().map(|s| LanguageTag::parse(s)).collect()
}

/// Test that every spelling of Brazilian Portuguese normalizes to one tag
#[test]
fn test_parse_withEquivalentSpellings_shouldBeEqual() {
    let canonical = LanguageTag::parse("pt-BR");
    for spelling in ["pt_BR", "pt-br", "PT_br", "ptbr", "pt_BR.UTF-8"] {
        assert_eq!(LanguageTag::parse(spelling), canonical, "spelling {}", spelling);
    }
    assert_eq!(canonical.format(TagFormat::Posix), "pt_BR");
}

/// Test that a base preference matches a regional track
#[test]
fn test_select_withBasePreference_shouldMatchRegionalTrack() {
    let set = AvailableSubtitleSet::from_source_listing(&["pt-BR"], &[] as &[&str]);

    let chosen = set.select(&tags(&["pt"])).unwrap();

    assert_eq!(chosen.reported, "pt-BR");
}

/// Test that a regional preference matches a track reported with another spelling
#[test]
fn test_select_withRegionalPreference_shouldMatchUnderscoreSpelling() {
    let set = AvailableSubtitleSet::from_source_listing(&["en", "pt_BR"], &[] as &[&str]);

    let chosen = set.select(&tags(&["pt-BR", "en"])).unwrap();

    assert_eq!(chosen.reported, "pt_BR");
}

/// Test that a human track beats an automatic one for the same language
#[test]
fn test_select_withHumanAndAutoTrack_shouldPreferHuman() {
    let set = AvailableSubtitleSet::from_source_listing(&["en"], &["en", "de"]);

    let chosen = set.select(&tags(&["en"])).unwrap();

    assert_eq!(chosen.origin, SubtitleOrigin::Human);
    assert_eq!(set.len(), 2);
}

/// Test that an automatic track arriving first is upgraded by a human one
#[test]
fn test_insert_withLaterHumanTrack_shouldReplaceAuto() {
    let mut set = AvailableSubtitleSet::new();
    set.insert("fr", SubtitleOrigin::Auto, "fr-auto");
    set.insert("fr", SubtitleOrigin::Human, "fr-human");
    set.insert("fr", SubtitleOrigin::Auto, "fr-auto-2");

    let chosen = set.select(&tags(&["fr"])).unwrap();

    assert_eq!(chosen.locator, "fr-human");
}

/// Test that preference order wins over listing order
#[test]
fn test_select_shouldHonorPreferenceOrder() {
    let set = AvailableSubtitleSet::from_source_listing(&["en", "es"], &[] as &[&str]);

    assert_eq!(set.select(&tags(&["es", "en"])).unwrap().reported, "es");
    assert_eq!(set.select(&tags(&["en", "es"])).unwrap().reported, "en");
}

/// Test that with no match the first entry is the fallback
#[test]
fn test_select_withNoMatch_shouldFallBackToFirstEntry() {
    let set = AvailableSubtitleSet::from_source_listing(&["ja", "ko"], &[] as &[&str]);

    assert_eq!(set.select(&tags(&["de"])).unwrap().reported, "ja");
    assert!(set.select_preferred(&tags(&["de"])).is_none());
    assert!(AvailableSubtitleSet::new().select(&tags(&["de"])).is_none());
}

/// Test that selection is a pure function of its inputs
#[test]
fn test_select_withSameInputs_shouldBeDeterministic() {
    let set = AvailableSubtitleSet::from_source_listing(&["es", "en-GB"], &["en", "pt"]);
    let prefs = tags(&["en-US", "en", "und"]);

    let first = set.select(&prefs).cloned();
    for _ in 0..10 {
        assert_eq!(set.select(&prefs).cloned(), first);
    }
}

/// Test the default preference list for a Brazilian host
#[test]
fn test_defaultPreferences_withRegionalHost_shouldEndWithFallbacks() {
    let prefs = default_preferences(&FixedLocale("pt_BR.UTF-8".to_string()));

    let rendered: Vec<String> = prefs.iter().map(|t| t.to_string()).collect();
    assert_eq!(rendered, vec!["pt-BR", "pt", "en", "und"]);
}

/// Test the default preference list for an English host has no duplicates
#[test]
fn test_defaultPreferences_withEnglishHost_shouldNotDuplicate() {
    let prefs = default_preferences(&FixedLocale("en".to_string()));

    let rendered: Vec<String> = prefs.iter().map(|t| t.to_string()).collect();
    assert_eq!(rendered, vec!["en", "und"]);
}

/// Test that an undetermined host locale only yields the undetermined tag once, last
#[test]
fn test_defaultPreferences_withUndeterminedHost_shouldListUndOnceAtEnd() {
    for locale in ["und", "whisper"] {
        let prefs = default_preferences(&FixedLocale(locale.to_string()));

        let rendered: Vec<String> = prefs.iter().map(|t| t.to_string()).collect();
        assert_eq!(rendered, vec!["en", "und"]);
    }
}

/// Test that locale lookup skips the C locale
#[test]
fn test_localeFromVars_shouldSkipCLocale() {
    let found = locale_from_vars(|name| match name {
        "LC_ALL" => Some("C".to_string()),
        "LANG" => Some("de_DE.UTF-8".to_string()),
        _ => None,
    });

    assert_eq!(found.as_deref(), Some("de_DE.UTF-8"));
    assert_eq!(locale_from_vars(|_| None), None);
}

/// Test that the playlist selection picks one file per video
#[test]
fn test_selectSubtitlesForPlaylist_shouldPickOnePerVideo() {
    let files = [
        "1. Intro.en.srt",
        "1. Intro.pt-BR.srt",
        "2. Setup.en.srt",
        "3. Outro.whisper.srt",
    ];

    let selections = select_subtitles_for_playlist(&files, &tags(&["pt", "en", "und"]));

    assert_eq!(selections.len(), 3);
    assert_eq!(selections[0].file_name, "1. Intro.pt-BR.srt");
    assert_eq!(selections[1].file_name, "2. Setup.en.srt");
    assert!(selections[2].language.is_undetermined());
}

/// Test list parsing and validation
#[test]
fn test_parseLanguageList_andValidate() {
    let list = parse_language_list(" pt-BR, en ,,es");
    assert_eq!(list.len(), 3);
    assert!(validate_language_code("xx").is_err());
    assert!(validate_language_code("").is_err());
    assert_eq!(language_name("pt-BR").unwrap(), "Portuguese (BR)");
}
