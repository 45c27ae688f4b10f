/*!
 * Tests for file utility functions
 */

use anyhow::Result;
use std::collections::BTreeMap;
use std::fs;
use playscribe::file_utils::{FileManager, indexed_stem, sanitize_title};
use crate::common;

/// Test that file_exists returns true for existing files
#[test]
fn test_fileExists_withExistingFile_shouldReturnTrue() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let test_file = common::create_test_file(temp_dir.path(), "exists.tmp", "test content")?;

    assert!(FileManager::file_exists(&test_file));
    assert!(!FileManager::file_exists(temp_dir.path().join("missing.tmp")));
    Ok(())
}

/// Test that indexed stems sanitize the title
#[test]
fn test_indexedStem_shouldSanitizeTitle() {
    assert_eq!(indexed_stem(4, "Lesson：Part/2"), "4. Lesson:Part - 2");
    assert_eq!(sanitize_title("  spaced   out  "), "spaced out");
}

/// Test renaming across several directories from an id mapping
#[test]
fn test_renameFromMapping_shouldRenameInEveryDirectory() -> Result<()> {
    let audio = common::create_temp_dir()?;
    let subs = common::create_temp_dir()?;
    common::create_test_file(audio.path(), "abc.mp3", "a")?;
    common::create_test_file(subs.path(), "abc.pt-BR.srt", "s")?;
    common::create_test_file(subs.path(), "zzz.en.srt", "s")?;

    let mut mapping = BTreeMap::new();
    mapping.insert("abc".to_string(), "1. Intro".to_string());
    let missing = audio.path().join("not-there");
    let dirs = vec![audio.path().to_path_buf(), subs.path().to_path_buf(), missing];

    let renamed = FileManager::rename_from_mapping(&dirs, &mapping, false)?;

    assert_eq!(renamed, 2);
    assert!(audio.path().join("1. Intro.mp3").exists());
    assert!(subs.path().join("1. Intro.pt-BR.srt").exists());
    assert!(subs.path().join("zzz.en.srt").exists());
    Ok(())
}

/// Test that a dry run reports renames without touching files
#[test]
fn test_renameFromMapping_withDryRun_shouldNotRename() -> Result<()> {
    let dir = common::create_temp_dir()?;
    common::create_test_file(dir.path(), "abc.mp3", "a")?;
    let mut mapping = BTreeMap::new();
    mapping.insert("abc".to_string(), "1. Intro".to_string());

    let renamed = FileManager::rename_from_mapping(&[dir.path()], &mapping, true)?;

    assert_eq!(renamed, 1);
    assert!(dir.path().join("abc.mp3").exists());
    assert!(!dir.path().join("1. Intro.mp3").exists());
    Ok(())
}

/// Test that atomic writes leave exactly the final file behind
#[test]
fn test_writeToFile_shouldLeaveNoTemporaryFiles() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = dir.path().join("nested").join("out.json");

    FileManager::write_to_file(&path, "{}")?;
    FileManager::write_to_file(&path, "{\"a\":1}")?;

    assert_eq!(fs::read_to_string(&path)?, "{\"a\":1}");
    assert_eq!(fs::read_dir(dir.path().join("nested"))?.count(), 1);
    Ok(())
}
