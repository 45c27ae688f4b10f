/*!
 * Tests for configuration loading and overrides
 */

use anyhow::Result;
use std::str::FromStr;
use playscribe::app_config::{Config, TranslationProvider, WireFormat};
use crate::common;

/// Test that a missing config file is created with defaults
#[test]
fn test_loadOrCreate_withMissingFile_shouldCreateDefaultConfig() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = dir.path().join("conf.json");

    let config = Config::load_or_create(&path)?;

    assert!(path.exists());
    assert!(config.validate().is_ok());
    assert!(config.pipeline.enable_checkpoint);
    Ok(())
}

/// Test that a partial config keeps the given values and fills the rest
#[test]
fn test_loadOrCreate_withPartialFile_shouldMergeDefaults() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        dir.path(),
        "conf.json",
        r#"{"translation": {"provider": "anthropic", "common": {"batch_size": 5, "wire_format": "tabular"}}}"#,
    )?;

    let config = Config::load_or_create(&path)?;

    assert_eq!(config.translation.provider, TranslationProvider::Anthropic);
    assert_eq!(config.translation.common.batch_size, 5);
    assert_eq!(config.translation.common.wire_format, WireFormat::Tabular);
    assert!(config.translation.common.max_attempts >= 1);
    Ok(())
}

/// Test that an invalid JSON file is an error, not a silent default
#[test]
fn test_loadOrCreate_withInvalidJson_shouldFail() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = common::create_test_file(dir.path(), "conf.json", "{ nope")?;

    assert!(Config::load_or_create(&path).is_err());
    Ok(())
}

/// Test that CLI-supplied keys never override configured ones
#[test]
fn test_setApiKeyIfEmpty_shouldOnlyFillBlanks() {
    let mut config = Config::default();
    config.translation.set_api_key_if_empty(TranslationProvider::OpenAI, "from-env");
    assert_eq!(config.translation.get_api_key(), "from-env");

    config.translation.set_api_key_if_empty(TranslationProvider::OpenAI, "other");
    assert_eq!(config.translation.get_api_key(), "from-env");
    assert!(config.validate_remote().is_ok());
}

/// Test that a missing key fails remote validation
#[test]
fn test_validateRemote_withoutKey_shouldFail() {
    let config = Config::default();
    let err = config.validate_remote().unwrap_err();
    assert!(err.to_string().contains("OPENAI_API_KEY"));
}

/// Test that format and provider names parse case-insensitively
#[test]
fn test_fromStr_shouldParseNamesAndAliases() {
    assert_eq!(WireFormat::from_str("CSV").unwrap(), WireFormat::Tabular);
    assert_eq!(WireFormat::from_str("json").unwrap(), WireFormat::Json);
    assert_eq!(TranslationProvider::from_str("Anthropic").unwrap(), TranslationProvider::Anthropic);
    assert!(WireFormat::from_str("xml").is_err());
}
