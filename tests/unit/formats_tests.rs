/*!
 * Tests for the structured translation exchange formats
 */

use playscribe::app_config::WireFormat;
use playscribe::errors::TranslationError;
use playscribe::translation::{WireItem, decode_response, encode_batch};
use crate::common;

/// Test that a tabular payload decodes back to the same ids and texts
#[test]
fn test_tabular_encodedPayload_shouldDecodeToSameLines() {
    let track = common::sample_track(3);
    let payload = encode_batch(&track.entries, WireFormat::Tabular).unwrap();

    let items = decode_response(&payload, WireFormat::Tabular).unwrap();

    let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    assert_eq!(items[2].text, "Line number 3");
}

/// Test that the tabular header is matched after trimming and lowercasing
#[test]
fn test_decodeTabular_withUppercaseHeader_shouldAccept() {
    let body = "ID, Time ,TEXT\n1,\"00:00:00,000 --> 00:00:01,000\",Olá\n";

    let items = decode_response(body, WireFormat::Tabular).unwrap();

    assert_eq!(items, vec![WireItem { id: "1".into(), text: "Olá".into() }]);
}

/// Test that a tabular response without the header is rejected
#[test]
fn test_decodeTabular_withoutHeader_shouldBeMalformed() {
    let body = "1,\"00:00:00,000 --> 00:00:01,000\",Hola\n";

    let err = decode_response(body, WireFormat::Tabular).unwrap_err();

    assert!(matches!(err, TranslationError::MalformedResponse { .. }));
    assert!(err.to_string().contains("header mismatch"));
}

/// Test that a fenced JSON answer is accepted
#[test]
fn test_decodeJson_withCodeFence_shouldAccept() {
    let body = "```json\n[{\"id\": \"7\", \"text\": \"Bonjour\"}]\n```";

    let items = decode_response(body, WireFormat::Json).unwrap();

    assert_eq!(items[0].id, "7");
    assert_eq!(items[0].text, "Bonjour");
}

/// Test that prose around the payload is a malformed response
#[test]
fn test_decodeJson_withProse_shouldBeMalformed() {
    let err = decode_response("Sure! Here you go.", WireFormat::Json).unwrap_err();
    assert!(matches!(err, TranslationError::MalformedResponse { .. }));
}

/// Test that empty answers are malformed in both formats
#[test]
fn test_decodeResponse_withEmptyBody_shouldBeMalformed() {
    assert!(decode_response("   ", WireFormat::Json).is_err());
    assert!(decode_response("", WireFormat::Tabular).is_err());
}

/// Test that embedded newlines and quotes survive a tabular exchange
#[test]
fn test_tabular_withMultilineText_shouldPreserveLineBreaks() {
    let mut track = common::sample_track(1);
    track.entries[0].text = "She said \"go\",\nthen left".to_string();
    let payload = encode_batch(&track.entries, WireFormat::Tabular).unwrap();

    let items = decode_response(&payload, WireFormat::Tabular).unwrap();

    assert_eq!(items[0].text, "She said \"go\",\nthen left");
}
