/*!
 * Wire formats for structured batch translation.
 *
 * Two shapes are supported:
 * - JSON: an array of `{"id", "text"}` objects
 * - Tabular: CSV with the exact header `id,time,text`
 *
 * Requests carry line identifiers and text. The tabular form also carries
 * the timing span for context, but returned timings are never used.
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app_config::WireFormat;
use crate::errors::TranslationError;
use crate::subtitle_processor::SubtitleEntry;

/// Header a tabular response must carry, in this order
pub const TABULAR_HEADER: [&str; 3] = ["id", "time", "text"];

/// One line in a structured exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireItem {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
struct TabularRow<'a> {
    id: &'a str,
    time: &'a str,
    text: &'a str,
}

fn malformed(format: WireFormat, message: impl Into<String>) -> TranslationError {
    TranslationError::MalformedResponse {
        format: format.to_string(),
        message: message.into(),
    }
}

/// Serialize a batch into the request payload
pub fn encode_batch(batch: &[SubtitleEntry], format: WireFormat) -> Result<String, TranslationError> {
    match format {
        WireFormat::Json => {
            let items: Vec<WireItem> = batch
                .iter()
                .map(|e| WireItem {
                    id: e.index.clone(),
                    text: e.text.clone(),
                })
                .collect();
            serde_json::to_string_pretty(&items).map_err(|e| malformed(format, e.to_string()))
        }
        WireFormat::Tabular => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            for entry in batch {
                writer
                    .serialize(TabularRow {
                        id: &entry.index,
                        time: &entry.timing,
                        text: &entry.text,
                    })
                    .map_err(|e| malformed(format, e.to_string()))?;
            }
            let bytes = writer
                .into_inner()
                .map_err(|e| malformed(format, e.to_string()))?;
            String::from_utf8(bytes).map_err(|e| malformed(format, e.to_string()))
        }
    }
}

/// Strip a surrounding markdown fence and a leading `json`/`csv` tag
pub fn strip_code_fences(response: &str) -> String {
    let trimmed = response.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let inner = trimmed.split("```").nth(1).unwrap_or(trimmed);
    let inner = inner
        .strip_prefix("json")
        .or_else(|| inner.strip_prefix("csv"))
        .unwrap_or(inner);
    inner.trim().to_string()
}

/// Parse a model response in the given shape
pub fn decode_response(response: &str, format: WireFormat) -> Result<Vec<WireItem>, TranslationError> {
    let body = strip_code_fences(response);
    if body.is_empty() {
        return Err(malformed(format, "empty response"));
    }
    match format {
        WireFormat::Json => decode_json(&body),
        WireFormat::Tabular => decode_tabular(&body),
    }
}

/// Identifiers may come back as numbers; normalize them to strings
fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn decode_json(body: &str) -> Result<Vec<WireItem>, TranslationError> {
    let format = WireFormat::Json;
    let value: Value = serde_json::from_str(body).map_err(|e| malformed(format, e.to_string()))?;

    // Some models wrap the array in an object such as {"subtitles": [...]}
    let array = match value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .into_iter()
            .find_map(|(_, v)| match v {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .ok_or_else(|| malformed(format, "object without an array of items"))?,
        _ => return Err(malformed(format, "expected an array of items")),
    };

    array
        .iter()
        .enumerate()
        .map(|(position, item)| {
            let id = item
                .get("id")
                .and_then(id_to_string)
                .ok_or_else(|| malformed(format, format!("item {} has no usable id", position)))?;
            let text = item
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed(format, format!("item {} has no text", id)))?;
            Ok(WireItem {
                id,
                text: text.to_string(),
            })
        })
        .collect()
}

fn decode_tabular(body: &str) -> Result<Vec<WireItem>, TranslationError> {
    let format = WireFormat::Tabular;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| malformed(format, e.to_string()))?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    if headers != TABULAR_HEADER {
        let first_line = body.lines().next().unwrap_or_default();
        return Err(malformed(
            format,
            format!("header mismatch, expected id,time,text, got: {}", first_line),
        ));
    }

    let mut items = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| malformed(format, e.to_string()))?;
        let id = record.get(0).unwrap_or_default().trim().to_string();
        let text = record.get(2).unwrap_or_default().to_string();
        items.push(WireItem { id, text });
    }
    Ok(items)
}
