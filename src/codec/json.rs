//! JSON array-of-objects codec

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

use crate::config::{Config, Format};
use crate::error::{ConvertError, Result};
use crate::model::{CellValue, Record, RecordSet};

use super::Codec;

/// Codec for JSON documents holding an array of objects
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn format(&self) -> Format {
        Format::Json
    }

    fn decode(&self, text: &str, _config: &Config) -> Result<RecordSet> {
        decode(text)
    }

    fn encode(&self, records: &RecordSet, config: &Config) -> Result<String> {
        encode_with_indent(records, config.json_indent)
    }

    fn supports_extension(&self, ext: &str) -> bool {
        matches!(ext.to_lowercase().as_str(), "json")
    }
}

/// Decode a JSON array of objects. A single top-level object is read as a
/// one-record set. Keys are kept as written.
pub fn decode(text: &str) -> Result<RecordSet> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ConvertError::MalformedRow(format!("invalid JSON: {}", e)))?;

    // Handle both arrays and single objects
    let items = match value {
        Value::Array(arr) => arr,
        Value::Object(_) => vec![value],
        _ => {
            return Err(ConvertError::MalformedRow(
                "JSON must be an array of objects".to_string(),
            ))
        }
    };

    let records = items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::Object(obj) => Ok(obj
                .into_iter()
                .map(|(k, v)| (k, json_value_to_cell(v)))
                .collect::<Record>()),
            other => Err(ConvertError::MalformedRow(format!(
                "element {} is not an object: {}",
                idx, other
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(rows = records.len(), "decoded JSON document");
    Ok(RecordSet::new(records))
}

/// Encode records as a pretty-printed JSON array with four-space indentation.
/// Non-ASCII text is written as-is.
pub fn encode(records: &RecordSet) -> Result<String> {
    encode_with_indent(records, 4)
}

fn encode_with_indent(records: &RecordSet, indent: usize) -> Result<String> {
    let indent = vec![b' '; indent];
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(&indent));
    records
        .serialize(&mut serializer)
        .map_err(|e| ConvertError::MalformedRow(e.to_string()))?;
    String::from_utf8(out).map_err(|e| ConvertError::MalformedRow(e.to_string()))
}

/// Scalars become text; nested containers stay nested.
fn json_value_to_cell(value: Value) -> CellValue {
    match value {
        Value::Null => CellValue::Null,
        Value::Bool(b) => CellValue::Text(b.to_string()),
        Value::Number(n) => CellValue::Text(n.to_string()),
        Value::String(s) => CellValue::Text(s),
        Value::Array(arr) => CellValue::List(arr.into_iter().map(json_value_to_cell).collect()),
        Value::Object(obj) => CellValue::Record(
            obj.into_iter()
                .map(|(k, v)| (k, json_value_to_cell(v)))
                .collect(),
        ),
    }
}
