//! Delimited text codec

use crate::config::{Config, Format};
use crate::error::{ConvertError, Result};
use crate::model::{Record, RecordSet};

use super::Codec;

/// Codec for CSV/TSV text with a configurable delimiter
pub struct CsvCodec;

impl Codec for CsvCodec {
    fn format(&self) -> Format {
        Format::Csv
    }

    fn decode(&self, text: &str, config: &Config) -> Result<RecordSet> {
        decode(text, config.delimiter)
    }

    fn encode(&self, records: &RecordSet, config: &Config) -> Result<String> {
        encode(records, config.output_delimiter)
    }

    fn supports_extension(&self, ext: &str) -> bool {
        matches!(ext.to_lowercase().as_str(), "csv" | "tsv" | "txt")
    }
}

/// Decode delimited text whose first line is the header.
///
/// A row shorter than the header leaves its trailing columns absent. A row
/// longer than the header is rejected with [`ConvertError::MalformedRow`].
pub fn decode(text: &str, delimiter: u8) -> Result<RecordSet> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ConvertError::MalformedRow(format!("failed to read header: {}", e)))?
        .clone();

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result.map_err(|e| ConvertError::MalformedRow(e.to_string()))?;
        // Line where the record starts; quoted fields may span lines
        let line = row.position().map_or(0, |p| p.line());

        if row.len() > headers.len() {
            return Err(ConvertError::MalformedRow(format!(
                "line {} has {} fields but the header has {}",
                line,
                row.len(),
                headers.len()
            )));
        }

        let record: Record = headers.iter().zip(row.iter()).collect();
        records.push(record);
    }

    tracing::debug!(rows = records.len(), columns = headers.len(), "decoded delimited text");
    Ok(RecordSet::new(records))
}

/// Encode records as delimited text: a header line from the first record's
/// keys, then one `\n`-terminated line per record in that column order.
pub fn encode(records: &RecordSet, delimiter: u8) -> Result<String> {
    let schema = records.columns()?;

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(schema.iter()).map_err(csv_write_error)?;

    for record in records {
        let dropped = schema.dropped_keys(record);
        if dropped > 0 {
            tracing::warn!(dropped, "record has keys outside the header; they are not written");
        }
        let values = schema.values_for(record);
        writer
            .write_record(values.iter().map(|v| v.as_deref().unwrap_or("")))
            .map_err(csv_write_error)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ConvertError::io("<memory>", e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| ConvertError::MalformedRow(e.to_string()))
}

fn csv_write_error(err: csv::Error) -> ConvertError {
    match err.into_kind() {
        csv::ErrorKind::Io(e) => ConvertError::io("<memory>", e),
        other => ConvertError::MalformedRow(format!("{:?}", other)),
    }
}
