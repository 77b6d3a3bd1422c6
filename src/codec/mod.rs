//! Codecs between record sets and text formats

pub mod csv;
pub mod json;
pub mod xml;

use std::path::Path;

use crate::config::{Config, Format};
use crate::error::{ConvertError, Result};
use crate::model::RecordSet;

pub use self::csv::CsvCodec;
pub use self::json::JsonCodec;
pub use self::xml::XmlCodec;

/// A paired decode/encode unit for one text format
pub trait Codec: Send + Sync {
    /// The format this codec handles
    fn format(&self) -> Format;

    /// Decode text into a record set
    fn decode(&self, text: &str, config: &Config) -> Result<RecordSet>;

    /// Encode a record set into text
    fn encode(&self, records: &RecordSet, config: &Config) -> Result<String>;

    /// Check if this codec can handle the given file extension
    fn supports_extension(&self, ext: &str) -> bool;
}

/// Factory for picking a codec by format, extension or content
pub struct CodecFactory {
    codecs: Vec<Box<dyn Codec>>,
}

impl Default for CodecFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecFactory {
    /// Create a new factory with all text codecs
    pub fn new() -> Self {
        Self {
            codecs: vec![Box::new(CsvCodec), Box::new(JsonCodec), Box::new(XmlCodec)],
        }
    }

    /// Get the codec for a format. Store formats have no codec.
    pub fn for_format(&self, format: Format) -> Option<&dyn Codec> {
        self.codecs
            .iter()
            .find(|c| c.format() == format)
            .map(|c| c.as_ref())
    }

    /// Get a codec for the given file path, falling back to content sniffing
    /// when the extension is unknown.
    pub fn for_path(&self, path: &Path, text: &str) -> Result<&dyn Codec> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        if let Some(codec) = self.codecs.iter().find(|c| c.supports_extension(&ext)) {
            return Ok(codec.as_ref());
        }

        let format = detect_format(text);
        tracing::debug!(path = %path.display(), %format, "format detected from content");
        self.for_format(format).ok_or_else(|| {
            ConvertError::MalformedRow(format!("no codec for {}", path.display()))
        })
    }
}

/// Detect a text format from content (for files without a known extension)
pub fn detect_format(text: &str) -> Format {
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        Format::Json
    } else if trimmed.starts_with('<') {
        Format::Xml
    } else {
        // Default to CSV
        Format::Csv
    }
}
