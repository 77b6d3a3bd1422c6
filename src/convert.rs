//! Converter facade: one source, any target

use std::path::Path;

use crate::codec::{self, Codec, CodecFactory, JsonCodec, XmlCodec};
use crate::config::{Config, Format, MysqlConfig};
use crate::error::{ConvertError, Result};
use crate::model::RecordSet;
use crate::store::{self, MysqlStore, SqliteStore, StoreConnection};

/// Holds the records decoded from one source and writes them to any target.
///
/// Each `to_*` call derives the column order from the first record again;
/// nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct Converter {
    records: RecordSet,
    source_name: Option<String>,
    config: Config,
}

impl Converter {
    /// Wrap records that are already in memory
    pub fn new(records: RecordSet) -> Self {
        Self {
            records,
            source_name: None,
            config: Config::default(),
        }
    }

    /// Replace the configuration used by the `to_*` methods
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(Self::new(codec::json::decode(text)?))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        Ok(Self::from_json(&read_file(path)?)?.named_after(path))
    }

    pub fn from_csv(text: &str, delimiter: u8) -> Result<Self> {
        let config = Config::default().with_delimiter(delimiter);
        Ok(Self::new(codec::csv::decode(text, delimiter)?).with_config(config))
    }

    pub fn from_csv_file(path: &Path, delimiter: u8) -> Result<Self> {
        Ok(Self::from_csv(&read_file(path)?, delimiter)?.named_after(path))
    }

    pub fn from_xml(text: &str) -> Result<Self> {
        Ok(Self::new(codec::xml::decode(text)?))
    }

    pub fn from_xml_file(path: &Path) -> Result<Self> {
        Ok(Self::from_xml(&read_file(path)?)?.named_after(path))
    }

    /// Read a file, choosing the codec from its extension or content.
    pub fn from_file(path: &Path, config: &Config) -> Result<Self> {
        let text = read_file(path)?;
        let factory = CodecFactory::new();
        let codec = factory.for_path(path, &text)?;
        let records = codec.decode(&text, config)?;
        tracing::info!(path = %path.display(), format = %codec.format(), rows = records.len(), "loaded source");
        Ok(Self::new(records)
            .with_config(config.clone())
            .named_after(path))
    }

    /// Read every row of `table` from an open connection.
    pub fn from_store(conn: &mut dyn StoreConnection, table: &str) -> Result<Self> {
        let records = store::read_table(conn, table)?;
        let mut converter = Self::new(records);
        converter.source_name = Some(table.to_string());
        Ok(converter)
    }

    /// Read every row of `table` from an existing `SQLite` database.
    pub fn from_sqlite(path: &Path, table: &str) -> Result<Self> {
        let mut conn = SqliteStore::open_existing(path)?;
        Self::from_store(&mut conn, table)
    }

    /// Read every row of `table` from a MySQL database.
    pub fn from_mysql(config: &MysqlConfig, table: &str) -> Result<Self> {
        let mut conn = MysqlStore::connect(config)?;
        Self::from_store(&mut conn, table)
    }

    fn named_after(mut self, path: &Path) -> Self {
        self.source_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string);
        self
    }

    /// The decoded records
    pub fn records(&self) -> &RecordSet {
        &self.records
    }

    /// File stem or table name of the source, usable as a default target
    /// table name.
    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    /// Encode as delimited text
    pub fn to_csv(&self, delimiter: u8) -> Result<String> {
        codec::csv::encode(&self.records, delimiter)
    }

    pub fn to_csv_file(&self, path: &Path, delimiter: u8) -> Result<()> {
        write_file(path, &self.to_csv(delimiter)?)
    }

    /// Encode as a pretty-printed JSON array
    pub fn to_json(&self) -> Result<String> {
        JsonCodec.encode(&self.records, &self.config)
    }

    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        write_file(path, &self.to_json()?)
    }

    /// Encode as an indented XML document
    pub fn to_xml(&self) -> Result<String> {
        XmlCodec.encode(&self.records, &self.config)
    }

    pub fn to_xml_file(&self, path: &Path) -> Result<()> {
        write_file(path, &self.to_xml()?)
    }

    /// Encode into any text format, using the configured output delimiter
    /// for CSV.
    pub fn to_text(&self, format: Format) -> Result<String> {
        let factory = CodecFactory::new();
        let codec = factory
            .for_format(format)
            .filter(|_| !format.is_store())
            .ok_or_else(|| {
                ConvertError::MalformedRow(format!(
                    "{} is a relational store, not a text format",
                    format
                ))
            })?;
        codec.encode(&self.records, &self.config)
    }

    /// Create `table` if needed and insert every record. Returns the number
    /// of rows inserted.
    pub fn to_store(&self, conn: &mut dyn StoreConnection, table: &str) -> Result<usize> {
        store::write_table(conn, table, &self.records, self.config.insert_mode)
    }

    /// Write into `table` of a `SQLite` database, created if missing.
    pub fn to_sqlite(&self, path: &Path, table: &str) -> Result<usize> {
        // Fail on bad input before creating the database file
        store::validate_table_name(table)?;
        self.records.columns()?;
        let mut conn = SqliteStore::open(path)?;
        self.to_store(&mut conn, table)
    }

    /// Write into `table` of a MySQL database.
    pub fn to_mysql(&self, config: &MysqlConfig, table: &str) -> Result<usize> {
        store::validate_table_name(table)?;
        self.records.columns()?;
        let mut conn = MysqlStore::connect(config)?;
        self.to_store(&mut conn, table)
    }
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| ConvertError::io(path, e))
}

fn write_file(path: &Path, text: &str) -> Result<()> {
    std::fs::write(path, text).map_err(|e| ConvertError::io(path, e))?;
    tracing::info!(path = %path.display(), bytes = text.len(), "wrote output");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CellValue;

    const PEOPLE_JSON: &str = r#"[{"id":"1","name":"Ann"},{"id":"2","name":"Bo"}]"#;

    #[test]
    fn test_json_to_csv() {
        let converter = Converter::from_json(PEOPLE_JSON).unwrap();
        assert_eq!(converter.to_csv(b',').unwrap(), "id,name\n1,Ann\n2,Bo\n");
    }

    #[test]
    fn test_csv_to_json() {
        let converter = Converter::from_csv("id;name\n1;Ann\n2;Bo\n", b';').unwrap();
        let json: serde_json::Value = serde_json::from_str(&converter.to_json().unwrap()).unwrap();
        let expected: serde_json::Value = serde_json::from_str(PEOPLE_JSON).unwrap();
        assert_eq!(json, expected);
    }

    #[test]
    fn test_json_to_xml_to_records() {
        let converter = Converter::from_json(PEOPLE_JSON).unwrap();
        let xml = converter.to_xml().unwrap();
        let back = Converter::from_xml(&xml).unwrap();
        assert_eq!(back.records(), converter.records());
        assert_eq!(
            back.records().records()[1].get("name"),
            Some(&CellValue::from("Bo"))
        );
    }

    #[test]
    fn test_to_text_rejects_store_format() {
        let converter = Converter::from_json(PEOPLE_JSON).unwrap();
        assert!(converter.to_text(Format::Sqlite).is_err());
        assert_eq!(converter.to_text(Format::Csv).unwrap(), "id,name\n1,Ann\n2,Bo\n");
    }

    #[test]
    fn test_empty_source_fails_on_flat_targets() {
        let converter = Converter::from_json("[]").unwrap();
        assert!(matches!(
            converter.to_csv(b',').unwrap_err(),
            ConvertError::EmptyData(_)
        ));
        let mut conn = SqliteStore::in_memory().unwrap();
        assert!(matches!(
            converter.to_store(&mut conn, "t").unwrap_err(),
            ConvertError::EmptyData(_)
        ));
    }

    #[test]
    fn test_store_source_name() {
        let mut conn = SqliteStore::in_memory().unwrap();
        Converter::from_json(PEOPLE_JSON)
            .unwrap()
            .to_store(&mut conn, "people")
            .unwrap();
        let converter = Converter::from_store(&mut conn, "people").unwrap();
        assert_eq!(converter.source_name(), Some("people"));
        assert_eq!(converter.records().len(), 2);
    }
}
