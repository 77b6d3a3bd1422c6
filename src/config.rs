//! Configuration handling for tabconv

/// A representation records can be read from or written to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Json,
    Xml,
    Sqlite,
    Mysql,
}

impl Format {
    /// True for formats that live in a relational store
    pub fn is_store(self) -> bool {
        matches!(self, Format::Sqlite | Format::Mysql)
    }
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" | "tsv" => Ok(Format::Csv),
            "json" => Ok(Format::Json),
            "xml" => Ok(Format::Xml),
            "sqlite" | "sqlite3" => Ok(Format::Sqlite),
            "mysql" | "mariadb" => Ok(Format::Mysql),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Format::Csv => "csv",
            Format::Json => "json",
            Format::Xml => "xml",
            Format::Sqlite => "sqlite",
            Format::Mysql => "mysql",
        };
        f.write_str(name)
    }
}

/// How `insert_all` commits rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InsertMode {
    /// One autocommitted statement per row; a failure keeps earlier rows.
    #[default]
    RowAtATime,
    /// Wrap the whole insert run in one transaction, rolled back on failure.
    Transactional,
}

/// Connection settings for a MySQL-family store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MysqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for MysqlConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: String::new(),
            password: String::new(),
            database: String::new(),
        }
    }
}

impl MysqlConfig {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: password.into(),
            database: database.into(),
            ..Default::default()
        }
    }

    /// Set a non-default port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Configuration for conversions
#[derive(Debug, Clone)]
pub struct Config {
    /// Field separator when reading delimited text
    pub delimiter: u8,
    /// Field separator when writing delimited text
    pub output_delimiter: u8,
    /// Commit behaviour of relational inserts
    pub insert_mode: InsertMode,
    /// Name of the synthetic XML root element
    pub xml_root: String,
    /// Spaces per nesting level in XML output
    pub xml_indent: usize,
    /// Spaces per nesting level in JSON output
    pub json_indent: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            delimiter: b',',
            output_delimiter: b',',
            insert_mode: InsertMode::default(),
            xml_root: "root".to_string(),
            xml_indent: 2,
            json_indent: 4,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the input delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set the output delimiter
    pub fn with_output_delimiter(mut self, delimiter: u8) -> Self {
        self.output_delimiter = delimiter;
        self
    }

    /// Set how inserts are committed
    pub fn with_insert_mode(mut self, mode: InsertMode) -> Self {
        self.insert_mode = mode;
        self
    }

    /// Set the XML root element name
    pub fn with_xml_root(mut self, root: impl Into<String>) -> Self {
        self.xml_root = root.into();
        self
    }
}

/// Parse a delimiter argument: one ASCII character, `\t` or `tab`.
pub fn parse_delimiter(s: &str) -> Result<u8, String> {
    match s {
        "\\t" | "tab" | "\t" => Ok(b'\t'),
        _ => {
            let bytes = s.as_bytes();
            if bytes.len() == 1 && bytes[0].is_ascii() && bytes[0] != b'\n' && bytes[0] != b'"' {
                Ok(bytes[0])
            } else {
                Err(format!("Delimiter must be a single ASCII character: {:?}", s))
            }
        }
    }
}
