//! tabconv - Convert tabular records between CSV, JSON, XML, SQLite and MySQL

mod logging;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use tabconv::config::{parse_delimiter, Config, Format, InsertMode, MysqlConfig};
use tabconv::Converter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliFormat {
    Csv,
    Json,
    Xml,
    Sqlite,
    Mysql,
}

impl From<CliFormat> for Format {
    fn from(f: CliFormat) -> Self {
        match f {
            CliFormat::Csv => Format::Csv,
            CliFormat::Json => Format::Json,
            CliFormat::Xml => Format::Xml,
            CliFormat::Sqlite => Format::Sqlite,
            CliFormat::Mysql => Format::Mysql,
        }
    }
}

/// Convert tabular records between CSV, JSON, XML, SQLite and MySQL
#[derive(Parser, Debug)]
#[command(name = "tabconv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input file, or SQLite database when reading from SQLite
    #[arg(required_unless_present = "from")]
    input: Option<PathBuf>,

    /// Source format (default: from the input extension or content)
    #[arg(long, value_enum)]
    from: Option<CliFormat>,

    /// Target format
    #[arg(short, long, value_enum)]
    to: CliFormat,

    /// Output file, or SQLite database when writing to SQLite (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Field delimiter of CSV input
    #[arg(short, long, default_value = ",", value_parser = parse_delimiter)]
    delimiter: u8,

    /// Field delimiter of CSV output
    #[arg(long, default_value = ",", value_parser = parse_delimiter)]
    out_delimiter: u8,

    /// Root element name of XML output
    #[arg(long, default_value = "root")]
    xml_root: String,

    /// Table to read from when the source is a database
    #[arg(long)]
    table: Option<String>,

    /// Table to write to (default: --table, then the input file name)
    #[arg(long)]
    target_table: Option<String>,

    /// MySQL host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// MySQL port
    #[arg(long, default_value_t = 3306)]
    port: u16,

    /// MySQL user
    #[arg(long, default_value = "")]
    user: String,

    /// MySQL password
    #[arg(long, default_value = "")]
    password: String,

    /// MySQL database
    #[arg(long, default_value = "")]
    database: String,

    /// Insert all rows in one transaction instead of committing each row
    #[arg(long)]
    transactional: bool,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Cli {
    fn mysql_config(&self) -> MysqlConfig {
        MysqlConfig::new(&self.host, &self.user, &self.password, &self.database)
            .with_port(self.port)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::new()
        .with_delimiter(cli.delimiter)
        .with_output_delimiter(cli.out_delimiter)
        .with_xml_root(cli.xml_root.as_str())
        .with_insert_mode(if cli.transactional {
            InsertMode::Transactional
        } else {
            InsertMode::RowAtATime
        });

    let converter = load_source(&cli, &config)?.with_config(config);
    let target: Format = cli.to.into();

    match target {
        Format::Sqlite => {
            let db = cli
                .output
                .as_deref()
                .context("--output is required when writing to SQLite")?;
            let table = target_table(&cli, &converter)?;
            let rows = converter
                .to_sqlite(db, &table)
                .with_context(|| format!("Failed to write table {} in {}", table, db.display()))?;
            eprintln!("Inserted {} row(s) into {}", rows, table);
        }
        Format::Mysql => {
            let table = target_table(&cli, &converter)?;
            let rows = converter
                .to_mysql(&cli.mysql_config(), &table)
                .with_context(|| format!("Failed to write MySQL table {}", table))?;
            eprintln!("Inserted {} row(s) into {}", rows, table);
        }
        text_format => {
            let text = converter
                .to_text(text_format)
                .with_context(|| format!("Failed to encode {}", text_format))?;
            match &cli.output {
                Some(path) => std::fs::write(path, &text)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(text.as_bytes())?;
                    stdout.flush()?;
                }
            }
        }
    }

    Ok(())
}

fn load_source(cli: &Cli, config: &Config) -> Result<Converter> {
    match cli.from.map(Format::from) {
        Some(Format::Sqlite) => {
            let db = cli.input.as_deref().context("input database is required")?;
            let table = cli.table.as_deref().context("--table is required for SQLite input")?;
            Converter::from_sqlite(db, table)
                .with_context(|| format!("Failed to read table {} from {}", table, db.display()))
        }
        Some(Format::Mysql) => {
            let table = cli.table.as_deref().context("--table is required for MySQL input")?;
            Converter::from_mysql(&cli.mysql_config(), table)
                .with_context(|| format!("Failed to read MySQL table {}", table))
        }
        Some(Format::Csv) => {
            let path = cli.input.as_deref().context("input file is required")?;
            Converter::from_csv_file(path, config.delimiter)
                .with_context(|| format!("Failed to parse CSV file: {}", path.display()))
        }
        Some(Format::Json) => {
            let path = cli.input.as_deref().context("input file is required")?;
            Converter::from_json_file(path)
                .with_context(|| format!("Failed to parse JSON file: {}", path.display()))
        }
        Some(Format::Xml) => {
            let path = cli.input.as_deref().context("input file is required")?;
            Converter::from_xml_file(path)
                .with_context(|| format!("Failed to parse XML file: {}", path.display()))
        }
        None => {
            let path = cli.input.as_deref().context("input file is required")?;
            Converter::from_file(path, config)
                .with_context(|| format!("Failed to parse file: {}", path.display()))
        }
    }
}

fn target_table(cli: &Cli, converter: &Converter) -> Result<String> {
    if let Some(table) = cli.target_table.as_ref().or(cli.table.as_ref()) {
        return Ok(table.clone());
    }
    match converter.source_name() {
        Some(name) => Ok(name.to_string()),
        None => bail!("--target-table is required"),
    }
}
