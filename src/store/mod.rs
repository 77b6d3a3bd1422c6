//! Relational store adapter
//!
//! Reads whole tables into a [`RecordSet`] and writes record sets into
//! tables whose columns are all `TEXT`, named after the first record's keys.
//! Inserts run one parameterized statement per row. In the default
//! [`InsertMode::RowAtATime`] each row autocommits, so a failure part way
//! through leaves the earlier rows in place and the error reports how many.

pub mod ident;
mod mysql;
mod sqlite;

use crate::config::InsertMode;
use crate::error::{ConvertError, Result};
use crate::model::{ColumnSchema, Record, RecordSet};

pub use self::ident::{quote_identifier, validate_column_name, validate_table_name};
pub use self::mysql::MysqlStore;
pub use self::sqlite::SqliteStore;

/// An open relational connection
pub trait StoreConnection {
    /// Execute one or more statements that return no rows
    fn execute(&mut self, sql: &str) -> Result<()>;

    /// Run a query and materialise every row; columns map to record keys
    fn query(&mut self, sql: &str) -> Result<Vec<Record>>;

    /// Prepare a statement with positional `?` parameters
    fn prepare<'a>(&'a mut self, sql: &str) -> Result<Box<dyn PreparedStatement + 'a>>;
}

/// A prepared statement bound to its connection
pub trait PreparedStatement {
    /// Execute once with positional parameters; `None` binds `NULL`
    fn execute(&mut self, params: &[Option<String>]) -> Result<()>;
}

/// Read every row of `table`.
///
/// # Errors
///
/// Returns [`ConvertError::InvalidIdentifier`] before touching the store if
/// the table name fails validation.
pub fn read_table(conn: &mut dyn StoreConnection, table: &str) -> Result<RecordSet> {
    let table = validate_table_name(table)?;
    let sql = format!("SELECT * FROM {}", quote_identifier(table));
    let records = conn.query(&sql)?;
    tracing::debug!(table, rows = records.len(), "read table");
    Ok(RecordSet::new(records))
}

/// Create `table` with one `TEXT` column per schema entry, if it does not
/// exist yet.
pub fn ensure_table(
    conn: &mut dyn StoreConnection,
    table: &str,
    columns: &ColumnSchema,
) -> Result<()> {
    let table = validate_table_name(table)?;
    if columns.is_empty() {
        return Err(ConvertError::EmptyData("first record has no columns"));
    }
    let definitions = columns
        .iter()
        .map(|c| validate_column_name(c).map(|c| format!("{} TEXT", quote_identifier(c))))
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_identifier(table),
        definitions
    );
    conn.execute(&sql)?;
    tracing::info!(table, columns = columns.len(), "table ready");
    Ok(())
}

/// Insert every record into `table`, binding values in `columns` order.
/// Missing keys bind as `NULL`; keys outside `columns` are not written.
///
/// Returns the number of rows inserted.
///
/// # Errors
///
/// On a rejected row returns [`ConvertError::QueryExecution`] whose
/// `committed` field counts the rows that remain stored: every earlier row
/// in [`InsertMode::RowAtATime`], none in [`InsertMode::Transactional`].
pub fn insert_all(
    conn: &mut dyn StoreConnection,
    table: &str,
    columns: &ColumnSchema,
    records: &RecordSet,
    mode: InsertMode,
) -> Result<usize> {
    let table = validate_table_name(table)?;
    if columns.is_empty() {
        return Err(ConvertError::EmptyData("first record has no columns"));
    }
    let quoted = columns
        .iter()
        .map(|c| validate_column_name(c).map(quote_identifier))
        .collect::<Result<Vec<_>>>()?;
    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(table),
        quoted.join(", "),
        placeholders
    );

    let inserted = match mode {
        InsertMode::RowAtATime => insert_rows(conn, &sql, columns, records)?,
        InsertMode::Transactional => {
            conn.execute("BEGIN")?;
            match insert_rows(conn, &sql, columns, records) {
                Ok(n) => {
                    conn.execute("COMMIT")?;
                    n
                }
                Err(err) => {
                    if let Err(rollback) = conn.execute("ROLLBACK") {
                        tracing::error!(error = %rollback, "rollback failed");
                    }
                    return Err(with_committed(err, 0));
                }
            }
        }
    };

    tracing::info!(table, rows = inserted, "inserted rows");
    Ok(inserted)
}

/// Derive columns from the first record, create the table and insert all
/// records.
pub fn write_table(
    conn: &mut dyn StoreConnection,
    table: &str,
    records: &RecordSet,
    mode: InsertMode,
) -> Result<usize> {
    let columns = records.columns()?;
    ensure_table(conn, table, &columns)?;
    insert_all(conn, table, &columns, records, mode)
}

fn insert_rows(
    conn: &mut dyn StoreConnection,
    sql: &str,
    columns: &ColumnSchema,
    records: &RecordSet,
) -> Result<usize> {
    let mut stmt = conn.prepare(sql)?;
    let mut committed = 0;
    for (idx, record) in records.iter().enumerate() {
        let dropped = columns.dropped_keys(record);
        if dropped > 0 {
            tracing::warn!(row = idx + 1, dropped, "record has keys outside the table columns");
        }
        stmt.execute(&columns.values_for(record)).map_err(|err| {
            tracing::error!(row = idx + 1, committed, error = %err, "insert failed");
            with_committed(err, committed)
        })?;
        committed += 1;
    }
    Ok(committed)
}

fn with_committed(err: ConvertError, committed: usize) -> ConvertError {
    match err {
        ConvertError::QueryExecution { message, .. } => {
            ConvertError::QueryExecution { message, committed }
        }
        other => other,
    }
}
