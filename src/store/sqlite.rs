//! `SQLite`-backed implementation of [`StoreConnection`].

use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};

use crate::error::{ConvertError, Result};
use crate::model::{CellValue, Record};

use super::{PreparedStatement, StoreConnection};

/// A single `SQLite` connection, opened for one read or one insert run.
///
/// Create with [`SqliteStore::open`] for a file (created if missing),
/// [`SqliteStore::open_existing`] when reading, or [`SqliteStore::in_memory`]
/// for tests.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create a `SQLite` database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::Connection`] if the database can't be opened.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| connection_error(path, e))?;
        Ok(Self { conn })
    }

    /// Open an existing `SQLite` database without creating it.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::Connection`] if the file is missing or is not
    /// a database.
    pub fn open_existing(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_WRITE)
            .map_err(|e| connection_error(path, e))?;
        Ok(Self { conn })
    }

    /// Create an in-memory `SQLite` store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| ConvertError::Connection(e.to_string()))?;
        Ok(Self { conn })
    }
}

fn connection_error(path: &Path, err: rusqlite::Error) -> ConvertError {
    ConvertError::Connection(format!("{}: {}", path.display(), err))
}

impl StoreConnection for SqliteStore {
    fn execute(&mut self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql).map_err(ConvertError::query)
    }

    fn query(&mut self, sql: &str) -> Result<Vec<Record>> {
        let mut stmt = self.conn.prepare(sql).map_err(ConvertError::query)?;
        let names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut rows = stmt.query([]).map_err(ConvertError::query)?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(ConvertError::query)? {
            let mut record = Record::new();
            for (idx, name) in names.iter().enumerate() {
                let value = row.get_ref(idx).map_err(ConvertError::query)?;
                record.insert(name.as_str(), sqlite_value_to_cell(value));
            }
            records.push(record);
        }
        Ok(records)
    }

    fn prepare<'a>(&'a mut self, sql: &str) -> Result<Box<dyn PreparedStatement + 'a>> {
        let stmt = self.conn.prepare(sql).map_err(ConvertError::query)?;
        Ok(Box::new(SqlitePrepared { stmt }))
    }
}

struct SqlitePrepared<'conn> {
    stmt: rusqlite::Statement<'conn>,
}

impl PreparedStatement for SqlitePrepared<'_> {
    fn execute(&mut self, params: &[Option<String>]) -> Result<()> {
        self.stmt
            .execute(rusqlite::params_from_iter(params.iter()))
            .map_err(ConvertError::query)?;
        Ok(())
    }
}

/// Every stored value is read back as text.
fn sqlite_value_to_cell(value: ValueRef<'_>) -> CellValue {
    match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(i) => CellValue::Text(i.to_string()),
        ValueRef::Real(f) => CellValue::Text(f.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            CellValue::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_reads_values_as_text() {
        let mut store = SqliteStore::in_memory().unwrap();
        store
            .execute("CREATE TABLE t (a TEXT, b INTEGER, c REAL, d TEXT); \
                      INSERT INTO t VALUES ('x', 7, 2.5, NULL);")
            .unwrap();

        let rows = store.query("SELECT * FROM t").unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.keys().collect::<Vec<_>>(), ["a", "b", "c", "d"]);
        assert_eq!(row.get("b"), Some(&CellValue::from("7")));
        assert_eq!(row.get("c"), Some(&CellValue::from("2.5")));
        assert_eq!(row.get("d"), Some(&CellValue::Null));
    }

    #[test]
    fn test_prepared_binds_nulls() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.execute("CREATE TABLE t (a TEXT, b TEXT)").unwrap();
        {
            let mut stmt = store.prepare("INSERT INTO t (a, b) VALUES (?, ?)").unwrap();
            stmt.execute(&[Some("1".to_string()), None]).unwrap();
        }
        let rows = store.query("SELECT a, b FROM t").unwrap();
        assert_eq!(rows[0].get("b"), Some(&CellValue::Null));
    }

    #[test]
    fn test_open_existing_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SqliteStore::open_existing(&dir.path().join("nope.db"))
            .err()
            .unwrap();
        assert!(matches!(err, ConvertError::Connection(_)));
    }

    #[test]
    fn test_bad_sql_is_query_error() {
        let mut store = SqliteStore::in_memory().unwrap();
        assert!(matches!(
            store.query("SELECT * FROM missing").unwrap_err(),
            ConvertError::QueryExecution { committed: 0, .. }
        ));
    }
}
