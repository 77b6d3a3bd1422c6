//! MySQL-backed implementation of [`StoreConnection`].

use mysql::prelude::Queryable;
use mysql::{Conn, OptsBuilder, Params, Statement, Value};

use crate::config::MysqlConfig;
use crate::error::{ConvertError, Result};
use crate::model::{CellValue, Record};

use super::{PreparedStatement, StoreConnection};

/// A single blocking MySQL connection in autocommit mode.
pub struct MysqlStore {
    conn: Conn,
}

impl MysqlStore {
    /// Connect and switch the session to `utf8mb4`.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::Connection`] if the server is unreachable or
    /// rejects the credentials.
    pub fn connect(config: &MysqlConfig) -> Result<Self> {
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(config.host.clone()))
            .tcp_port(config.port)
            .user(Some(config.user.clone()))
            .pass((!config.password.is_empty()).then(|| config.password.clone()))
            .db_name(Some(config.database.clone()));

        let mut conn = Conn::new(opts).map_err(|e| {
            ConvertError::Connection(format!("{}@{}:{}: {}", config.user, config.host, config.port, e))
        })?;
        conn.query_drop("SET NAMES utf8mb4")
            .map_err(|e| ConvertError::Connection(e.to_string()))?;

        tracing::debug!(host = %config.host, database = %config.database, "connected to MySQL");
        Ok(Self { conn })
    }
}

impl StoreConnection for MysqlStore {
    fn execute(&mut self, sql: &str) -> Result<()> {
        self.conn.query_drop(sql).map_err(ConvertError::query)
    }

    fn query(&mut self, sql: &str) -> Result<Vec<Record>> {
        let result = self.conn.query_iter(sql).map_err(ConvertError::query)?;
        let mut records = Vec::new();
        for row in result {
            let row = row.map_err(ConvertError::query)?;
            let names: Vec<String> = row
                .columns_ref()
                .iter()
                .map(|c| c.name_str().into_owned())
                .collect();
            let record: Record = names
                .into_iter()
                .zip(row.unwrap().into_iter().map(mysql_value_to_cell))
                .collect();
            records.push(record);
        }
        Ok(records)
    }

    fn prepare<'a>(&'a mut self, sql: &str) -> Result<Box<dyn PreparedStatement + 'a>> {
        let stmt = self.conn.prep(sql).map_err(ConvertError::query)?;
        Ok(Box::new(MysqlPrepared {
            conn: &mut self.conn,
            stmt,
        }))
    }
}

struct MysqlPrepared<'conn> {
    conn: &'conn mut Conn,
    stmt: Statement,
}

impl PreparedStatement for MysqlPrepared<'_> {
    fn execute(&mut self, params: &[Option<String>]) -> Result<()> {
        let values: Vec<Value> = params.iter().map(|p| Value::from(p.as_deref())).collect();
        self.conn
            .exec_drop(&self.stmt, Params::Positional(values))
            .map_err(ConvertError::query)
    }
}

/// Every stored value is read back as text.
fn mysql_value_to_cell(value: Value) -> CellValue {
    let text = match value {
        Value::NULL => return CellValue::Null,
        Value::Bytes(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Double(d) => d.to_string(),
        Value::Date(y, m, d, 0, 0, 0, 0) => format!("{:04}-{:02}-{:02}", y, m, d),
        Value::Date(y, m, d, h, i, s, 0) => {
            format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", y, m, d, h, i, s)
        }
        Value::Date(y, m, d, h, i, s, us) => {
            format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06}", y, m, d, h, i, s, us)
        }
        Value::Time(negative, days, h, i, s, us) => {
            let sign = if negative { "-" } else { "" };
            let hours = u32::from(h) + days * 24;
            if us == 0 {
                format!("{}{:02}:{:02}:{:02}", sign, hours, i, s)
            } else {
                format!("{}{:02}:{:02}:{:02}.{:06}", sign, hours, i, s, us)
            }
        }
    };
    CellValue::Text(text)
}
