//! Error types for conversions

use std::path::PathBuf;

/// Errors produced while decoding, encoding or moving records.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// The operation needs at least one record to derive columns from.
    #[error("record set is empty: {0}")]
    EmptyData(&'static str),

    /// Reading or writing a file failed.
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The relational store could not be reached or rejected the credentials.
    #[error("connection failed: {0}")]
    Connection(String),

    /// A delimited row does not fit its header, or a JSON document is not an
    /// array of objects.
    #[error("malformed row: {0}")]
    MalformedRow(String),

    /// XML text could not be parsed or has no record structure.
    #[error("malformed markup: {0}")]
    MalformedMarkup(String),

    /// A table or column name failed validation before being put into SQL.
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// A record key cannot be written as an XML element name.
    #[error("invalid element name: {0:?}")]
    InvalidElementName(String),

    /// The store rejected a statement. `committed` counts rows already
    /// persisted by the same insert run.
    #[error("query failed ({committed} row(s) committed): {message}")]
    QueryExecution { message: String, committed: usize },
}

impl ConvertError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn query(err: impl std::fmt::Display) -> Self {
        ConvertError::QueryExecution {
            message: err.to_string(),
            committed: 0,
        }
    }

    pub(crate) fn markup(err: impl std::fmt::Display) -> Self {
        ConvertError::MalformedMarkup(err.to_string())
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ConvertError>;
