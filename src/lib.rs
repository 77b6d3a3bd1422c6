//! tabconv - Convert tabular records between formats
//!
//! Records are decoded once from a source (CSV, JSON, XML, or a SQLite/MySQL
//! table) into an in-memory [`RecordSet`], then encoded into any target.

pub mod codec;
pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod store;

pub use config::Config;
pub use convert::Converter;
pub use error::{ConvertError, Result};
pub use model::{CellValue, Record, RecordSet};
