//! Data model for the in-memory record set

mod record;
mod schema;

pub use record::{CellValue, Record, RecordSet};
pub use schema::ColumnSchema;
