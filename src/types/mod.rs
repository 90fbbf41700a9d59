mod buffer;
mod column;
mod isolation;
mod row;
mod sql_value;

pub use buffer::{MaterializedRows, ResultBuffer, StreamingRows};
pub use column::{ColumnDescription, DbApiDescription};
pub use isolation::{IsolationLevel, TransactionOptions};
pub use row::{describe, RawQueryResult, RawRow, Row};
pub use sql_value::{NamedParams, SqlValue};
