//! pgbridge - a blocking, DB-API style connection and cursor over an
//! asynchronous PostgreSQL driver
//!
//! Every call drives one asynchronous driver operation to completion before
//! returning. Statements run inside an implicit transaction that the caller
//! ends with `commit` or `rollback`.
//!
//! # Example
//! ```ignore
//! use pgbridge::SqlValue;
//!
//! let conn = pgbridge::connect("postgres://localhost/mydb")?;
//! let mut cursor = conn.cursor(false)?;
//!
//! cursor.execute(
//!     "INSERT INTO users (name, age) VALUES (?, ?)",
//!     vec![SqlValue::from("John"), SqlValue::from(42)],
//! )?;
//! conn.commit()?;
//!
//! cursor.execute("SELECT id, name FROM users", ())?;
//! for row in cursor.fetchall()? {
//!     println!("{:?}", row.values());
//! }
//! ```

pub mod bridge;
pub mod classifier;
pub mod config;
pub mod dbapi;
pub mod dialect;
pub mod drivers;
pub mod error;
pub mod params;
pub mod settings;
pub mod traits;
pub mod transaction;
pub mod types;

mod connection;
mod cursor;

// Re-export main types for convenient access
pub use bridge::Bridge;
pub use config::ConnectOptions;
pub use connection::Connection;
pub use cursor::Cursor;
pub use dialect::Dialect;
pub use error::{ErrorKind, PgBridgeError, Result};
pub use params::Parameters;
pub use traits::{CursorOutcome, DatabaseDriver, ServerCursor, SessionSettings};
pub use transaction::TransactionState;
pub use types::{
    ColumnDescription, IsolationLevel, NamedParams, RawQueryResult, RawRow, Row, SqlValue,
    TransactionOptions,
};

/// Connect to PostgreSQL with a connection string passed through to the driver.
pub fn connect(connection_string: &str) -> Result<Connection> {
    Connection::connect(connection_string)
}

/// Connect to PostgreSQL with explicit options.
pub fn connect_with(options: ConnectOptions) -> Result<Connection> {
    Connection::connect_with(options)
}
