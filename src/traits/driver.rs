use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ColumnDescription, NamedParams, RawQueryResult, RawRow, TransactionOptions};

/// Trait for database driver implementations.
/// Drivers are responsible for:
/// - Converting named parameters to their native binding convention
/// - Preparing and executing statements, converting results to RawQueryResult
/// - Opening server-side cursors
/// - Running transaction control on their session
///
/// Statements arrive in `pyformat` style (`%(name)s`) when parameters are
/// given, and verbatim otherwise.
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Prepare and execute a statement, returning its rows or affected count.
    async fn query(&self, sql: &str, params: &NamedParams) -> Result<RawQueryResult>;

    /// Open a server-side cursor over the statement's result.
    ///
    /// Statements that return no columns have nothing to stream; they run to
    /// completion and come back as [`CursorOutcome::Completed`].
    async fn open_cursor(&self, sql: &str, params: &NamedParams) -> Result<CursorOutcome>;

    async fn begin(&self, options: &TransactionOptions) -> Result<()>;

    async fn commit(&self) -> Result<()>;

    async fn rollback(&self) -> Result<()>;

    /// Release the session.
    async fn close(&self) -> Result<()>;

    /// Whether transaction characteristics can be applied at begin time
    /// without issuing separate statements.
    fn supports_native_settings(&self) -> bool {
        false
    }
}

/// What opening a server-side cursor produced.
pub enum CursorOutcome {
    Declared(Box<dyn ServerCursor>),
    Completed(RawQueryResult),
}

/// A cursor whose rows stay on the server until fetched.
#[async_trait]
pub trait ServerCursor: Send {
    fn columns(&self) -> &[ColumnDescription];

    /// Fetch up to `max_rows` rows. An empty batch means the cursor is exhausted.
    async fn fetch(&mut self, max_rows: usize) -> Result<Vec<RawRow>>;

    async fn close(&mut self) -> Result<()>;
}
