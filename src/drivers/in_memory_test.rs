use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::classifier;
use crate::error::Result;
use crate::traits::{CursorOutcome, DatabaseDriver, ServerCursor};
use crate::types::{
    ColumnDescription, NamedParams, RawQueryResult, RawRow, SqlValue, TransactionOptions,
};

/// A recorded statement execution for verification.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedQuery {
    pub sql: String,
    pub params: NamedParams,
}

/// Session-level calls made against the driver, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    Begin(TransactionOptions),
    Commit,
    Rollback,
    CursorOpened,
    /// A server-side cursor fetch with the requested batch size.
    CursorFetch(usize),
    CursorClosed,
    Close,
}

/// What the next statement should produce.
#[derive(Debug, Clone)]
enum Response {
    Result(RawQueryResult),
    /// Failure message; classified the same way real driver failures are.
    Error(String),
}

#[derive(Debug, Default)]
struct Failures {
    commit: Option<String>,
    rollback: Option<String>,
    close: Option<String>,
}

/// An in-memory database driver for testing.
///
/// Allows configuring expected responses and failures, and verifying executed
/// statements and transaction calls.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use pgbridge::drivers::{InMemoryTestDriver, InMemoryTestResponseBuilder};
/// use pgbridge::{Connection, SqlValue};
///
/// let driver = Arc::new(
///     InMemoryTestDriver::new().with_response(
///         InMemoryTestResponseBuilder::new()
///             .columns(&["id", "name"])
///             .row(vec![SqlValue::from(1), SqlValue::from("Alice")])
///             .build(),
///     ),
/// );
/// let conn = Connection::with_driver(driver).unwrap();
/// let mut cursor = conn.cursor(false).unwrap();
/// cursor.execute("SELECT id, name FROM users", ()).unwrap();
/// assert_eq!(cursor.rowcount(), 1);
/// ```
pub struct InMemoryTestDriver {
    responses: Mutex<VecDeque<Response>>,
    recorded_queries: Mutex<Vec<RecordedQuery>>,
    events: Arc<Mutex<Vec<DriverEvent>>>,
    failures: Mutex<Failures>,
    default_response: RawQueryResult,
    native_settings: bool,
}

impl InMemoryTestDriver {
    /// Create a new in-memory test driver with no pre-configured responses.
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            recorded_queries: Mutex::new(Vec::new()),
            events: Arc::new(Mutex::new(Vec::new())),
            failures: Mutex::new(Failures::default()),
            default_response: RawQueryResult::empty(),
            native_settings: true,
        }
    }

    /// Add a response to be returned by the next statement.
    /// Responses are returned in FIFO order.
    pub fn with_response(self, response: RawQueryResult) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Response::Result(response));
        self
    }

    /// Add multiple responses to be returned by subsequent statements.
    pub fn with_responses(self, responses: impl IntoIterator<Item = RawQueryResult>) -> Self {
        let mut queue = self.responses.lock().unwrap();
        for response in responses {
            queue.push_back(Response::Result(response));
        }
        drop(queue);
        self
    }

    /// Make the next statement fail with `message`.
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Response::Error(message.into()));
        self
    }

    /// Set a default response to use when no queued responses remain.
    pub fn with_default_response(mut self, response: RawQueryResult) -> Self {
        self.default_response = response;
        self
    }

    /// Whether to advertise native transaction settings. Defaults to true.
    pub fn with_native_settings(mut self, native: bool) -> Self {
        self.native_settings = native;
        self
    }

    pub fn fail_commit(self, message: impl Into<String>) -> Self {
        self.failures.lock().unwrap().commit = Some(message.into());
        self
    }

    pub fn fail_rollback(self, message: impl Into<String>) -> Self {
        self.failures.lock().unwrap().rollback = Some(message.into());
        self
    }

    pub fn fail_close(self, message: impl Into<String>) -> Self {
        self.failures.lock().unwrap().close = Some(message.into());
        self
    }

    /// Get all recorded statements that have been executed.
    pub fn recorded_queries(&self) -> Vec<RecordedQuery> {
        self.recorded_queries.lock().unwrap().clone()
    }

    /// Get the last recorded statement, if any.
    pub fn last_query(&self) -> Option<RecordedQuery> {
        self.recorded_queries.lock().unwrap().last().cloned()
    }

    /// Clear all recorded statements.
    pub fn clear_recorded_queries(&self) {
        self.recorded_queries.lock().unwrap().clear();
    }

    /// Transaction, cursor and session events seen so far.
    pub fn events(&self) -> Vec<DriverEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Number of times the session was released.
    pub fn close_count(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| **e == DriverEvent::Close)
            .count()
    }

    /// Assert that the last statement matches the expected SQL and parameters.
    pub fn assert_last_query(&self, expected_sql: &str, expected_params: &[(&str, SqlValue)]) {
        let last = self.last_query().expect("No queries were recorded");
        let expected: NamedParams = expected_params
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        assert_eq!(
            last.sql, expected_sql,
            "SQL mismatch.\nExpected: {}\nActual: {}",
            expected_sql, last.sql
        );
        assert_eq!(
            last.params, expected,
            "Parameters mismatch.\nExpected: {:?}\nActual: {:?}",
            expected, last.params
        );
    }

    /// Assert that exactly n statements were executed.
    pub fn assert_query_count(&self, expected: usize) {
        let actual = self.recorded_queries.lock().unwrap().len();
        assert_eq!(
            actual, expected,
            "Query count mismatch. Expected: {}, Actual: {}",
            expected, actual
        );
    }

    fn record(&self, sql: &str, params: &NamedParams) {
        self.recorded_queries.lock().unwrap().push(RecordedQuery {
            sql: sql.to_string(),
            params: params.clone(),
        });
    }

    fn next_response(&self) -> Result<RawQueryResult> {
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Response::Result(self.default_response.clone()));
        match response {
            Response::Result(result) => Ok(result),
            Response::Error(message) => Err(classifier::classify(message)),
        }
    }

    fn push_event(&self, event: DriverEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn injected(&self, pick: impl FnOnce(&Failures) -> Option<String>) -> Result<()> {
        let failures = self.failures.lock().unwrap();
        match pick(&*failures) {
            Some(message) => Err(classifier::classify(message)),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryTestDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for InMemoryTestDriver {
    async fn query(&self, sql: &str, params: &NamedParams) -> Result<RawQueryResult> {
        self.record(sql, params);
        self.next_response()
    }

    async fn open_cursor(&self, sql: &str, params: &NamedParams) -> Result<CursorOutcome> {
        self.record(sql, params);
        let result = self.next_response()?;
        if !result.returns_rows() {
            return Ok(CursorOutcome::Completed(result));
        }
        self.push_event(DriverEvent::CursorOpened);
        Ok(CursorOutcome::Declared(Box::new(InMemoryServerCursor {
            columns: result.columns,
            rows: result.rows.into(),
            events: Arc::clone(&self.events),
        })))
    }

    async fn begin(&self, options: &TransactionOptions) -> Result<()> {
        self.push_event(DriverEvent::Begin(*options));
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.push_event(DriverEvent::Commit);
        self.injected(|f| f.commit.clone())
    }

    async fn rollback(&self) -> Result<()> {
        self.push_event(DriverEvent::Rollback);
        self.injected(|f| f.rollback.clone())
    }

    async fn close(&self) -> Result<()> {
        self.push_event(DriverEvent::Close);
        self.injected(|f| f.close.clone())
    }

    fn supports_native_settings(&self) -> bool {
        self.native_settings
    }
}

/// Server-side cursor over rows held by the test driver.
struct InMemoryServerCursor {
    columns: Vec<ColumnDescription>,
    rows: VecDeque<RawRow>,
    events: Arc<Mutex<Vec<DriverEvent>>>,
}

#[async_trait]
impl ServerCursor for InMemoryServerCursor {
    fn columns(&self) -> &[ColumnDescription] {
        &self.columns
    }

    async fn fetch(&mut self, max_rows: usize) -> Result<Vec<RawRow>> {
        self.events
            .lock()
            .unwrap()
            .push(DriverEvent::CursorFetch(max_rows));
        let take = max_rows.min(self.rows.len());
        Ok(self.rows.drain(..take).collect())
    }

    async fn close(&mut self) -> Result<()> {
        self.rows.clear();
        self.events.lock().unwrap().push(DriverEvent::CursorClosed);
        Ok(())
    }
}

/// Builder for creating test responses easily.
pub struct InMemoryTestResponseBuilder {
    columns: Vec<ColumnDescription>,
    rows: Vec<RawRow>,
    rows_affected: Option<u64>,
}

impl InMemoryTestResponseBuilder {
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            rows_affected: None,
        }
    }

    /// Set the column names for the response.
    pub fn columns(mut self, cols: &[&str]) -> Self {
        self.columns = cols
            .iter()
            .map(|name| ColumnDescription::untyped(*name))
            .collect();
        self
    }

    /// Add a column with a type OID.
    pub fn typed_column(mut self, name: &str, type_oid: u32) -> Self {
        self.columns
            .push(ColumnDescription::new(name, Some(type_oid)));
        self
    }

    /// Add a positional row.
    pub fn row(mut self, values: Vec<SqlValue>) -> Self {
        self.rows.push(RawRow::Positional(values));
        self
    }

    /// Add a row of name/value pairs.
    pub fn named_row(mut self, pairs: &[(&str, SqlValue)]) -> Self {
        self.rows.push(RawRow::Named(
            pairs
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        ));
        self
    }

    /// Report `count` affected rows, as a command without a result set does.
    pub fn affected(mut self, count: u64) -> Self {
        self.rows_affected = Some(count);
        self
    }

    /// Build the RawQueryResult.
    pub fn build(self) -> RawQueryResult {
        RawQueryResult {
            columns: self.columns,
            rows: self.rows,
            rows_affected: self.rows_affected,
        }
    }
}

impl Default for InMemoryTestResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}
