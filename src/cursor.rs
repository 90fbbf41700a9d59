use std::sync::Arc;

use crate::connection::{Session, Shared};
use crate::error::Result;
use crate::params::{self, Parameters};
use crate::types::{
    describe, ColumnDescription, DbApiDescription, MaterializedRows, RawQueryResult,
    ResultBuffer, Row, StreamingRows,
};
use crate::traits::CursorOutcome;

/// Executes statements on a connection and hands out their rows.
///
/// A client-buffered cursor reads the whole result when the statement runs.
/// A server-side cursor leaves rows on the server and pulls them in batches
/// as they are fetched; its row count is the number of rows fetched so far.
/// Statements without result columns run to completion on either kind.
pub struct Cursor {
    shared: Arc<Shared>,
    server_side: bool,
    buffer: Option<ResultBuffer>,
    rowcount: i64,
    description: Option<Vec<ColumnDescription>>,
    arraysize: usize,
}

impl Cursor {
    pub(crate) fn new(shared: Arc<Shared>, server_side: bool) -> Self {
        let arraysize = shared.options.get_arraysize();
        Self {
            shared,
            server_side,
            buffer: None,
            rowcount: -1,
            description: None,
            arraysize,
        }
    }

    /// Rows produced or affected by the last statement, or -1 when unknown.
    pub fn rowcount(&self) -> i64 {
        self.rowcount
    }

    /// Column descriptors of the last result, if it had any.
    pub fn description(&self) -> Option<&[ColumnDescription]> {
        self.description.as_deref()
    }

    /// Column descriptors in the seven-field DB-API shape.
    pub fn dbapi_description(&self) -> Option<Vec<DbApiDescription>> {
        self.description
            .as_ref()
            .map(|cols| cols.iter().map(ColumnDescription::to_dbapi).collect())
    }

    pub fn arraysize(&self) -> usize {
        self.arraysize
    }

    pub fn set_arraysize(&mut self, size: usize) {
        self.arraysize = size.max(1);
    }

    pub fn is_server_side(&self) -> bool {
        self.server_side
    }

    /// Runs `statement` with optional positional or named parameters.
    ///
    /// Positional statements use `?` markers; named ones use `%(name)s`.
    /// The connection's transaction is opened first if none is active.
    /// On failure the row count is -1 and there is no description.
    pub fn execute(&mut self, statement: &str, parameters: impl Into<Parameters>) -> Result<()> {
        let bound = params::bind(statement, parameters.into());
        let mut session = self.shared.lock_open()?;

        let previous = self.buffer.take();
        self.rowcount = -1;
        self.description = None;

        tracing::debug!(sql = %bound.sql, server_side = self.server_side, "executing statement");
        let Session {
            transaction,
            settings,
            ..
        } = &mut *session;
        let options = settings.transaction_options();
        let driver = &*self.shared.driver;
        let server_side = self.server_side;

        let executed = self.shared.bridge.run(async {
            if let Some(ResultBuffer::Streaming(mut rows)) = previous {
                if let Err(e) = rows.close().await {
                    tracing::warn!(error = %e, "closing previous server-side cursor failed");
                }
            }
            transaction.ensure_started(driver, &options).await?;
            if server_side {
                driver.open_cursor(&bound.sql, &bound.params).await
            } else {
                Ok(CursorOutcome::Completed(
                    driver.query(&bound.sql, &bound.params).await?,
                ))
            }
        });
        drop(session);

        match executed {
            Ok(CursorOutcome::Declared(cursor)) => {
                let rows = StreamingRows::new(cursor, self.shared.options.get_cursor_batch_size());
                if !rows.columns().is_empty() {
                    self.description = Some(rows.columns().to_vec());
                }
                self.rowcount = 0;
                self.buffer = Some(ResultBuffer::Streaming(rows));
            }
            Ok(CursorOutcome::Completed(result)) => self.load(result),
            Err(e) => {
                tracing::debug!(error = %e, "statement failed");
                return Err(e);
            }
        }
        Ok(())
    }

    fn load(&mut self, result: RawQueryResult) {
        if !result.returns_rows() {
            self.rowcount = result
                .rows_affected
                .map_or(0, |n| i64::try_from(n).unwrap_or(i64::MAX));
            self.buffer = Some(ResultBuffer::Materialized(MaterializedRows::default()));
            return;
        }
        let description = describe(&result.columns, &result.rows);
        let rows = MaterializedRows::from_raw(result.rows, description.as_deref().unwrap_or(&[]));
        self.rowcount = i64::try_from(rows.len()).unwrap_or(i64::MAX);
        self.description = description;
        self.buffer = Some(ResultBuffer::Materialized(rows));
    }

    /// Runs `statement` once per parameter set.
    ///
    /// The row count is the sum of the positive counts of each run; result
    /// rows are discarded. The first failure stops the loop and is returned,
    /// leaving the count at what had accumulated before it.
    pub fn executemany<I, P>(&mut self, statement: &str, seq_of_parameters: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: Into<Parameters>,
    {
        let mut total = 0i64;
        for parameters in seq_of_parameters {
            if let Err(e) = self.execute(statement, parameters) {
                self.rowcount = total;
                self.description = None;
                return Err(e);
            }
            if self.rowcount > 0 {
                total += self.rowcount;
            }
        }
        self.release();
        self.rowcount = total;
        self.description = None;
        Ok(())
    }

    /// Returns the next row, or `None` when there are no more rows or no
    /// statement has run.
    pub fn fetchone(&mut self) -> Result<Option<Row>> {
        let _session = self.shared.lock_open()?;
        match &mut self.buffer {
            None => Ok(None),
            Some(ResultBuffer::Materialized(rows)) => Ok(rows.next_row()),
            Some(ResultBuffer::Streaming(rows)) => {
                let row = self.shared.bridge.run(rows.next_row());
                self.rowcount = i64::try_from(rows.fetched()).unwrap_or(i64::MAX);
                row
            }
        }
    }

    /// Returns up to `size` rows (default: [`arraysize`](Cursor::arraysize)),
    /// fewer once the rows run out.
    pub fn fetchmany(&mut self, size: Option<usize>) -> Result<Vec<Row>> {
        let size = size.unwrap_or(self.arraysize);
        let _session = self.shared.lock_open()?;
        match &mut self.buffer {
            None => Ok(Vec::new()),
            Some(ResultBuffer::Materialized(rows)) => Ok(rows.next_rows(size)),
            Some(ResultBuffer::Streaming(rows)) => {
                let batch = self.shared.bridge.run(rows.next_rows(size));
                self.rowcount = i64::try_from(rows.fetched()).unwrap_or(i64::MAX);
                batch
            }
        }
    }

    /// Returns every remaining row.
    pub fn fetchall(&mut self) -> Result<Vec<Row>> {
        let _session = self.shared.lock_open()?;
        match &mut self.buffer {
            None => Ok(Vec::new()),
            Some(ResultBuffer::Materialized(rows)) => Ok(rows.remaining_rows()),
            Some(ResultBuffer::Streaming(rows)) => {
                let all = self.shared.bridge.run(rows.remaining_rows());
                self.rowcount = i64::try_from(rows.fetched()).unwrap_or(i64::MAX);
                all
            }
        }
    }

    /// Releases the buffered rows and any server-side cursor. Safe to call
    /// more than once, and after the connection was closed.
    pub fn close(&mut self) {
        self.release();
        self.rowcount = -1;
        self.description = None;
    }

    fn release(&mut self) {
        let Some(buffer) = self.buffer.take() else {
            return;
        };
        let ResultBuffer::Streaming(mut rows) = buffer else {
            return;
        };
        // a closed connection already took its server-side cursors with it
        let Ok(_session) = self.shared.lock_open() else {
            return;
        };
        match self.shared.bridge.run(rows.close()) {
            Ok(()) => tracing::debug!("server-side cursor closed"),
            Err(e) => tracing::warn!(error = %e, "closing server-side cursor failed"),
        }
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("server_side", &self.server_side)
            .field("rowcount", &self.rowcount)
            .field("description", &self.description)
            .field("arraysize", &self.arraysize)
            .finish()
    }
}
