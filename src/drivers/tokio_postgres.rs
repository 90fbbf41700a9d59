use std::error::Error as StdError;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::{Client, NoTls};
use uuid::Uuid;

use crate::classifier;
use crate::error::{PgBridgeError, Result};
use crate::params::compile_named;
use crate::traits::{CursorOutcome, DatabaseDriver, ServerCursor};
use crate::types::{
    ColumnDescription, NamedParams, RawQueryResult, RawRow, SqlValue, TransactionOptions,
};

/// PostgreSQL driver implementation using tokio-postgres.
///
/// Must be created inside the runtime that will drive it, since the
/// connection task is spawned onto the current runtime.
pub struct TokioPostgresDriver {
    client: Mutex<Option<Arc<Client>>>,
    connection: Mutex<Option<ConnectionTask>>,
    cursor_seq: AtomicU64,
}

impl TokioPostgresDriver {
    /// Connect to a PostgreSQL database.
    pub async fn connect(connection_string: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(connection_string, NoTls)
            .await
            .map_err(|e| PgBridgeError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client: Mutex::new(Some(Arc::new(client))),
            connection: Mutex::new(Some(ConnectionTask::spawn(connection))),
            cursor_seq: AtomicU64::new(0),
        })
    }

    fn client(&self) -> Result<Arc<Client>> {
        lock(&self.client)?
            .clone()
            .ok_or(PgBridgeError::ClosedConnection)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| PgBridgeError::Interface("driver state poisoned".to_string()))
}

/// The spawned task that drives the socket of one session.
struct ConnectionTask(JoinHandle<()>);

impl ConnectionTask {
    fn spawn<F, E>(connection: F) -> Self
    where
        F: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        Self(tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "PostgreSQL connection error");
            }
        }))
    }

    /// Waits until the task is done. A tokio-postgres connection finishes once
    /// every client handle is dropped, after sending Terminate.
    async fn finish(self) {
        if let Err(e) = self.0.await {
            tracing::warn!(error = %e, "PostgreSQL connection task failed");
        }
    }
}

#[async_trait]
impl DatabaseDriver for TokioPostgresDriver {
    async fn query(&self, sql: &str, params: &NamedParams) -> Result<RawQueryResult> {
        let client = self.client()?;
        let (sql, values) = native_statement(sql, params)?;
        let param_refs = as_refs(&values);

        let statement = client.prepare(&sql).await.map_err(driver_error)?;
        let columns = describe_columns(statement.columns());

        if columns.is_empty() {
            let affected = client
                .execute(&statement, &param_refs)
                .await
                .map_err(driver_error)?;
            return Ok(RawQueryResult::affected(affected));
        }

        let rows = client
            .query(&statement, &param_refs)
            .await
            .map_err(driver_error)?;
        let rows = rows.iter().map(row_values).collect::<Result<Vec<_>>>()?;
        Ok(RawQueryResult::new(columns, rows))
    }

    async fn open_cursor(&self, sql: &str, params: &NamedParams) -> Result<CursorOutcome> {
        let client = self.client()?;
        let (sql, values) = native_statement(sql, params)?;
        let param_refs = as_refs(&values);

        let statement = client.prepare(&sql).await.map_err(driver_error)?;
        let columns = describe_columns(statement.columns());

        // DECLARE only accepts row-returning queries
        if columns.is_empty() {
            let affected = client
                .execute(&statement, &param_refs)
                .await
                .map_err(driver_error)?;
            return Ok(CursorOutcome::Completed(RawQueryResult::affected(affected)));
        }

        let name = format!(
            "pgbridge_cursor_{}",
            self.cursor_seq.fetch_add(1, Ordering::Relaxed)
        );
        let declare = format!("DECLARE {name} NO SCROLL CURSOR FOR {sql}");
        client
            .execute(declare.as_str(), &param_refs)
            .await
            .map_err(driver_error)?;
        tracing::debug!(cursor = %name, "server-side cursor declared");

        Ok(CursorOutcome::Declared(Box::new(TokioPostgresCursor {
            client: Arc::downgrade(&client),
            name,
            columns,
            closed: false,
        })))
    }

    async fn begin(&self, options: &TransactionOptions) -> Result<()> {
        self.client()?
            .batch_execute(&options.begin_statement())
            .await
            .map_err(driver_error)
    }

    async fn commit(&self) -> Result<()> {
        self.client()?
            .batch_execute("COMMIT")
            .await
            .map_err(driver_error)
    }

    async fn rollback(&self) -> Result<()> {
        self.client()?
            .batch_execute("ROLLBACK")
            .await
            .map_err(driver_error)
    }

    async fn close(&self) -> Result<()> {
        let client = lock(&self.client)?.take();
        let connection = lock(&self.connection)?.take();
        drop(client);
        if let Some(connection) = connection {
            connection.finish().await;
        }
        Ok(())
    }

    fn supports_native_settings(&self) -> bool {
        true
    }
}

/// A `DECLARE`d cursor read with `FETCH FORWARD`.
struct TokioPostgresCursor {
    client: Weak<Client>,
    name: String,
    columns: Vec<ColumnDescription>,
    closed: bool,
}

#[async_trait]
impl ServerCursor for TokioPostgresCursor {
    fn columns(&self) -> &[ColumnDescription] {
        &self.columns
    }

    async fn fetch(&mut self, max_rows: usize) -> Result<Vec<RawRow>> {
        if self.closed {
            return Ok(Vec::new());
        }
        let client = self
            .client
            .upgrade()
            .ok_or(PgBridgeError::ClosedConnection)?;
        let sql = format!("FETCH FORWARD {max_rows} FROM {}", self.name);
        let rows = client
            .query(sql.as_str(), &[])
            .await
            .map_err(driver_error)?;
        rows.iter().map(row_values).collect()
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        // the session is gone and took the cursor with it
        let Some(client) = self.client.upgrade() else {
            return Ok(());
        };
        client
            .batch_execute(&format!("CLOSE {}", self.name))
            .await
            .map_err(driver_error)
    }
}

/// Turns a tokio-postgres failure into a classified error.
fn driver_error(e: tokio_postgres::Error) -> PgBridgeError {
    if e.is_closed() {
        PgBridgeError::Disconnect(e.to_string())
    } else {
        classifier::classify(e.to_string())
    }
}

/// Statements without parameters are sent verbatim; `%` has no special
/// meaning in them.
fn native_statement(sql: &str, params: &NamedParams) -> Result<(String, Vec<SqlValue>)> {
    if params.is_empty() {
        Ok((sql.to_string(), Vec::new()))
    } else {
        compile_named(sql, params)
    }
}

fn as_refs(values: &[SqlValue]) -> Vec<&(dyn ToSql + Sync)> {
    values.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

fn describe_columns(columns: &[tokio_postgres::Column]) -> Vec<ColumnDescription> {
    columns
        .iter()
        .map(|c| ColumnDescription::new(c.name(), Some(c.type_().oid())))
        .collect()
}

fn row_values(row: &tokio_postgres::Row) -> Result<RawRow> {
    (0..row.len())
        .map(|idx| column_value(row, idx))
        .collect::<Result<Vec<_>>>()
        .map(RawRow::Positional)
}

/// Extracts the value at `idx` according to its column type.
fn column_value(row: &tokio_postgres::Row, idx: usize) -> Result<SqlValue> {
    fn get<'a, T>(row: &'a tokio_postgres::Row, idx: usize) -> Result<SqlValue>
    where
        T: tokio_postgres::types::FromSql<'a> + Into<SqlValue>,
    {
        row.try_get::<_, Option<T>>(idx)
            .map(SqlValue::from)
            .map_err(driver_error)
    }

    let ty = row.columns()[idx].type_();
    match *ty {
        Type::BOOL => get::<bool>(row, idx),
        Type::INT2 => get::<i16>(row, idx),
        Type::INT4 => get::<i32>(row, idx),
        Type::INT8 => get::<i64>(row, idx),
        Type::OID => row
            .try_get::<_, Option<u32>>(idx)
            .map(|v| v.map_or(SqlValue::Null, |v| SqlValue::Int64(i64::from(v))))
            .map_err(driver_error),
        Type::FLOAT4 => get::<f32>(row, idx),
        Type::FLOAT8 => get::<f64>(row, idx),
        Type::BYTEA => get::<Vec<u8>>(row, idx),
        Type::DATE => get::<NaiveDate>(row, idx),
        Type::TIME => get::<NaiveTime>(row, idx),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, idx),
        Type::NUMERIC => get::<Decimal>(row, idx),
        Type::UUID => get::<Uuid>(row, idx),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, idx),
        _ if <String as tokio_postgres::types::FromSql>::accepts(ty) => get::<String>(row, idx),
        _ => Err(PgBridgeError::Statement(format!(
            "unsupported column type {} for column {}",
            ty.name(),
            row.columns()[idx].name()
        ))),
    }
}

/// Binds the inner value only if it can be encoded as `ty`.
fn encode<T: ToSql>(
    value: &T,
    ty: &Type,
    out: &mut BytesMut,
) -> std::result::Result<IsNull, Box<dyn StdError + Sync + Send>> {
    if !T::accepts(ty) {
        return Err(format!(
            "cannot bind {} to a parameter of type {}",
            std::any::type_name::<T>(),
            ty.name()
        )
        .into());
    }
    value.to_sql(ty, out)
}

/// Integers are narrowed or widened to the parameter's width.
fn encode_int(
    value: i64,
    ty: &Type,
    out: &mut BytesMut,
) -> std::result::Result<IsNull, Box<dyn StdError + Sync + Send>> {
    match *ty {
        Type::INT2 => encode(&i16::try_from(value)?, ty, out),
        Type::INT4 => encode(&i32::try_from(value)?, ty, out),
        Type::OID => encode(&u32::try_from(value)?, ty, out),
        Type::FLOAT8 => encode(&(value as f64), ty, out),
        Type::NUMERIC => encode(&Decimal::from(value), ty, out),
        _ => encode(&value, ty, out),
    }
}

/// Floats are converted to the parameter's width, or to an exact decimal.
fn encode_float(
    value: f64,
    ty: &Type,
    out: &mut BytesMut,
) -> std::result::Result<IsNull, Box<dyn StdError + Sync + Send>> {
    match *ty {
        Type::FLOAT4 => encode(&(value as f32), ty, out),
        Type::NUMERIC => encode(&Decimal::try_from(value)?, ty, out),
        _ => encode(&value, ty, out),
    }
}

/// Text is parsed when the parameter has a type that has no text form on
/// the wire.
fn encode_text(
    value: &str,
    ty: &Type,
    out: &mut BytesMut,
) -> std::result::Result<IsNull, Box<dyn StdError + Sync + Send>> {
    match *ty {
        Type::NUMERIC => encode(&value.trim().parse::<Decimal>()?, ty, out),
        Type::UUID => encode(&Uuid::parse_str(value.trim())?, ty, out),
        Type::JSON | Type::JSONB => {
            encode(&serde_json::from_str::<serde_json::Value>(value)?, ty, out)
        }
        _ => encode(&value, ty, out),
    }
}

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn StdError + Sync + Send>> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Bool(v) => encode(v, ty, out),
            SqlValue::Int16(v) => encode_int(i64::from(*v), ty, out),
            SqlValue::Int32(v) => encode_int(i64::from(*v), ty, out),
            SqlValue::Int64(v) => encode_int(*v, ty, out),
            SqlValue::Float32(v) if *ty == Type::FLOAT4 => encode(v, ty, out),
            SqlValue::Float32(v) => encode_float(f64::from(*v), ty, out),
            SqlValue::Float64(v) => encode_float(*v, ty, out),
            SqlValue::Text(v) => encode_text(v, ty, out),
            SqlValue::Bytes(v) => encode(v, ty, out),
            SqlValue::Date(v) => encode(v, ty, out),
            SqlValue::Time(v) => encode(v, ty, out),
            SqlValue::Timestamp(v) => encode(v, ty, out),
            SqlValue::TimestampTz(v) => encode(v, ty, out),
            SqlValue::Numeric(v) => encode(v, ty, out),
            SqlValue::Uuid(v) => encode(v, ty, out),
            SqlValue::Json(v) => encode(v, ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // checked per value in to_sql
        true
    }

    to_sql_checked!();
}
