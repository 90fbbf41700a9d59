//! Module-level DB-API attributes: interface level, thread safety, parameter
//! style, type constructors and type objects.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{PgBridgeError, Result};
use crate::types::SqlValue;

pub const APILEVEL: &str = "2.0";

/// Threads may share connections; calls on one connection are serialized.
pub const THREADSAFETY: u8 = 2;

/// Named `%(name)s` placeholders. Positional `?` markers are rewritten into
/// this style before execution.
pub const PARAMSTYLE: &str = "pyformat";

pub fn date(year: i32, month: u32, day: u32) -> Result<SqlValue> {
    NaiveDate::from_ymd_opt(year, month, day)
        .map(SqlValue::Date)
        .ok_or_else(|| PgBridgeError::Parameter(format!("invalid date {year}-{month}-{day}")))
}

pub fn time(hour: u32, minute: u32, second: u32) -> Result<SqlValue> {
    NaiveTime::from_hms_opt(hour, minute, second)
        .map(SqlValue::Time)
        .ok_or_else(|| {
            PgBridgeError::Parameter(format!("invalid time {hour}:{minute}:{second}"))
        })
}

pub fn timestamp(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> Result<SqlValue> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .map(SqlValue::Timestamp)
        .ok_or_else(|| {
            PgBridgeError::Parameter(format!(
                "invalid timestamp {year}-{month}-{day} {hour}:{minute}:{second}"
            ))
        })
}

/// Seconds since the Unix epoch, read as UTC.
fn from_ticks(ticks: f64) -> Result<NaiveDateTime> {
    let secs = ticks.floor();
    let nanos = ((ticks - secs) * 1e9).round() as u32;
    DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| PgBridgeError::Parameter(format!("timestamp out of range: {ticks}")))
}

pub fn date_from_ticks(ticks: f64) -> Result<SqlValue> {
    from_ticks(ticks).map(|dt| SqlValue::Date(dt.date()))
}

pub fn time_from_ticks(ticks: f64) -> Result<SqlValue> {
    from_ticks(ticks).map(|dt| SqlValue::Time(dt.time()))
}

pub fn timestamp_from_ticks(ticks: f64) -> Result<SqlValue> {
    from_ticks(ticks).map(SqlValue::Timestamp)
}

pub fn binary(data: impl AsRef<[u8]>) -> SqlValue {
    SqlValue::Bytes(data.as_ref().to_vec())
}

/// A family of PostgreSQL types, compared against a column's type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeObject {
    pub name: &'static str,
    oids: &'static [u32],
}

impl TypeObject {
    pub fn matches(&self, type_oid: u32) -> bool {
        self.oids.contains(&type_oid)
    }
}

// char, name, text, bpchar, varchar
pub const STRING: TypeObject = TypeObject {
    name: "STRING",
    oids: &[18, 19, 25, 1042, 1043],
};

// bytea
pub const BINARY: TypeObject = TypeObject {
    name: "BINARY",
    oids: &[17],
};

// int8, int2, int4, oid, float4, float8, numeric
pub const NUMBER: TypeObject = TypeObject {
    name: "NUMBER",
    oids: &[20, 21, 23, 26, 700, 701, 1700],
};

// date, time, timestamp, timestamptz, interval, timetz
pub const DATETIME: TypeObject = TypeObject {
    name: "DATETIME",
    oids: &[1082, 1083, 1114, 1184, 1186, 1266],
};

// oid
pub const ROWID: TypeObject = TypeObject {
    name: "ROWID",
    oids: &[26],
};
