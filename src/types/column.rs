/// Metadata for one result column.
/// Descriptors are positional and follow the order of values in each row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescription {
    pub name: String,
    /// PostgreSQL type OID, when the driver reports it.
    pub type_oid: Option<u32>,
}

/// The seven-field column description of the DB-API:
/// name, type code, display size, internal size, precision, scale, null ok.
/// Only the first two are ever known here.
pub type DbApiDescription = (
    String,
    Option<u32>,
    Option<i32>,
    Option<i32>,
    Option<i32>,
    Option<i32>,
    Option<bool>,
);

impl ColumnDescription {
    pub fn new(name: impl Into<String>, type_oid: Option<u32>) -> Self {
        Self {
            name: name.into(),
            type_oid,
        }
    }

    /// A column with no type information.
    pub fn untyped(name: impl Into<String>) -> Self {
        Self::new(name, None)
    }

    /// Column names for a positional row with no names: `column_0..column_{n-1}`.
    pub fn synthesized(count: usize) -> Vec<Self> {
        (0..count)
            .map(|i| Self::untyped(format!("column_{i}")))
            .collect()
    }

    pub fn to_dbapi(&self) -> DbApiDescription {
        (self.name.clone(), self.type_oid, None, None, None, None, None)
    }
}
