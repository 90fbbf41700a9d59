use std::ops::Index;

use crate::types::{ColumnDescription, SqlValue};

/// A row as a driver hands it back, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRow {
    /// Ordered name/value pairs.
    Named(Vec<(String, SqlValue)>),
    /// Values only, in column order.
    Positional(Vec<SqlValue>),
}

impl RawRow {
    pub fn len(&self) -> usize {
        match self {
            RawRow::Named(pairs) => pairs.len(),
            RawRow::Positional(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Normalizes this row into a tuple following `columns`.
    ///
    /// Named rows are matched to the descriptors by name; a pair whose name
    /// is absent from the row yields `Null`. Positional rows keep their order.
    pub fn normalize(self, columns: &[ColumnDescription]) -> Row {
        match self {
            RawRow::Positional(values) => Row::new(values),
            RawRow::Named(pairs) => {
                let in_order = pairs.len() == columns.len()
                    && pairs
                        .iter()
                        .zip(columns)
                        .all(|((name, _), col)| *name == col.name);
                if in_order || columns.is_empty() {
                    return Row::new(pairs.into_iter().map(|(_, v)| v).collect());
                }
                let mut pairs: Vec<Option<(String, SqlValue)>> =
                    pairs.into_iter().map(Some).collect();
                let values = columns
                    .iter()
                    .map(|col| {
                        pairs
                            .iter_mut()
                            .find(|p| matches!(p, Some((name, _)) if *name == col.name))
                            .and_then(Option::take)
                            .map(|(_, v)| v)
                            .unwrap_or(SqlValue::Null)
                    })
                    .collect();
                Row::new(values)
            }
        }
    }
}

/// Driver-agnostic raw result from a statement execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawQueryResult {
    /// Column metadata reported by the driver; may be empty even when rows exist.
    pub columns: Vec<ColumnDescription>,
    pub rows: Vec<RawRow>,
    /// Affected-row count for statements that return no rows.
    pub rows_affected: Option<u64>,
}

impl RawQueryResult {
    pub fn new(columns: Vec<ColumnDescription>, rows: Vec<RawRow>) -> Self {
        Self {
            columns,
            rows,
            rows_affected: None,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// A result for a statement that returned no rows but touched `count` of them.
    pub fn affected(count: u64) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            rows_affected: Some(count),
        }
    }

    /// Whether the statement produced a result set, as opposed to a command tag.
    pub fn returns_rows(&self) -> bool {
        !self.columns.is_empty() || !self.rows.is_empty()
    }
}

/// Works out column descriptors for a result.
///
/// Driver metadata wins. Otherwise names come from the first row when it is
/// named, or are synthesized as `column_N` when it is positional. A result with
/// neither metadata nor rows has no description.
pub fn describe(columns: &[ColumnDescription], rows: &[RawRow]) -> Option<Vec<ColumnDescription>> {
    if !columns.is_empty() {
        return Some(columns.to_vec());
    }
    match rows.first()? {
        RawRow::Named(pairs) => Some(
            pairs
                .iter()
                .map(|(name, _)| ColumnDescription::untyped(name.clone()))
                .collect(),
        ),
        RawRow::Positional(values) => Some(ColumnDescription::synthesized(values.len())),
    }
}

/// A fetched row: a fixed-order tuple of values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self { values }
    }

    /// Gets a value by position.
    pub fn get(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }

    /// Returns the number of values in this row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if this row has no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Index<usize> for Row {
    type Output = SqlValue;

    fn index(&self, index: usize) -> &SqlValue {
        &self.values[index]
    }
}

impl From<Vec<SqlValue>> for Row {
    fn from(values: Vec<SqlValue>) -> Self {
        Self::new(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<ColumnDescription> {
        names.iter().map(|n| ColumnDescription::untyped(*n)).collect()
    }

    #[test]
    fn test_named_row_follows_descriptor_order() {
        let raw = RawRow::Named(vec![
            ("name".to_string(), SqlValue::from("Alice")),
            ("id".to_string(), SqlValue::from(1)),
        ]);
        let row = raw.normalize(&cols(&["id", "name"]));
        assert_eq!(row.values(), &[SqlValue::Int32(1), SqlValue::from("Alice")]);
    }

    #[test]
    fn test_named_row_missing_column_is_null() {
        let raw = RawRow::Named(vec![("id".to_string(), SqlValue::from(7))]);
        let row = raw.normalize(&cols(&["id", "extra"]));
        assert_eq!(row.values(), &[SqlValue::Int32(7), SqlValue::Null]);
    }

    #[test]
    fn test_positional_row_kept_as_is() {
        let raw = RawRow::Positional(vec![SqlValue::from("x"), SqlValue::Null]);
        let row = raw.normalize(&cols(&["a", "b"]));
        assert_eq!(row.len(), 2);
        assert_eq!(row[0], SqlValue::from("x"));
        assert!(row[1].is_null());
    }

    #[test]
    fn test_describe_prefers_driver_metadata() {
        let columns = vec![ColumnDescription::new("id", Some(23))];
        let rows = vec![RawRow::Positional(vec![SqlValue::from(1)])];
        assert_eq!(describe(&columns, &rows), Some(columns.clone()));
    }

    #[test]
    fn test_describe_from_named_first_row() {
        let rows = vec![RawRow::Named(vec![
            ("a".to_string(), SqlValue::Null),
            ("b".to_string(), SqlValue::Null),
        ])];
        assert_eq!(describe(&[], &rows), Some(cols(&["a", "b"])));
    }

    #[test]
    fn test_describe_synthesizes_positional_names() {
        let rows = vec![RawRow::Positional(vec![SqlValue::Null, SqlValue::Null])];
        assert_eq!(describe(&[], &rows), Some(cols(&["column_0", "column_1"])));
    }

    #[test]
    fn test_describe_nothing() {
        assert_eq!(describe(&[], &[]), None);
    }
}
