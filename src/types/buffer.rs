use std::collections::VecDeque;

use crate::error::Result;
use crate::traits::ServerCursor;
use crate::types::{ColumnDescription, RawRow, Row};

/// Rows held by a cursor after a statement ran.
pub enum ResultBuffer {
    /// Every row is already in memory.
    Materialized(MaterializedRows),
    /// Rows stay on the server and are pulled in batches.
    Streaming(StreamingRows),
}

/// A finite sequence of rows with a read position.
#[derive(Debug, Clone, Default)]
pub struct MaterializedRows {
    rows: Vec<Row>,
    position: usize,
}

impl MaterializedRows {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows, position: 0 }
    }

    /// Normalizes raw driver rows against `columns`.
    pub fn from_raw(rows: Vec<RawRow>, columns: &[ColumnDescription]) -> Self {
        Self::new(rows.into_iter().map(|r| r.normalize(columns)).collect())
    }

    pub fn next_row(&mut self) -> Option<Row> {
        let row = self.rows.get(self.position)?.clone();
        self.position += 1;
        Some(row)
    }

    pub fn next_rows(&mut self, size: usize) -> Vec<Row> {
        let end = self.rows.len().min(self.position.saturating_add(size));
        let rows = self.rows[self.position..end].to_vec();
        self.position = end;
        rows
    }

    pub fn remaining_rows(&mut self) -> Vec<Row> {
        self.next_rows(self.remaining())
    }

    pub fn remaining(&self) -> usize {
        self.rows.len() - self.position
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A server-side cursor plus the rows of its current batch.
pub struct StreamingRows {
    cursor: Box<dyn ServerCursor>,
    columns: Vec<ColumnDescription>,
    pending: VecDeque<Row>,
    batch_size: usize,
    exhausted: bool,
    fetched: usize,
}

impl StreamingRows {
    pub fn new(cursor: Box<dyn ServerCursor>, batch_size: usize) -> Self {
        let columns = cursor.columns().to_vec();
        Self {
            cursor,
            columns,
            pending: VecDeque::new(),
            batch_size: batch_size.max(1),
            exhausted: false,
            fetched: 0,
        }
    }

    pub fn columns(&self) -> &[ColumnDescription] {
        &self.columns
    }

    /// Rows handed out so far.
    pub fn fetched(&self) -> usize {
        self.fetched
    }

    async fn fill(&mut self) -> Result<()> {
        if !self.pending.is_empty() || self.exhausted {
            return Ok(());
        }
        let batch = self.cursor.fetch(self.batch_size).await?;
        if batch.len() < self.batch_size {
            self.exhausted = true;
        }
        let columns = &self.columns;
        self.pending
            .extend(batch.into_iter().map(|r| r.normalize(columns)));
        Ok(())
    }

    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        self.fill().await?;
        let row = self.pending.pop_front();
        if row.is_some() {
            self.fetched += 1;
        }
        Ok(row)
    }

    pub async fn next_rows(&mut self, size: usize) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while rows.len() < size {
            match self.next_row().await? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        Ok(rows)
    }

    pub async fn remaining_rows(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Releases the server-side cursor.
    pub async fn close(&mut self) -> Result<()> {
        self.pending.clear();
        self.exhausted = true;
        self.cursor.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SqlValue;

    fn rows(n: i32) -> Vec<Row> {
        (0..n).map(|i| Row::new(vec![SqlValue::Int32(i)])).collect()
    }

    #[test]
    fn test_materialized_fetch_sequence() {
        let mut buf = MaterializedRows::new(rows(5));
        assert_eq!(buf.next_row().unwrap()[0], SqlValue::Int32(0));
        assert_eq!(buf.next_rows(2).len(), 2);
        assert_eq!(buf.remaining(), 2);
        assert_eq!(buf.remaining_rows().len(), 2);
        assert!(buf.next_row().is_none());
        assert!(buf.next_rows(3).is_empty());
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn test_materialized_next_rows_past_end() {
        let mut buf = MaterializedRows::new(rows(2));
        assert_eq!(buf.next_rows(usize::MAX).len(), 2);
        assert_eq!(buf.remaining(), 0);
    }
}
