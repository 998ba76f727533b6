//! Query results.
//!
//! A [`ResultTable`] holds a fully buffered result set. Cursor execution
//! hands [`ResultRow`]s to a sink one at a time instead.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::core::value::SqlValue;

/// One result row.
///
/// Rows of the same result set share their column list.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    columns: Arc<[String]>,
    values: Vec<SqlValue<'static>>,
}

impl ResultRow {
    /// Create a row. Missing trailing values read as absent.
    pub fn new(columns: Arc<[String]>, values: Vec<SqlValue<'static>>) -> Self {
        Self { columns, values }
    }

    /// Column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Shared column list.
    pub fn column_list(&self) -> Arc<[String]> {
        Arc::clone(&self.columns)
    }

    /// Values in column order.
    pub fn values(&self) -> &[SqlValue<'static>] {
        &self.values
    }

    /// Position of a column. Exact match wins over a case-insensitive one.
    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(column)))
    }

    /// Value of a column, if the result has it.
    pub fn get(&self, column: &str) -> Option<&SqlValue<'static>> {
        self.index_of(column).and_then(|i| self.values.get(i))
    }

    /// Value at a position.
    pub fn get_index(&self, index: usize) -> Option<&SqlValue<'static>> {
        self.values.get(index)
    }

    /// Take the values out of the row.
    pub fn into_values(self) -> Vec<SqlValue<'static>> {
        self.values
    }

    /// JSON object keyed by column name.
    pub fn to_json(&self) -> JsonValue {
        let map = self
            .columns
            .iter()
            .zip(&self.values)
            .map(|(c, v)| (c.clone(), v.to_json()))
            .collect();
        JsonValue::Object(map)
    }
}

/// Buffered result set.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    columns: Arc<[String]>,
    rows: Vec<ResultRow>,
}

impl ResultTable {
    /// Create an empty table with the given columns.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row of values in column order.
    pub fn push(&mut self, values: Vec<SqlValue<'static>>) {
        self.rows.push(ResultRow::new(Arc::clone(&self.columns), values));
    }

    /// Append a row, builder style.
    #[must_use]
    pub fn with_row(mut self, values: Vec<SqlValue<'static>>) -> Self {
        self.push(values);
        self
    }

    /// Shared column list, for building rows outside the table.
    pub fn column_list(&self) -> Arc<[String]> {
        Arc::clone(&self.columns)
    }

    /// Column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in result order.
    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First column of the first row, if any.
    pub fn first_value(&self) -> Option<&SqlValue<'static>> {
        self.rows.first().and_then(|r| r.get_index(0))
    }
}

impl Default for ResultTable {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}

impl IntoIterator for ResultTable {
    type Item = ResultRow;
    type IntoIter = std::vec::IntoIter<ResultRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
