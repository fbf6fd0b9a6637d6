//! Engine-neutral parameter and result values.

use super::{DbError, DbResult};
use std::sync::Arc;

/// One bound parameter or one result cell.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Builds a `&[SqlValue]` parameter slice from heterogeneous values.
#[macro_export]
macro_rules! sql_params {
    () => {
        &[] as &[$crate::db::SqlValue]
    };
    ($($value:expr),+ $(,)?) => {
        &[$($crate::db::SqlValue::from($value)),+] as &[$crate::db::SqlValue]
    };
}

/// One result row: column names in select order, paired with cell values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl Row {
    /// `values` must line up with `columns` index by index.
    pub fn new(columns: Arc<[String]>, values: Vec<SqlValue>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|name| name.eq_ignore_ascii_case(column))
            .map(|idx| &self.values[idx])
    }

    /// Iterates `(column, value)` pairs in select order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn integer(&self, column: &str) -> DbResult<Option<i64>> {
        match self.cell(column)? {
            SqlValue::Null => Ok(None),
            SqlValue::Integer(value) => Ok(Some(*value)),
            other => Err(mismatch(column, "integer", other)),
        }
    }

    /// Reads a numeric cell as `f64`; integer cells are widened.
    pub fn real(&self, column: &str) -> DbResult<Option<f64>> {
        match self.cell(column)? {
            SqlValue::Null => Ok(None),
            SqlValue::Real(value) => Ok(Some(*value)),
            SqlValue::Integer(value) => Ok(Some(*value as f64)),
            other => Err(mismatch(column, "real", other)),
        }
    }

    pub fn text(&self, column: &str) -> DbResult<Option<String>> {
        match self.cell(column)? {
            SqlValue::Null => Ok(None),
            SqlValue::Text(value) => Ok(Some(value.clone())),
            other => Err(mismatch(column, "text", other)),
        }
    }

    /// Like [`Row::integer`], but a null cell is an error.
    pub fn required_integer(&self, column: &str) -> DbResult<i64> {
        self.integer(column)?
            .ok_or_else(|| DbError::Decode(format!("column `{column}` is null")))
    }

    fn cell(&self, column: &str) -> DbResult<&SqlValue> {
        self.get(column)
            .ok_or_else(|| DbError::Decode(format!("column `{column}` not in result set")))
    }
}

fn mismatch(column: &str, expected: &str, found: &SqlValue) -> DbError {
    DbError::Decode(format!(
        "column `{column}` expected {expected}, found {}",
        found.type_name()
    ))
}

/// What a statement produced: rows for reads, a count for everything else.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutcome {
    Rows(Vec<Row>),
    Affected(u64),
}

impl ExecOutcome {
    pub fn into_rows(self) -> DbResult<Vec<Row>> {
        match self {
            Self::Rows(rows) => Ok(rows),
            Self::Affected(_) => Err(DbError::Decode(
                "statement returned an affected-row count, expected rows".to_string(),
            )),
        }
    }

    pub fn affected_rows(&self) -> Option<u64> {
        match self {
            Self::Rows(_) => None,
            Self::Affected(count) => Some(*count),
        }
    }
}
