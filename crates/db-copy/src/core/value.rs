//! SQL value types for dialect-agnostic row transfer.
//!
//! Rows travel between databases as ordered vectors of [`SqlValue`], indexed
//! by column position so values can never land in the wrong column.

use chrono::NaiveDateTime;

/// Tagged scalar covering every value either dialect can hand back.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,

    /// Integer of any width.
    Int(i64),

    /// Floating point value.
    Float(f64),

    /// Text data.
    Text(String),

    /// Boolean value.
    Bool(bool),

    /// Binary data.
    Bytes(Vec<u8>),

    /// Timestamp without timezone.
    Timestamp(NaiveDateTime),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Short name of the variant, used in coercion errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Int(_) => "integer",
            SqlValue::Float(_) => "float",
            SqlValue::Text(_) => "text",
            SqlValue::Bool(_) => "boolean",
            SqlValue::Bytes(_) => "bytes",
            SqlValue::Timestamp(_) => "timestamp",
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v as i64)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

/// One row: values in column order.
pub type Row = Vec<SqlValue>;

/// A contiguous chunk of rows for streaming transfer.
///
/// Batches flow through a bounded channel from the reader task to the
/// copy engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Rows in this batch.
    pub rows: Vec<Row>,

    /// Zero-based position of the first row within the whole table read.
    pub first_row: u64,
}

impl Batch {
    /// Create a new batch starting at `first_row`.
    pub fn new(rows: Vec<Row>, first_row: u64) -> Self {
        Self { rows, first_row }
    }

    /// Get the number of rows in this batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Inclusive 1-based record range covered by this batch.
    #[must_use]
    pub fn record_range(&self) -> (u64, u64) {
        let first = self.first_row + 1;
        (first, self.first_row + self.rows.len() as u64)
    }
}
