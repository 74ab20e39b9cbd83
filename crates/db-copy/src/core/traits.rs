//! Core traits for dialect-agnostic table copying.
//!
//! This module defines the capability interfaces the copy engine consumes:
//!
//! - [`SourceReader`]: Introspects and streams rows from the source database
//! - [`TargetWriter`]: Checks, creates and opens write transactions on the destination
//! - [`WriteTransaction`]: One destination transaction receiving batches
//! - [`SqlDialect`]: SQL syntax strategy for each database engine
//! - [`TypeMapper`]: Maps native types between source and target dialects
//!
//! Each dialect implements these once; the engine is selected by
//! [`Dialect`](crate::dialect::Dialect) at resolution time and never branches
//! on the dialect itself.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

use crate::dialect::Dialect;
use crate::error::Result;

use super::schema::{Column, Table};
use super::value::Batch;

/// Read schema and rows from a source database.
///
/// # Streaming
///
/// [`read_table`](SourceReader::read_table) returns a channel receiver fed by
/// a background task. The channel holds a single batch, so at most one batch
/// is buffered ahead of the consumer.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Introspect a table from the source catalog.
    ///
    /// Columns are returned in ordinal order carrying their native types.
    /// Fails with an introspection error when the table does not exist.
    async fn load_table(&self, table: &str) -> Result<Table>;

    /// Count the rows currently in a table.
    async fn row_count(&self, table: &str) -> Result<u64>;

    /// Start streaming rows from a table in chunks of `batch_size`.
    ///
    /// Rows are projected in the column order of `table`. Every batch but
    /// the last holds exactly `batch_size` rows; an empty table yields no
    /// batches at all.
    fn read_table(&self, table: &Table, batch_size: usize) -> mpsc::Receiver<Result<Batch>>;

    /// Dialect of this endpoint.
    fn dialect(&self) -> Dialect;

    /// Close the connection pool.
    async fn close(&self);
}

/// Write schema and rows to a destination database.
#[async_trait]
pub trait TargetWriter: Send + Sync {
    /// Check whether a table exists.
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Synthesize and execute `CREATE TABLE` for a translated table.
    async fn create_table(&self, table: &Table) -> Result<()>;

    /// Open a transaction that receives every batch of the job.
    async fn begin(&self) -> Result<Box<dyn WriteTransaction>>;

    /// Dialect of this endpoint.
    fn dialect(&self) -> Dialect;

    /// Close the connection pool.
    async fn close(&self);
}

/// An open destination transaction.
///
/// Dropping a transaction that was neither committed nor rolled back
/// discards everything written through it.
#[async_trait]
pub trait WriteTransaction: Send {
    /// Insert one batch of rows, returning the number of rows written.
    ///
    /// `columns` names the destination columns in the same order as the
    /// values of each row.
    async fn insert_batch(&mut self, table: &str, columns: &[String], batch: &Batch)
        -> Result<u64>;

    /// Commit all batches written so far.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Undo all batches written so far.
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// SQL syntax strategy for different database engines.
///
/// Provides dialect-specific SQL generation while keeping the copy engine
/// dialect-agnostic. Both supported dialects share the default
/// `CREATE TABLE` emission path.
pub trait SqlDialect: Send + Sync {
    /// Get the dialect identifier (e.g., "sqlite", "postgres").
    fn name(&self) -> &str;

    /// Quote an identifier (table name, column name).
    fn quote_ident(&self, name: &str) -> String;

    /// Get a parameter placeholder for the given 1-based index.
    ///
    /// - SQLite: `?1`, `?2`, etc.
    /// - PostgreSQL: `$1`, `$2`, etc.
    fn param_placeholder(&self, index: usize) -> String;

    /// Maximum number of bind parameters one statement may carry.
    fn max_bind_params(&self) -> usize;

    /// Build a `CREATE TABLE` statement from translated columns.
    ///
    /// Each column is emitted as `name TYPE`, followed by ` PRIMARY KEY`
    /// when it is the only key column and ` NOT NULL` when it is not
    /// nullable. A composite key is emitted once as a trailing
    /// `PRIMARY KEY (a, b)` clause instead.
    fn build_create_table(&self, table: &Table) -> String {
        let composite = table.has_composite_pk();

        let mut defs: Vec<String> = table
            .columns
            .iter()
            .map(|col| {
                let mut def = format!("{} {}", self.quote_ident(&col.name), col.data_type);
                if col.is_primary_key && !composite {
                    def.push_str(" PRIMARY KEY");
                }
                if !col.is_nullable {
                    def.push_str(" NOT NULL");
                }
                def
            })
            .collect();

        if composite {
            let keys: Vec<String> = table
                .primary_key
                .iter()
                .map(|k| self.quote_ident(k))
                .collect();
            defs.push(format!("PRIMARY KEY ({})", keys.join(", ")));
        }

        format!(
            "CREATE TABLE {} ({});",
            self.quote_ident(&table.name),
            defs.join(", ")
        )
    }

    /// Build a multi-row `INSERT` for `rows` rows of `columns.len()` values.
    fn build_insert(&self, table: &str, columns: &[String], rows: usize) -> String {
        let cols: Vec<String> = columns.iter().map(|c| self.quote_ident(c)).collect();
        let width = columns.len();

        let mut tuples = Vec::with_capacity(rows);
        for r in 0..rows {
            let params: Vec<String> = (1..=width)
                .map(|c| self.param_placeholder(r * width + c))
                .collect();
            tuples.push(format!("({})", params.join(", ")));
        }

        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.quote_ident(table),
            cols.join(", "),
            tuples.join(", ")
        )
    }

    /// Build the `SELECT` that streams a table in column order.
    fn build_select(&self, table: &Table) -> String {
        let cols: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.quote_ident(&c.name))
            .collect();
        format!(
            "SELECT {} FROM {}",
            cols.join(", "),
            self.quote_ident(&table.name)
        )
    }

    /// Number of rows one multi-row `INSERT` can carry for `width` columns.
    fn rows_per_statement(&self, width: usize) -> usize {
        (self.max_bind_params() / width.max(1)).max(1)
    }
}

/// Maps native types between source and target database dialects.
///
/// Mappers are registered for specific source→target combinations rather
/// than mapping directly between every database pair.
pub trait TypeMapper: Send + Sync {
    /// Get the source dialect.
    fn source_dialect(&self) -> Dialect;

    /// Get the target dialect.
    fn target_dialect(&self) -> Dialect;

    /// Map a source type string to a target type string.
    fn map_type(&self, data_type: &str) -> TypeMapping;

    /// Map a column definition from source to target.
    ///
    /// Only the type changes; name, nullability, key membership and
    /// position are carried over. Lossy mappings are logged.
    fn map_column(&self, col: &Column) -> Column {
        let mapping = self.map_type(&col.data_type);
        if let Some(warning) = &mapping.warning {
            warn!("Column {}: {}", col.name, warning);
        }
        Column {
            data_type: mapping.target_type,
            ..col.clone()
        }
    }
}

/// Result of mapping a type from source to target.
#[derive(Debug, Clone)]
pub struct TypeMapping {
    /// Target type string (e.g., "DOUBLE PRECISION", "BLOB").
    pub target_type: String,
    /// Whether this mapping loses data or precision.
    pub is_lossy: bool,
    /// Warning message for lossy mappings.
    pub warning: Option<String>,
}

impl TypeMapping {
    /// Create a lossless type mapping.
    pub fn lossless(target_type: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            is_lossy: false,
            warning: None,
        }
    }

    /// Create a lossy type mapping with a warning.
    pub fn lossy(target_type: impl Into<String>, warning: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            is_lossy: true,
            warning: Some(warning.into()),
        }
    }
}
