//! SQLite target writer implementation.
//!
//! Implements the `TargetWriter` trait for writing to SQLite database files.
//! The destination file is created when missing. All batches of a job go
//! through one `sqlx` transaction on the pool's single connection.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::query::Query;
use sqlx::{Row, Transaction};
use tracing::{debug, info};

use crate::core::schema::Table;
use crate::core::traits::{SqlDialect, TargetWriter, WriteTransaction};
use crate::core::value::{Batch, SqlValue};
use crate::dialect::Dialect;
use crate::error::{CopyError, Result};

use super::dialect::SqliteDialect;

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite target writer implementation.
pub struct SqliteWriter {
    pool: SqlitePool,
    dialect: SqliteDialect,
}

impl SqliteWriter {
    /// Open (creating if needed) a SQLite database file as the copy destination.
    pub async fn connect(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| CopyError::connection("destination", format!("{}: {}", path, e)))?;

        // Test connection
        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| CopyError::connection("destination", format!("{}: {}", path, e)))?;

        info!("Connected to SQLite destination: {}", path);

        Ok(Self {
            pool,
            dialect: SqliteDialect::new(),
        })
    }
}

#[async_trait]
impl TargetWriter for SqliteWriter {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        // SQLite table names are case-insensitive, so the lookup must be too.
        let row = sqlx::query(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CopyError::schema(table, e))?;

        let count: i64 = row.try_get(0).map_err(|e| CopyError::schema(table, e))?;
        Ok(count > 0)
    }

    async fn create_table(&self, table: &Table) -> Result<()> {
        let ddl = self.dialect.build_create_table(table);
        debug!("Creating table {}: {}", table.name, ddl);

        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(|e| CopyError::schema(&table.name, e))?;

        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn WriteTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CopyError::pool(e, "beginning SQLite transaction"))?;

        Ok(Box::new(SqliteWriteTx {
            tx,
            dialect: self.dialect.clone(),
        }))
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// One open SQLite transaction.
///
/// `sqlx` rolls the transaction back when it is dropped unfinished.
struct SqliteWriteTx {
    tx: Transaction<'static, Sqlite>,
    dialect: SqliteDialect,
}

/// Bind a value with the storage class matching its variant.
fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &'q SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(None::<i64>),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.as_str()),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Bytes(v) => query.bind(v.as_slice()),
        SqlValue::Timestamp(v) => query.bind(*v),
    }
}

#[async_trait]
impl WriteTransaction for SqliteWriteTx {
    async fn insert_batch(
        &mut self,
        table: &str,
        columns: &[String],
        batch: &Batch,
    ) -> Result<u64> {
        if batch.is_empty() || columns.is_empty() {
            return Ok(0);
        }

        if let Some(row) = batch.rows.iter().find(|r| r.len() != columns.len()) {
            let (first, last) = batch.record_range();
            return Err(CopyError::insert(
                table,
                first,
                last,
                format!(
                    "row has {} values but {} columns were named",
                    row.len(),
                    columns.len()
                ),
            ));
        }

        let rows_per_stmt = self.dialect.rows_per_statement(columns.len());
        let mut written = 0u64;

        for chunk in batch.rows.chunks(rows_per_stmt) {
            let sql = self.dialect.build_insert(table, columns, chunk.len());
            let mut query = sqlx::query(&sql);
            for value in chunk.iter().flatten() {
                query = bind_value(query, value);
            }

            let result = query.execute(&mut *self.tx).await?;
            written += result.rows_affected();
        }

        debug!("SQLite: wrote {} rows to {}", written, table);
        Ok(written)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
