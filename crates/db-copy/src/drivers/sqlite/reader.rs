//! SQLite source reader implementation.
//!
//! Implements the `SourceReader` trait for reading from SQLite database files.
//! Uses SQLx with a single-connection pool; a source file is never created.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, TypeInfo, ValueRef};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::core::identifier::validate_identifier;
use crate::core::schema::{Column, Table};
use crate::core::traits::{SourceReader, SqlDialect};
use crate::core::value::{Batch, SqlValue};
use crate::dialect::Dialect;
use crate::drivers::common::RowBatcher;
use crate::error::{CopyError, Result};

use super::dialect::SqliteDialect;

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Catalog query: one row per column in declaration order.
const TABLE_INFO_QUERY: &str =
    r#"SELECT name, type, "notnull", pk FROM pragma_table_info(?1) ORDER BY cid"#;

/// SQLite source reader implementation.
pub struct SqliteReader {
    pool: SqlitePool,
    dialect: SqliteDialect,
    path: String,
}

impl SqliteReader {
    /// Open an existing SQLite database file as the copy source.
    pub async fn connect(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| CopyError::connection("source", format!("{}: {}", path, e)))?;

        // Test connection
        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| CopyError::connection("source", format!("{}: {}", path, e)))?;

        info!("Connected to SQLite source: {}", path);

        Ok(Self {
            pool,
            dialect: SqliteDialect::new(),
            path: path.to_string(),
        })
    }

    /// Convert a SQLite row to values by each cell's runtime storage class.
    ///
    /// SQLite is dynamically typed, so the declared column type is only a
    /// hint; the stored value decides the variant.
    fn row_to_values(row: &SqliteRow) -> std::result::Result<Vec<SqlValue>, sqlx::Error> {
        let mut values = Vec::with_capacity(row.len());
        for i in 0..row.len() {
            let raw = row.try_get_raw(i)?;
            if raw.is_null() {
                values.push(SqlValue::Null);
                continue;
            }

            let storage = raw.type_info().name().to_string();
            let value = match storage.as_str() {
                "INTEGER" => SqlValue::Int(row.try_get_unchecked::<i64, _>(i)?),
                "REAL" => SqlValue::Float(row.try_get_unchecked::<f64, _>(i)?),
                "BLOB" => SqlValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(i)?),
                _ => SqlValue::Text(row.try_get_unchecked::<String, _>(i)?),
            };
            values.push(value);
        }
        Ok(values)
    }

    async fn read_table_impl(
        pool: SqlitePool,
        sql: String,
        table: String,
        batch_size: usize,
        tx: mpsc::Sender<Result<Batch>>,
    ) -> Result<()> {
        debug!("Streaming {}: {}", table, sql);

        let mut rows = sqlx::query(&sql).fetch(&pool);
        let mut batcher = RowBatcher::new(batch_size);

        while let Some(row) = rows
            .try_next()
            .await
            .map_err(|e| CopyError::read(&table, e))?
        {
            let values = Self::row_to_values(&row).map_err(|e| CopyError::read(&table, e))?;
            if let Some(batch) = batcher.push(values) {
                if tx.send(Ok(batch)).await.is_err() {
                    // Consumer stopped; nothing left to do.
                    return Ok(());
                }
            }
        }

        if let Some(batch) = batcher.finish() {
            let _ = tx.send(Ok(batch)).await;
        }

        Ok(())
    }
}

#[async_trait]
impl SourceReader for SqliteReader {
    async fn load_table(&self, table: &str) -> Result<Table> {
        let rows: Vec<SqliteRow> = sqlx::query(TABLE_INFO_QUERY)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CopyError::introspection(table, e))?;

        if rows.is_empty() {
            return Err(CopyError::introspection(
                table,
                format!("table does not exist in {}", self.path),
            ));
        }

        let mut columns = Vec::with_capacity(rows.len());
        let mut pk_ranks: Vec<(i64, String)> = Vec::new();

        for (i, row) in rows.iter().enumerate() {
            let name: String = row
                .try_get("name")
                .map_err(|e| CopyError::introspection(table, e))?;
            let data_type: String = row
                .try_get("type")
                .map_err(|e| CopyError::introspection(table, e))?;
            let not_null: i64 = row
                .try_get("notnull")
                .map_err(|e| CopyError::introspection(table, e))?;
            let pk_rank: i64 = row
                .try_get("pk")
                .map_err(|e| CopyError::introspection(table, e))?;

            validate_identifier(&name).map_err(|e| CopyError::introspection(table, e))?;

            if pk_rank > 0 {
                pk_ranks.push((pk_rank, name.clone()));
            }

            columns.push(Column {
                name,
                data_type,
                is_nullable: not_null == 0,
                is_primary_key: pk_rank > 0,
                ordinal_pos: i as i32 + 1,
            });
        }

        pk_ranks.sort_by_key(|(rank, _)| *rank);

        debug!(
            "Loaded {} columns for {} (primary key: {:?})",
            columns.len(),
            table,
            pk_ranks
        );

        Ok(Table {
            name: table.to_string(),
            columns,
            primary_key: pk_ranks.into_iter().map(|(_, name)| name).collect(),
        })
    }

    async fn row_count(&self, table: &str) -> Result<u64> {
        let query = format!("SELECT COUNT(*) FROM {}", self.dialect.quote_ident(table));

        let row: SqliteRow = sqlx::query(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CopyError::read(table, e))?;

        let count: i64 = row.try_get(0).map_err(|e| CopyError::read(table, e))?;
        Ok(count.max(0) as u64)
    }

    fn read_table(&self, table: &Table, batch_size: usize) -> mpsc::Receiver<Result<Batch>> {
        let (tx, rx) = mpsc::channel(1);
        let pool = self.pool.clone();
        let sql = self.dialect.build_select(table);
        let name = table.name.clone();

        tokio::spawn(async move {
            let result = Self::read_table_impl(pool, sql, name, batch_size, tx.clone()).await;
            if let Err(e) = result {
                let _ = tx.send(Err(e)).await;
            }
        });

        rx
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
