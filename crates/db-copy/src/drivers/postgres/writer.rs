//! PostgreSQL target writer implementation.
//!
//! Implements the `TargetWriter` trait for writing to PostgreSQL databases.
//! Batches are written with multi-row `INSERT` statements inside one
//! explicit transaction held on a dedicated pooled connection. Columns whose
//! type has no binary encoding here are bound as text and cast by the server.

use async_trait::async_trait;
use deadpool_postgres::{Object, Pool};
use tokio_postgres::types::ToSql;
use tracing::{debug, warn};

use crate::core::schema::Table;
use crate::core::traits::{SqlDialect, TargetWriter, WriteTransaction};
use crate::core::value::Batch;
use crate::dialect::Dialect;
use crate::error::{CopyError, Result};

use super::connect_pool;
use super::dialect::PostgresDialect;
use super::params::{binds_natively, coerce, text_cast, PgValue};

/// PostgreSQL target writer implementation.
pub struct PostgresWriter {
    pool: Pool,
    dialect: PostgresDialect,
}

impl PostgresWriter {
    /// Connect to the destination database named by a `postgres://` URI.
    pub async fn connect(uri: &str, max_conns: usize) -> Result<Self> {
        let pool = connect_pool(uri, max_conns, "destination").await?;
        Ok(Self {
            pool,
            dialect: PostgresDialect::new(),
        })
    }
}

#[async_trait]
impl TargetWriter for PostgresWriter {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| CopyError::pool(e, "getting connection for table_exists"))?;

        let row = client
            .query_one(
                "SELECT EXISTS (
                    SELECT 1 FROM information_schema.tables
                    WHERE table_schema = current_schema() AND table_name::text = $1::text
                )",
                &[&table],
            )
            .await
            .map_err(|e| CopyError::schema(table, e))?;

        Ok(row.get(0))
    }

    async fn create_table(&self, table: &Table) -> Result<()> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| CopyError::pool(e, "getting connection for create_table"))?;

        let ddl = self.dialect.build_create_table(table);
        debug!("Creating table {}: {}", table.name, ddl);

        client
            .batch_execute(&ddl)
            .await
            .map_err(|e| CopyError::schema(&table.name, e))?;

        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn WriteTransaction>> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| CopyError::pool(e, "getting connection for transaction"))?;

        client.batch_execute("BEGIN").await?;

        Ok(Box::new(PgWriteTx {
            client: Some(client),
            dialect: self.dialect.clone(),
        }))
    }

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn close(&self) {
        self.pool.close();
    }
}

/// One open PostgreSQL transaction on a pooled connection.
struct PgWriteTx {
    /// `None` once the transaction has been committed or rolled back.
    client: Option<Object>,
    dialect: PostgresDialect,
}

impl PgWriteTx {
    fn client(&self) -> Result<&Object> {
        self.client
            .as_ref()
            .ok_or_else(|| CopyError::pool("transaction already finished", "PgWriteTx"))
    }

    async fn finish(mut self: Box<Self>, sql: &str) -> Result<()> {
        let client = self
            .client
            .take()
            .ok_or_else(|| CopyError::pool("transaction already finished", "PgWriteTx"))?;
        client.batch_execute(sql).await?;
        Ok(())
    }
}

#[async_trait]
impl WriteTransaction for PgWriteTx {
    async fn insert_batch(
        &mut self,
        table: &str,
        columns: &[String],
        batch: &Batch,
    ) -> Result<u64> {
        if batch.is_empty() || columns.is_empty() {
            return Ok(0);
        }

        let (first, last) = batch.record_range();
        let client = self.client()?;
        let rows_per_stmt = self.dialect.rows_per_statement(columns.len());
        let mut written = 0u64;

        for chunk in batch.rows.chunks(rows_per_stmt) {
            let sql = self.dialect.build_insert(table, columns, chunk.len());
            let mut stmt = client.prepare_cached(&sql).await?;

            // The first row's parameters carry each column's inferred type.
            let casts: Vec<Option<String>> = stmt
                .params()
                .iter()
                .take(columns.len())
                .map(|ty| (!binds_natively(ty)).then(|| text_cast(ty)))
                .collect();
            if casts.iter().any(Option::is_some) {
                let sql = self
                    .dialect
                    .build_insert_with_casts(table, columns, chunk.len(), &casts);
                debug!("PostgreSQL: binding as text with casts: {}", sql);
                stmt = client.prepare_cached(&sql).await?;
            }
            let param_types = stmt.params();

            let mut values: Vec<PgValue> = Vec::with_capacity(param_types.len());
            for row in chunk {
                if row.len() != columns.len() {
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
                for (j, value) in row.iter().enumerate() {
                    let ty = &param_types[values.len()];
                    let converted = coerce(value, ty).map_err(|reason| {
                        CopyError::insert(
                            table,
                            first,
                            last,
                            format!("column {}: {}", columns[j], reason),
                        )
                    })?;
                    values.push(converted);
                }
            }

            let params: Vec<&(dyn ToSql + Sync)> =
                values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
            written += client.execute(&stmt, &params).await?;
        }

        debug!("PostgreSQL: wrote {} rows to {}", written, table);
        Ok(written)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for PgWriteTx {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            // Still inside BEGIN: detach the connection from the pool so the
            // server rolls the transaction back when it closes.
            warn!("Discarding unfinished PostgreSQL transaction");
            drop(Object::take(client));
        }
    }
}
