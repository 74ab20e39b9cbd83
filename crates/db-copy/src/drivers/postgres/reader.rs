//! PostgreSQL source reader implementation.
//!
//! Implements the `SourceReader` trait for reading from PostgreSQL databases.
//! Uses deadpool-postgres for connection pooling and streams rows with
//! `query_raw`, so only the batch being assembled is held in memory.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use deadpool_postgres::Pool;
use futures::TryStreamExt;
use tokio::sync::mpsc;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::Row;
use tracing::debug;

use crate::core::identifier::validate_identifier;
use crate::core::schema::{Column, Table};
use crate::core::traits::{SourceReader, SqlDialect};
use crate::core::value::{Batch, SqlValue};
use crate::dialect::Dialect;
use crate::drivers::common::RowBatcher;
use crate::error::{CopyError, Result};

use super::connect_pool;
use super::dialect::PostgresDialect;

/// Catalog query: columns of a table in the current schema, in ordinal
/// order, flagged with primary-key membership and key position.
///
/// Array and user-defined types are reported by their `regtype` spelling
/// so they stay valid in DDL.
const COLUMNS_QUERY: &str = r#"
    SELECT
        c.column_name::text,
        CASE WHEN c.data_type IN ('ARRAY', 'USER-DEFINED')
             THEN (quote_ident(c.udt_schema) || '.' || quote_ident(c.udt_name))::regtype::text
             ELSE c.data_type::text
        END AS data_type,
        c.is_nullable = 'YES' AS is_nullable,
        kcu.ordinal_position::int4 AS pk_position
    FROM information_schema.columns c
    LEFT JOIN information_schema.table_constraints tc
        ON tc.table_schema = c.table_schema
       AND tc.table_name = c.table_name
       AND tc.constraint_type = 'PRIMARY KEY'
    LEFT JOIN information_schema.key_column_usage kcu
        ON kcu.constraint_schema = tc.constraint_schema
       AND kcu.constraint_name = tc.constraint_name
       AND kcu.table_name = c.table_name
       AND kcu.column_name = c.column_name
    WHERE c.table_schema = current_schema()
      AND c.table_name::text = $1::text
    ORDER BY c.ordinal_position
"#;

/// How a projected column is decoded into a [`SqlValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decode {
    I16,
    I32,
    I64,
    F32,
    F64,
    Bool,
    Bytes,
    Timestamp,
    TimestampTz,
    /// Text types, and everything projected with a `::text` cast.
    Text,
}

impl Decode {
    /// Pick a decoder from the type the server reports for a result column.
    fn for_column_type(ty: &Type) -> Self {
        match *ty {
            Type::INT2 => Decode::I16,
            Type::INT4 => Decode::I32,
            Type::INT8 => Decode::I64,
            Type::FLOAT4 => Decode::F32,
            Type::FLOAT8 => Decode::F64,
            Type::BOOL => Decode::Bool,
            Type::BYTEA => Decode::Bytes,
            Type::TIMESTAMP => Decode::Timestamp,
            Type::TIMESTAMPTZ => Decode::TimestampTz,
            _ => Decode::Text,
        }
    }

    /// Pick a decoder from the catalog's `data_type`.
    fn for_type(data_type: &str) -> Self {
        match data_type.to_uppercase().as_str() {
            "SMALLINT" => Decode::I16,
            "INTEGER" => Decode::I32,
            "BIGINT" => Decode::I64,
            "REAL" => Decode::F32,
            "DOUBLE PRECISION" => Decode::F64,
            "BOOLEAN" => Decode::Bool,
            "BYTEA" => Decode::Bytes,
            "TIMESTAMP WITHOUT TIME ZONE" | "TIMESTAMP" => Decode::Timestamp,
            "TIMESTAMP WITH TIME ZONE" => Decode::TimestampTz,
            _ => Decode::Text,
        }
    }

    /// Whether the projection needs a `::text` cast for this decoder.
    fn needs_cast(data_type: &str) -> bool {
        let upper = data_type.to_uppercase();
        Self::for_type(&upper) == Decode::Text
            && !matches!(upper.as_str(), "TEXT" | "CHARACTER VARYING" | "CHARACTER")
    }

    fn read(self, row: &Row, i: usize) -> std::result::Result<SqlValue, tokio_postgres::Error> {
        let value = match self {
            Decode::I16 => row.try_get::<_, Option<i16>>(i)?.map(|v| SqlValue::Int(v as i64)),
            Decode::I32 => row.try_get::<_, Option<i32>>(i)?.map(|v| SqlValue::Int(v as i64)),
            Decode::I64 => row.try_get::<_, Option<i64>>(i)?.map(SqlValue::Int),
            Decode::F32 => row.try_get::<_, Option<f32>>(i)?.map(|v| SqlValue::Float(v as f64)),
            Decode::F64 => row.try_get::<_, Option<f64>>(i)?.map(SqlValue::Float),
            Decode::Bool => row.try_get::<_, Option<bool>>(i)?.map(SqlValue::Bool),
            Decode::Bytes => row.try_get::<_, Option<Vec<u8>>>(i)?.map(SqlValue::Bytes),
            Decode::Timestamp => row
                .try_get::<_, Option<NaiveDateTime>>(i)?
                .map(SqlValue::Timestamp),
            Decode::TimestampTz => row
                .try_get::<_, Option<DateTime<Utc>>>(i)?
                .map(|v| SqlValue::Timestamp(v.naive_utc())),
            Decode::Text => row.try_get::<_, Option<String>>(i)?.map(SqlValue::Text),
        };
        Ok(value.unwrap_or(SqlValue::Null))
    }
}

/// Build the streaming SELECT, casting non-native source types to text.
fn build_select(dialect: &PostgresDialect, table: &Table) -> String {
    let cols: Vec<String> = table
        .columns
        .iter()
        .map(|c| {
            let quoted = dialect.quote_ident(&c.name);
            if Decode::needs_cast(&c.data_type) {
                format!("{}::text", quoted)
            } else {
                quoted
            }
        })
        .collect();

    format!(
        "SELECT {} FROM {}",
        cols.join(", "),
        dialect.quote_ident(&table.name)
    )
}

/// Parameter iterator for `query_raw` with an empty parameter list.
fn slice_iter<'a>(
    s: &'a [&'a (dyn ToSql + Sync)],
) -> impl ExactSizeIterator<Item = &'a dyn ToSql> + 'a {
    s.iter().map(|s| *s as _)
}

/// PostgreSQL source reader implementation.
pub struct PostgresReader {
    pool: Pool,
    dialect: PostgresDialect,
}

impl PostgresReader {
    /// Connect to the source database named by a `postgres://` URI.
    pub async fn connect(uri: &str, max_conns: usize) -> Result<Self> {
        let pool = connect_pool(uri, max_conns, "source").await?;
        Ok(Self {
            pool,
            dialect: PostgresDialect::new(),
        })
    }

    async fn read_table_impl(
        pool: Pool,
        sql: String,
        table: String,
        batch_size: usize,
        tx: mpsc::Sender<Result<Batch>>,
    ) -> Result<()> {
        let client = pool
            .get()
            .await
            .map_err(|e| CopyError::pool(e, "getting connection for read_table"))?;

        debug!("Streaming {}: {}", table, sql);

        let stream = client
            .query_raw(sql.as_str(), slice_iter(&[]))
            .await
            .map_err(|e| CopyError::read(&table, e))?;
        tokio::pin!(stream);

        let mut batcher = RowBatcher::new(batch_size);

        while let Some(row) = stream
            .try_next()
            .await
            .map_err(|e| CopyError::read(&table, e))?
        {
            // Decoders follow the result columns, never the caller's column types.
            let values = row
                .columns()
                .iter()
                .enumerate()
                .map(|(i, c)| Decode::for_column_type(c.type_()).read(&row, i))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| CopyError::read(&table, e))?;

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
impl SourceReader for PostgresReader {
    async fn load_table(&self, table: &str) -> Result<Table> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| CopyError::pool(e, "getting connection for load_table"))?;

        let rows = client
            .query(COLUMNS_QUERY, &[&table])
            .await
            .map_err(|e| CopyError::introspection(table, e))?;

        if rows.is_empty() {
            return Err(CopyError::introspection(
                table,
                "table does not exist in the current schema",
            ));
        }

        let mut columns = Vec::with_capacity(rows.len());
        let mut pk_positions: Vec<(i32, String)> = Vec::new();

        for (i, row) in rows.iter().enumerate() {
            let name: String = row.try_get(0).map_err(|e| CopyError::introspection(table, e))?;
            let data_type: String = row.try_get(1).map_err(|e| CopyError::introspection(table, e))?;
            let is_nullable: bool = row.try_get(2).map_err(|e| CopyError::introspection(table, e))?;
            let pk_position: Option<i32> =
                row.try_get(3).map_err(|e| CopyError::introspection(table, e))?;

            validate_identifier(&name).map_err(|e| CopyError::introspection(table, e))?;

            if let Some(pos) = pk_position {
                pk_positions.push((pos, name.clone()));
            }

            columns.push(Column {
                name,
                data_type: data_type.to_uppercase(),
                is_nullable,
                is_primary_key: pk_position.is_some(),
                ordinal_pos: i as i32 + 1,
            });
        }

        pk_positions.sort_by_key(|(pos, _)| *pos);

        debug!(
            "Loaded {} columns for {} (primary key: {:?})",
            columns.len(),
            table,
            pk_positions
        );

        Ok(Table {
            name: table.to_string(),
            columns,
            primary_key: pk_positions.into_iter().map(|(_, name)| name).collect(),
        })
    }

    async fn row_count(&self, table: &str) -> Result<u64> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| CopyError::pool(e, "getting connection for row_count"))?;

        let query = format!("SELECT COUNT(*) FROM {}", self.dialect.quote_ident(table));
        let row = client
            .query_one(&query, &[])
            .await
            .map_err(|e| CopyError::read(table, e))?;

        let count: i64 = row.try_get(0).map_err(|e| CopyError::read(table, e))?;
        Ok(count.max(0) as u64)
    }

    fn read_table(&self, table: &Table, batch_size: usize) -> mpsc::Receiver<Result<Batch>> {
        let (tx, rx) = mpsc::channel(1);
        let pool = self.pool.clone();
        let sql = build_select(&self.dialect, table);
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
        Dialect::Postgres
    }

    async fn close(&self) {
        self.pool.close();
    }
}
