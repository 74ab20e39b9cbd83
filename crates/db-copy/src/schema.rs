//! Schema introspection and synthesis.
//!
//! [`get_schema`] reads a table from the source catalog and translates every
//! column type for the destination dialect; [`build_create_table`] turns the
//! translated table into destination DDL. [`introspect`] keeps both sides,
//! since rows must be read with the source types and written with the
//! destination ones.

use tracing::{debug, info};

use crate::core::schema::Table;
use crate::core::traits::{SourceReader, SqlDialect, TypeMapper};
use crate::dialect::Dialect;
use crate::drivers::DialectImpl;
use crate::error::{CopyError, Result};

/// A source table together with its translation for the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSchema {
    /// Columns as the source catalog reports them.
    pub native: Table,

    /// Same columns with destination-ready types.
    pub translated: Table,
}

/// Introspect `table` on the source and translate it with `mapper`.
///
/// The returned columns keep catalog order and carry destination-ready
/// types. Fails with an introspection error when the table is missing or
/// the catalog query fails.
pub async fn get_schema(
    reader: &dyn SourceReader,
    table: &str,
    mapper: &dyn TypeMapper,
) -> Result<Table> {
    Ok(introspect(reader, table, mapper).await?.translated)
}

/// Introspect `table` and keep the native columns next to the translated ones.
pub async fn introspect(
    reader: &dyn SourceReader,
    table: &str,
    mapper: &dyn TypeMapper,
) -> Result<SourceSchema> {
    if mapper.source_dialect() != reader.dialect() {
        return Err(CopyError::introspection(
            table,
            format!(
                "type mapper expects {} source but the reader is {}",
                mapper.source_dialect(),
                reader.dialect()
            ),
        ));
    }

    let native = reader.load_table(table).await?;
    let translated = native.translate(mapper);

    for (from, to) in native.columns.iter().zip(&translated.columns) {
        debug!(
            "{}.{}: {} -> {}",
            table, from.name, from.data_type, to.data_type
        );
    }

    info!(
        "Introspected {} ({} columns, primary key: {}) for {} -> {}",
        table,
        translated.columns.len(),
        if translated.has_pk() {
            translated.primary_key.join(", ")
        } else {
            "none".to_string()
        },
        mapper.source_dialect(),
        mapper.target_dialect()
    );

    Ok(SourceSchema { native, translated })
}

/// Synthesize a `CREATE TABLE` statement in the given dialect.
///
/// Single-column keys are tagged inline; composite keys become one trailing
/// `PRIMARY KEY (...)` clause.
pub fn build_create_table(dialect: Dialect, table: &Table) -> String {
    DialectImpl::for_dialect(dialect).build_create_table(table)
}
