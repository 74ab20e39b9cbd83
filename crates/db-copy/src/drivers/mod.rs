//! Database driver implementations.
//!
//! This module provides dialect-specific implementations of the core traits:
//!
//! - [`sqlite`]: SQLite driver (sqlx)
//! - [`postgres`]: PostgreSQL driver (tokio-postgres + deadpool)
//! - [`common`]: Shared utilities (TLS, row batching)
//!
//! Each driver module implements `SqlDialect`, `SourceReader` and
//! `TargetWriter`.
//!
//! # Adding New Databases
//!
//! 1. Create a new module under `drivers/`
//! 2. Implement `SqlDialect`, `SourceReader` and `TargetWriter`
//! 3. Add a variant to [`Dialect`] and to [`DialectImpl`]
//! 4. Register type mappers in `DriverCatalog::with_builtins()`

pub mod common;
pub mod postgres;
pub mod sqlite;

pub use common::{SslMode, TlsBuilder};

pub use postgres::{PostgresDialect, PostgresReader, PostgresWriter};
pub use sqlite::{SqliteDialect, SqliteReader, SqliteWriter};

use crate::core::traits::SqlDialect;
use crate::dialect::Dialect;

/// Enum-based static dispatch for SQL dialects.
///
/// The compiler generates a match instead of vtable dispatch.
#[derive(Debug, Clone)]
pub enum DialectImpl {
    Sqlite(SqliteDialect),
    Postgres(PostgresDialect),
}

impl DialectImpl {
    /// Syntax strategy for a resolved dialect.
    pub fn for_dialect(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Sqlite => DialectImpl::Sqlite(SqliteDialect::new()),
            Dialect::Postgres => DialectImpl::Postgres(PostgresDialect::new()),
        }
    }
}

impl From<Dialect> for DialectImpl {
    fn from(dialect: Dialect) -> Self {
        Self::for_dialect(dialect)
    }
}

impl SqlDialect for DialectImpl {
    fn name(&self) -> &str {
        match self {
            DialectImpl::Sqlite(d) => d.name(),
            DialectImpl::Postgres(d) => d.name(),
        }
    }

    fn quote_ident(&self, name: &str) -> String {
        match self {
            DialectImpl::Sqlite(d) => d.quote_ident(name),
            DialectImpl::Postgres(d) => d.quote_ident(name),
        }
    }

    fn param_placeholder(&self, index: usize) -> String {
        match self {
            DialectImpl::Sqlite(d) => d.param_placeholder(index),
            DialectImpl::Postgres(d) => d.param_placeholder(index),
        }
    }

    fn max_bind_params(&self) -> usize {
        match self {
            DialectImpl::Sqlite(d) => d.max_bind_params(),
            DialectImpl::Postgres(d) => d.max_bind_params(),
        }
    }
}
