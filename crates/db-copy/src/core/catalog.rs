//! Driver catalog for explicit dependency injection.
//!
//! The [`DriverCatalog`] is a registry of type mappers keyed by dialect pair,
//! plus the factories that open a reader or writer for a descriptor. It is
//! explicitly constructed and handed to the orchestrator rather than living
//! in global state, so tests can register their own mappers.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::dialect::{Dialect, IdentityMapper, PostgresToSqliteMapper, SqliteToPostgresMapper};
use crate::drivers::{PostgresReader, PostgresWriter, SqliteReader, SqliteWriter};
use crate::error::{CopyError, Result};

use super::traits::{SourceReader, TargetWriter, TypeMapper};

/// Default pool size for each endpoint.
///
/// A job uses one connection per endpoint at a time; the second PostgreSQL
/// slot lets the row count run while nothing else is in flight.
const DEFAULT_POOL_SIZE: usize = 2;

/// Registry of type mappers and endpoint factories.
///
/// # Example
///
/// ```rust
/// use db_copy::core::DriverCatalog;
/// use db_copy::dialect::Dialect;
///
/// let catalog = DriverCatalog::with_builtins();
/// let mapper = catalog.require_mapper(Dialect::Sqlite, Dialect::Postgres).unwrap();
/// assert_eq!(mapper.map_type("blob").target_type, "BYTEA");
/// ```
#[derive(Default)]
pub struct DriverCatalog {
    /// Type mappers keyed by (source, target) dialect pair.
    type_mappers: HashMap<(Dialect, Dialect), Arc<dyn TypeMapper>>,
}

impl DriverCatalog {
    /// Create a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog with a mapper registered for every dialect pair.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();

        catalog.register_mapper(Arc::new(SqliteToPostgresMapper::new()));
        catalog.register_mapper(Arc::new(PostgresToSqliteMapper::new()));

        // Identity mappers for same-dialect transfers
        catalog.register_mapper(Arc::new(IdentityMapper::new(Dialect::Sqlite)));
        catalog.register_mapper(Arc::new(IdentityMapper::new(Dialect::Postgres)));

        catalog
    }

    /// Register a type mapper under its own (source, target) pair.
    ///
    /// Replaces any mapper previously registered for the same pair.
    pub fn register_mapper(&mut self, mapper: Arc<dyn TypeMapper>) {
        let key = (mapper.source_dialect(), mapper.target_dialect());
        debug!("Registering type mapper {} -> {}", key.0, key.1);
        self.type_mappers.insert(key, mapper);
    }

    /// Get a type mapper for a source→target pair.
    pub fn get_mapper(&self, source: Dialect, target: Dialect) -> Option<Arc<dyn TypeMapper>> {
        self.type_mappers.get(&(source, target)).cloned()
    }

    /// Get a type mapper, returning an error if none is registered.
    pub fn require_mapper(&self, source: Dialect, target: Dialect) -> Result<Arc<dyn TypeMapper>> {
        self.get_mapper(source, target).ok_or_else(|| {
            CopyError::Config(format!(
                "No type mapper registered for {} -> {}",
                source, target
            ))
        })
    }

    /// Check if a mapper is registered for a pair.
    pub fn has_mapper(&self, source: Dialect, target: Dialect) -> bool {
        self.type_mappers.contains_key(&(source, target))
    }

    /// Open the source endpoint named by `descriptor`.
    ///
    /// Fails with a connection error naming the source endpoint.
    pub async fn create_reader(&self, descriptor: &str) -> Result<Arc<dyn SourceReader>> {
        match Dialect::classify(descriptor) {
            Dialect::Sqlite => {
                let reader = SqliteReader::connect(descriptor).await?;
                Ok(Arc::new(reader))
            }
            Dialect::Postgres => {
                let reader = PostgresReader::connect(descriptor, DEFAULT_POOL_SIZE).await?;
                Ok(Arc::new(reader))
            }
        }
    }

    /// Open the destination endpoint named by `descriptor`.
    ///
    /// A SQLite destination file is created when missing. Fails with a
    /// connection error naming the destination endpoint.
    pub async fn create_writer(&self, descriptor: &str) -> Result<Arc<dyn TargetWriter>> {
        match Dialect::classify(descriptor) {
            Dialect::Sqlite => {
                let writer = SqliteWriter::connect(descriptor).await?;
                Ok(Arc::new(writer))
            }
            Dialect::Postgres => {
                let writer = PostgresWriter::connect(descriptor, DEFAULT_POOL_SIZE).await?;
                Ok(Arc::new(writer))
            }
        }
    }
}
