//! Dialect resolution and type mapping.
//!
//! A connection descriptor is classified into exactly one [`Dialect`] by a
//! prefix test: anything starting with `postgres://` is a PostgreSQL URI,
//! everything else is treated as a SQLite file path. No validation happens
//! here; a bad path or URI surfaces later as a connection error.
//!
//! The type mappers convert a column's native type between dialects using
//! a (source, target) pair keying approach.
//!
//! # Available Mappers
//!
//! - [`SqliteToPostgresMapper`]: SQLite → PostgreSQL (substring match + affinity rules)
//! - [`PostgresToSqliteMapper`]: PostgreSQL → SQLite (exact match)
//! - [`IdentityMapper`]: Same dialect transfers (passthrough, upper-cased)
//!
//! # Usage
//!
//! ```rust
//! use db_copy::dialect::{map_type, Dialect};
//!
//! let from = Dialect::classify("sample.db");
//! let to = Dialect::classify("postgres://localhost/app");
//! assert_eq!(map_type("real", from, to), "DOUBLE PRECISION");
//! ```

mod typemap;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CopyError;

pub use typemap::{map_type, mapper_for, IdentityMapper, PostgresToSqliteMapper, SqliteToPostgresMapper};

/// URI prefix that marks a PostgreSQL descriptor.
pub const POSTGRES_PREFIX: &str = "postgres://";

/// A supported database engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Classify a connection descriptor.
    ///
    /// Total and side-effect free: returns [`Dialect::Postgres`] when the
    /// descriptor starts with `postgres://`, otherwise [`Dialect::Sqlite`].
    pub fn classify(descriptor: &str) -> Self {
        if descriptor.starts_with(POSTGRES_PREFIX) {
            Dialect::Postgres
        } else {
            Dialect::Sqlite
        }
    }

    /// Dialect identifier used in logs and the driver catalog.
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = CopyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            other => Err(CopyError::Config(format!(
                "Unknown database type: '{}'. Supported types: sqlite, postgres",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_postgres_uri() {
        assert_eq!(
            Dialect::classify("postgres://user:pw@localhost:5432/app"),
            Dialect::Postgres
        );
    }

    #[test]
    fn test_classify_everything_else_is_sqlite() {
        assert_eq!(Dialect::classify("sample.db"), Dialect::Sqlite);
        assert_eq!(Dialect::classify("/tmp/data/app.sqlite"), Dialect::Sqlite);
        assert_eq!(Dialect::classify(""), Dialect::Sqlite);
        // Only the exact prefix counts.
        assert_eq!(Dialect::classify("postgresql://localhost/app"), Dialect::Sqlite);
        assert_eq!(Dialect::classify("POSTGRES://localhost/app"), Dialect::Sqlite);
        assert_eq!(Dialect::classify(" postgres://localhost"), Dialect::Sqlite);
    }

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("sqlite".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert_eq!("PostgreSQL".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("pg".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert!("mysql".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_dialect_display() {
        assert_eq!(Dialect::Sqlite.to_string(), "sqlite");
        assert_eq!(Dialect::Postgres.to_string(), "postgres");
    }
}
