//! Type mapping implementations with (source, target) pair keying.
//!
//! Each mapper handles one source→target dialect pair and works on the
//! native type name reported by the source catalog. Unrecognised types fall
//! back to `TEXT` in both directions.

use std::sync::Arc;

use crate::core::traits::{TypeMapper, TypeMapping};

use super::Dialect;

/// Target type used when no rule matches.
const FALLBACK_TYPE: &str = "TEXT";

/// Map a native type between dialects.
///
/// Same-dialect pairs return the input upper-cased; every other pair goes
/// through the mapper registered for it.
pub fn map_type(native_type: &str, from: Dialect, to: Dialect) -> String {
    mapper_for(from, to).map_type(native_type).target_type
}

/// Get the mapper for a source→target dialect pair.
pub fn mapper_for(from: Dialect, to: Dialect) -> Arc<dyn TypeMapper> {
    match (from, to) {
        (Dialect::Sqlite, Dialect::Postgres) => Arc::new(SqliteToPostgresMapper::new()),
        (Dialect::Postgres, Dialect::Sqlite) => Arc::new(PostgresToSqliteMapper::new()),
        (same, _) => Arc::new(IdentityMapper::new(same)),
    }
}

/// SQLite → PostgreSQL type mapper.
///
/// SQLite declared types are free-form, so matching is by case-insensitive
/// substring. The documented correspondence table is tried first, in order;
/// when it has no hit, SQLite's own column-affinity rules pick the closest
/// PostgreSQL type. Only types neither step recognises become `TEXT`.
#[derive(Debug, Clone, Default)]
pub struct SqliteToPostgresMapper;

impl SqliteToPostgresMapper {
    /// Create a new SQLite to PostgreSQL mapper.
    pub fn new() -> Self {
        Self
    }
}

impl TypeMapper for SqliteToPostgresMapper {
    fn source_dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn target_dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn map_type(&self, data_type: &str) -> TypeMapping {
        sqlite_to_postgres(data_type)
    }
}

/// Correspondence table for SQLite → PostgreSQL, checked in order.
const SQLITE_TO_POSTGRES: &[(&str, &str)] = &[
    ("INTEGER", "INTEGER"),
    ("REAL", "DOUBLE PRECISION"),
    ("TEXT", "TEXT"),
    ("BLOB", "BYTEA"),
    ("BOOLEAN", "BOOLEAN"),
    ("DATETIME", "TIMESTAMP"),
    ("NUMERIC", "NUMERIC"),
];

/// SQLite affinity-style rules, used only when the table above has no hit.
const SQLITE_AFFINITY_RULES: &[(&str, &str)] = &[
    ("INT", "INTEGER"),
    ("CHAR", "TEXT"),
    ("CLOB", "TEXT"),
    ("FLOA", "DOUBLE PRECISION"),
    ("DOUB", "DOUBLE PRECISION"),
    ("DEC", "NUMERIC"),
    ("BOOL", "BOOLEAN"),
    ("TIMESTAMP", "TIMESTAMP"),
    ("DATE", "TIMESTAMP"),
];

fn sqlite_to_postgres(sqlite_type: &str) -> TypeMapping {
    let upper = sqlite_type.trim().to_uppercase();

    if let Some((_, target)) = SQLITE_TO_POSTGRES
        .iter()
        .find(|(needle, _)| upper.contains(needle))
    {
        return TypeMapping::lossless(*target);
    }

    if let Some((_, target)) = SQLITE_AFFINITY_RULES
        .iter()
        .find(|(needle, _)| upper.contains(needle))
    {
        return TypeMapping::lossless(*target);
    }

    if upper.is_empty() {
        // Columns declared without a type have BLOB affinity in SQLite and may
        // hold anything; TEXT is the only target that accepts every value.
        return TypeMapping::lossy(FALLBACK_TYPE, "untyped SQLite column stored as TEXT");
    }

    TypeMapping::lossy(
        FALLBACK_TYPE,
        format!("unrecognised SQLite type '{}' stored as TEXT", sqlite_type),
    )
}

/// PostgreSQL → SQLite type mapper.
///
/// PostgreSQL reports canonical type names, so matching is exact
/// (case-insensitive).
#[derive(Debug, Clone, Default)]
pub struct PostgresToSqliteMapper;

impl PostgresToSqliteMapper {
    /// Create a new PostgreSQL to SQLite mapper.
    pub fn new() -> Self {
        Self
    }
}

impl TypeMapper for PostgresToSqliteMapper {
    fn source_dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn target_dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn map_type(&self, data_type: &str) -> TypeMapping {
        postgres_to_sqlite(data_type)
    }
}

fn postgres_to_sqlite(pg_type: &str) -> TypeMapping {
    let upper = pg_type.trim().to_uppercase();

    let target = match upper.as_str() {
        "BIGINT" | "INTEGER" | "SMALLINT" => "INTEGER",
        "DOUBLE PRECISION" | "REAL" | "NUMERIC" | "DECIMAL" => "REAL",
        "TEXT" | "VARCHAR" | "CHAR" | "CHARACTER VARYING" => "TEXT",
        "BYTEA" => "BLOB",
        "BOOLEAN" => "BOOLEAN",
        "TIMESTAMP" | "TIMESTAMP WITHOUT TIME ZONE" | "TIMESTAMP WITH TIME ZONE" => "DATETIME",
        _ => {
            return TypeMapping::lossy(
                FALLBACK_TYPE,
                format!("PostgreSQL type '{}' stored as TEXT", pg_type),
            )
        }
    };

    TypeMapping::lossless(target)
}

/// Identity type mapper for same-dialect transfers.
///
/// Returns the native type upper-cased and performs no re-validation, even
/// across differing SQLite affinity strings.
#[derive(Debug, Clone)]
pub struct IdentityMapper {
    dialect: Dialect,
}

impl IdentityMapper {
    /// Create a new identity mapper for the given dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }
}

impl TypeMapper for IdentityMapper {
    fn source_dialect(&self) -> Dialect {
        self.dialect
    }

    fn target_dialect(&self) -> Dialect {
        self.dialect
    }

    fn map_type(&self, data_type: &str) -> TypeMapping {
        TypeMapping::lossless(data_type.to_uppercase())
    }
}
