//! Error types for the copy library.

use thiserror::Error;

/// Process exit codes, one per failure class.
pub const EXIT_CONFIG_ERROR: u8 = 1;
pub const EXIT_CONNECTION_ERROR: u8 = 2;
pub const EXIT_INTROSPECTION_ERROR: u8 = 3;
pub const EXIT_SCHEMA_ERROR: u8 = 4;
pub const EXIT_READ_ERROR: u8 = 5;
pub const EXIT_INSERT_ERROR: u8 = 6;
pub const EXIT_IO_ERROR: u8 = 7;
pub const EXIT_COMMIT_ERROR: u8 = 8;
pub const EXIT_DATABASE_ERROR: u8 = 9;

/// Main error type for copy operations.
#[derive(Error, Debug)]
pub enum CopyError {
    /// Configuration error (missing descriptor, bad batch size, invalid YAML, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// One of the two endpoints could not be reached or authenticated.
    #[error("Failed to connect to {endpoint} database: {message}")]
    Connection { endpoint: String, message: String },

    /// Catalog query failed or the source table does not exist.
    #[error("Failed to read schema of table {table}: {message}")]
    Introspection { table: String, message: String },

    /// DDL execution against the destination failed.
    #[error("Failed to create table {table}: {message}")]
    Schema { table: String, message: String },

    /// Reading rows from the source table failed.
    #[error("Failed to read from source table {table}: {message}")]
    Read { table: String, message: String },

    /// A batch insert was rejected; the whole transaction was rolled back.
    #[error("Failed to insert records {first_row}-{last_row} into {table}: {message}")]
    Insert {
        table: String,
        first_row: u64,
        last_row: u64,
        message: String,
    },

    /// The destination rejected the final commit.
    #[error("Failed to commit transaction for table {table}: {message}")]
    Commit { table: String, message: String },

    /// SQLite driver error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// PostgreSQL driver error
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CopyError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        CopyError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Connection error for the named endpoint ("source" or "destination").
    pub fn connection(endpoint: impl Into<String>, message: impl ToString) -> Self {
        CopyError::Connection {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    pub fn introspection(table: impl Into<String>, message: impl ToString) -> Self {
        CopyError::Introspection {
            table: table.into(),
            message: message.to_string(),
        }
    }

    pub fn schema(table: impl Into<String>, message: impl ToString) -> Self {
        CopyError::Schema {
            table: table.into(),
            message: message.to_string(),
        }
    }

    pub fn read(table: impl Into<String>, message: impl ToString) -> Self {
        CopyError::Read {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create an Insert error covering the 1-based record range `first_row..=last_row`.
    pub fn insert(
        table: impl Into<String>,
        first_row: u64,
        last_row: u64,
        message: impl ToString,
    ) -> Self {
        CopyError::Insert {
            table: table.into(),
            first_row,
            last_row,
            message: message.to_string(),
        }
    }

    pub fn commit(table: impl Into<String>, message: impl ToString) -> Self {
        CopyError::Commit {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Exit code for the CLI process.
    pub fn exit_code(&self) -> u8 {
        match self {
            CopyError::Config(_) | CopyError::Yaml(_) => EXIT_CONFIG_ERROR,
            CopyError::Connection { .. } => EXIT_CONNECTION_ERROR,
            CopyError::Introspection { .. } => EXIT_INTROSPECTION_ERROR,
            CopyError::Schema { .. } => EXIT_SCHEMA_ERROR,
            CopyError::Read { .. } => EXIT_READ_ERROR,
            CopyError::Insert { .. } => EXIT_INSERT_ERROR,
            CopyError::Io(_) => EXIT_IO_ERROR,
            CopyError::Commit { .. } => EXIT_COMMIT_ERROR,
            CopyError::Sqlite(_)
            | CopyError::Postgres(_)
            | CopyError::Pool { .. }
            | CopyError::Json(_) => EXIT_DATABASE_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for copy operations.
pub type Result<T> = std::result::Result<T, CopyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_error_names_range() {
        let err = CopyError::insert("users", 2001, 3000, "duplicate key");
        let msg = err.to_string();
        assert!(msg.contains("2001-3000"));
        assert!(msg.contains("users"));
        assert!(msg.contains("duplicate key"));
        assert_eq!(err.exit_code(), EXIT_INSERT_ERROR);
    }

    #[test]
    fn test_connection_error_names_endpoint() {
        let err = CopyError::connection("destination", "connection refused");
        assert_eq!(
            err.to_string(),
            "Failed to connect to destination database: connection refused"
        );
        assert_eq!(err.exit_code(), EXIT_CONNECTION_ERROR);
    }

    #[test]
    fn test_exit_codes_are_distinct_and_non_zero() {
        let errors = [
            CopyError::Config("x".into()),
            CopyError::connection("source", "x"),
            CopyError::introspection("t", "x"),
            CopyError::schema("t", "x"),
            CopyError::read("t", "x"),
            CopyError::insert("t", 1, 2, "x"),
            CopyError::Io(std::io::Error::other("x")),
            CopyError::commit("t", "x"),
            CopyError::pool("x", "ctx"),
        ];
        let mut codes: Vec<u8> = errors.iter().map(CopyError::exit_code).collect();
        assert!(codes.iter().all(|c| *c != 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_format_detailed_includes_message() {
        let err = CopyError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing.yaml",
        ));
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error"));
        assert!(detailed.contains("missing.yaml"));
    }
}
