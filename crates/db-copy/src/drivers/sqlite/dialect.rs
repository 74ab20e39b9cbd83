//! SQLite SQL dialect (Strategy pattern).
//!
//! Provides SQLite-specific identifier quoting, parameter placeholders and
//! bind limits. Statement shapes come from the shared defaults on
//! [`SqlDialect`].

use crate::core::identifier::quote_double;
use crate::core::traits::SqlDialect;

/// Highest parameter number SQLite accepts since 3.32.
const SQLITE_MAX_VARIABLE_NUMBER: usize = 32_766;

/// SQLite dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Create a new SQLite dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl SqlDialect for SqliteDialect {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn quote_ident(&self, name: &str) -> String {
        quote_double(name)
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("?{}", index)
    }

    fn max_bind_params(&self) -> usize {
        SQLITE_MAX_VARIABLE_NUMBER
    }
}
