//! PostgreSQL SQL dialect (Strategy pattern).
//!
//! Provides PostgreSQL-specific identifier quoting, parameter placeholders
//! and bind limits.

use crate::core::identifier::quote_double;
use crate::core::traits::SqlDialect;

/// The wire protocol counts bind parameters in an `i16`-sized field.
const PG_MAX_BIND_PARAMS: usize = 65_535;

/// PostgreSQL dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Create a new PostgreSQL dialect instance.
    pub fn new() -> Self {
        Self
    }

    /// Build a multi-row `INSERT` whose placeholders carry per-column casts.
    ///
    /// `casts[j]` is appended to every placeholder of column `j`; `None`
    /// leaves the placeholder bare. With no casts this is the same
    /// statement as [`SqlDialect::build_insert`].
    pub fn build_insert_with_casts(
        &self,
        table: &str,
        columns: &[String],
        rows: usize,
        casts: &[Option<String>],
    ) -> String {
        let cols: Vec<String> = columns.iter().map(|c| self.quote_ident(c)).collect();
        let width = columns.len();

        let mut tuples = Vec::with_capacity(rows);
        for r in 0..rows {
            let params: Vec<String> = (0..width)
                .map(|c| {
                    let placeholder = self.param_placeholder(r * width + c + 1);
                    match casts.get(c) {
                        Some(Some(cast)) => format!("{}{}", placeholder, cast),
                        _ => placeholder,
                    }
                })
                .collect();
            tuples.push(format!("({})", params.join(", ")));
        }

        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.quote_ident(table),
            cols.join(", "),
            tuples.join(", ")
        )
    }
}

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn quote_ident(&self, name: &str) -> String {
        quote_double(name)
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn max_bind_params(&self) -> usize {
        PG_MAX_BIND_PARAMS
    }
}
