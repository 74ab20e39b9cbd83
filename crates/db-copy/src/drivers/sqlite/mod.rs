//! SQLite driver.
//!
//! This module provides SQLite-specific implementations:
//!
//! - [`SqliteDialect`]: SQL syntax strategy for SQLite
//! - [`SqliteReader`]: Source reader for SQLite database files
//! - [`SqliteWriter`]: Target writer for SQLite database files

mod dialect;
mod reader;
mod writer;

pub use dialect::SqliteDialect;
pub use reader::SqliteReader;
pub use writer::SqliteWriter;
