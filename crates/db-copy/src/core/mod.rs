//! Core abstractions for dialect-agnostic table copying.
//!
//! This module provides the foundational types and traits used throughout
//! the copy engine:
//!
//! - [`schema`]: Table and column metadata types
//! - [`value`]: Tagged SQL values, rows and batches
//! - [`traits`]: Capability traits for readers, writers, dialects, and type mappers
//! - [`catalog`]: Driver registry for dependency injection
//! - [`identifier`]: Identifier validation and quoting
//!
//! The core module defines dialect-agnostic abstractions that are implemented
//! by driver modules (`drivers/sqlite`, `drivers/postgres`). The engine only
//! ever talks to these traits, so a third backend is added by implementing
//! them, not by branching inside the engine.

pub mod catalog;
pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

// Re-export commonly used types for convenience
pub use catalog::DriverCatalog;
pub use schema::{Column, Table};
pub use traits::{
    SourceReader, SqlDialect, TargetWriter, TypeMapper, TypeMapping, WriteTransaction,
};
pub use value::{Batch, Row, SqlValue};
