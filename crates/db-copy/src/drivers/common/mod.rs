//! Common utilities shared across database drivers.
//!
//! - [`tls`]: TLS configuration for PostgreSQL connections
//! - [`batcher`]: Grouping streamed rows into fixed-size batches

pub mod batcher;
pub mod tls;

pub use batcher::RowBatcher;
pub use tls::{split_sslmode, SslMode, TlsBuilder};
